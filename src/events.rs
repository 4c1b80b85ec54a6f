// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Turns received bytes into recorded shots.

use tracing::{debug, info, warn};

use crate::bluetooth::{parse_block, EnergyTerminator, LineBuffer};
use crate::session::{HistorySnapshot, Session, ShotRecord, Statistics};
use crate::ui::{DisplaySink, Notice};

/// Owns the line buffer, the session and the display.
///
/// Only the controller task touches it, so none of this state is shared.
pub struct EventProcessor<D> {
    line_buffer: LineBuffer,
    session: Session,
    display: D,
}

impl<D: DisplaySink> EventProcessor<D> {
    /// Create a new event processor.
    pub fn new(display: D, mass_grams: f64, energy_terminator: EnergyTerminator) -> Self {
        Self {
            line_buffer: LineBuffer::new(energy_terminator),
            session: Session::new(mass_grams),
            display,
        }
    }

    /// Feed bytes read from the device.
    ///
    /// At most one block is extracted per call. A block that fails to parse
    /// is dropped and the session is left alone.
    pub fn handle_data(&mut self, data: &[u8]) -> Option<ShotRecord> {
        self.line_buffer.append(data);
        let block = self.line_buffer.try_extract_complete_block()?;
        self.record_block(&block)
    }

    /// Take what is left once the link has gone quiet, including a trailing
    /// block whose energy line never got its newline.
    pub fn flush_idle(&mut self) -> Vec<ShotRecord> {
        let mut shots = Vec::new();
        while let Some(block) = self.line_buffer.flush_unterminated() {
            debug!("Flushing buffered block after idle period");
            shots.extend(self.record_block(&block));
        }
        shots
    }

    /// Whether part of a block is waiting for more bytes.
    pub fn has_pending(&self) -> bool {
        self.line_buffer.has_pending()
    }

    fn record_block(&mut self, block: &str) -> Option<ShotRecord> {
        match parse_block(block) {
            Ok(parsed) => {
                let shot = self.session.record_shot(parsed.velocity, parsed.energy);
                info!(
                    "Shot {} (device #{}): {:.1} m/s, {:.2} J",
                    shot.index, parsed.device_shot_number, shot.velocity, shot.energy
                );
                let stats = self.session.statistics();
                self.display.shot_recorded(&shot, &stats);
                Some(shot)
            }
            Err(e) => {
                warn!("Dropping shot block: {} ({:?})", e, block);
                None
            }
        }
    }

    /// Drop any partial block, e.g. when a new link comes up.
    pub fn discard_partial(&mut self) {
        if self.line_buffer.buffer_size() > 0 {
            debug!("Discarding {} buffered bytes", self.line_buffer.buffer_size());
        }
        self.line_buffer.reset();
    }

    /// Clear the session. A block still arriving is kept and counts as the
    /// first shot of the new session.
    pub fn reset_session(&mut self) {
        self.session.reset();
        self.display.session_cleared(self.session.mass_grams());
        self.display.notify(&Notice::CounterReset);
    }

    pub fn set_mass_grams(&mut self, grams: f64) {
        self.session.set_mass_grams(grams);
    }

    pub fn statistics(&self) -> Statistics {
        self.session.statistics()
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        self.session.snapshot()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn display(&mut self) -> &mut D {
        &mut self.display
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ConnectionStatus;
    use crate::storage::HistoryView;

    #[derive(Default)]
    struct CountingDisplay {
        shots: Vec<u32>,
        cleared: usize,
        notices: Vec<Notice>,
    }

    impl DisplaySink for CountingDisplay {
        fn shot_recorded(&mut self, shot: &ShotRecord, _stats: &Statistics) {
            self.shots.push(shot.index);
        }
        fn session_cleared(&mut self, _mass_grams: f64) {
            self.cleared += 1;
        }
        fn connection_changed(&mut self, _status: ConnectionStatus, _device: Option<&str>) {}
        fn show_statistics(&mut self, _stats: &Statistics) {}
        fn show_history(&mut self, _history: &HistoryView) {}
        fn show_text(&mut self, _text: &str) {}
        fn notify(&mut self, notice: &Notice) {
            self.notices.push(notice.clone());
        }
    }

    fn processor() -> EventProcessor<CountingDisplay> {
        EventProcessor::new(CountingDisplay::default(), 0.25, EnergyTerminator::Newline)
    }

    #[test]
    fn test_split_block_records_one_shot() {
        let mut processor = processor();
        assert!(processor.handle_data(b"Shot #1\nSpeed: 175.").is_none());
        assert!(processor.handle_data(b"32\nEnergy: 3.8").is_none());

        let shot = processor.handle_data(b"4\n").unwrap();
        assert_eq!(shot.index, 1);
        assert_eq!(shot.velocity, 175.32);
        assert_eq!(shot.energy, 3.84);
        assert_eq!(processor.display().shots, vec![1]);
    }

    #[test]
    fn test_malformed_block_leaves_session() {
        let mut processor = processor();
        processor.handle_data(b"Shot #1\nSpeed: 150.0\nEnergy: 2.5\n");
        assert!(processor.handle_data(b"Shot #2\nSpeed: 1o0\nEnergy: 2.5\n").is_none());

        assert_eq!(processor.session().count(), 1);
        assert_eq!(processor.statistics().count, 1);

        // The bad block was consumed, the next one parses normally.
        let shot = processor.handle_data(b"Shot #3\nSpeed: 151.0\nEnergy: 2.6\n").unwrap();
        assert_eq!(shot.index, 2);
    }

    #[test]
    fn test_reset_session() {
        let mut processor = processor();
        processor.handle_data(b"Shot #1\nSpeed: 150.0\nEnergy: 2.5\n");
        processor.handle_data(b"Shot #2\nSpeed: 15");

        processor.reset_session();
        assert!(processor.statistics().is_empty());
        assert_eq!(processor.display().cleared, 1);
        assert_eq!(processor.display().notices, vec![Notice::CounterReset]);

        // The block in flight survives the reset.
        let shot = processor.handle_data(b"1.0\nEnergy: 2.6\n").unwrap();
        assert_eq!(shot.index, 1);
        assert_eq!(shot.velocity, 151.0);
    }

    #[test]
    fn test_flush_idle_takes_trailing_block() {
        let mut processor = processor();
        assert!(processor
            .handle_data(b"Shot #1\nSpeed: 171.0\nEnergy: 3.1Shot #2\nSpeed: 172.0\nEnergy: 3.2")
            .is_some());
        assert!(processor.has_pending());

        let flushed = processor.flush_idle();
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].index, 2);
        assert_eq!(flushed[0].energy, 3.2);
        assert!(!processor.has_pending());
        assert!(processor.flush_idle().is_empty());
        assert_eq!(processor.display().shots, vec![1, 2]);
    }

    #[test]
    fn test_flush_idle_drains_several_blocks() {
        let mut processor = processor();
        let stream = b"Shot #1\nSpeed: 171.0\nEnergy: 3.1Shot #2\nSpeed: 172.0\nEnergy: 3.2Shot #3\nSpeed: 173.0\nEnergy: 3.3";
        assert_eq!(processor.handle_data(stream).unwrap().index, 1);

        let flushed: Vec<u32> = processor.flush_idle().iter().map(|s| s.index).collect();
        assert_eq!(flushed, vec![2, 3]);
        assert_eq!(processor.session().count(), 3);
    }

    #[test]
    fn test_flush_idle_waits_for_a_value() {
        let mut processor = processor();
        processor.handle_data(b"Shot #1\nSpeed: 171.0\nEnergy: ");
        assert!(processor.flush_idle().is_empty());
        assert!(processor.has_pending());
        assert_eq!(processor.session().count(), 0);
    }

    #[test]
    fn test_snapshot_carries_mass() {
        let mut processor = processor();
        processor.set_mass_grams(12.5);
        processor.handle_data(b"Shot #1\nSpeed: 150.0\nEnergy: 2.5\n");

        let snapshot = processor.snapshot();
        assert_eq!(snapshot.mass_grams, 12.5);
        assert_eq!(snapshot.velocities, vec![150.0]);
    }
}
