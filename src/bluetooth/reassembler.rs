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

//! Reassembly of serial fragments into shot blocks.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::constants::{markers, MAX_BUFFER_BYTES};
use super::protocol::{locate, Field};

/// What ends the energy value of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnergyTerminator {
    /// The energy line needs its newline, or the start of the next block.
    #[default]
    Newline,
    /// End of buffer also ends the energy value, once a value has started.
    EndOfBuffer,
}

/// Accumulates text fragments until a full shot block is present.
///
/// After a block is extracted the buffer is cleared, whatever follows the
/// block included. Only one block can be recovered per accumulation cycle.
/// The exception is an energy value that runs straight into the next
/// `Shot #` marker: the next block is kept.
pub struct LineBuffer {
    buffer: String,
    /// Bytes of a UTF-8 sequence cut off at the end of the last fragment.
    partial_char: Vec<u8>,
    energy_terminator: EnergyTerminator,
}

impl LineBuffer {
    /// Create a new line buffer.
    pub fn new(energy_terminator: EnergyTerminator) -> Self {
        Self {
            buffer: String::with_capacity(256),
            partial_char: Vec::new(),
            energy_terminator,
        }
    }

    /// Append a raw fragment from the serial stream.
    ///
    /// Invalid bytes become U+FFFD. A multi-byte character split across two
    /// fragments is held back until its remaining bytes arrive.
    pub fn append(&mut self, fragment: &[u8]) {
        let mut bytes = std::mem::take(&mut self.partial_char);
        bytes.extend_from_slice(fragment);

        let mut input = bytes.as_slice();
        loop {
            match std::str::from_utf8(input) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    break;
                }
                Err(e) => {
                    let (valid, rest) = input.split_at(e.valid_up_to());
                    self.buffer.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[len..];
                        }
                        None => {
                            self.partial_char = rest.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        if self.buffer.len() > MAX_BUFFER_BYTES {
            warn!(
                "No complete block in {} buffered bytes, discarding",
                self.buffer.len()
            );
            self.reset();
        }
    }

    /// Take the buffered block if all three fields are complete.
    ///
    /// Returns `None` and keeps the buffer while any field is missing or its
    /// line is still open.
    pub fn try_extract_complete_block(&mut self) -> Option<String> {
        self.extract(self.energy_terminator)
    }

    /// Take a block whose energy line was left open, as long as a value has
    /// started. Called once the link has gone quiet.
    pub fn flush_unterminated(&mut self) -> Option<String> {
        self.extract(EnergyTerminator::EndOfBuffer)
    }

    fn extract(&mut self, energy_terminator: EnergyTerminator) -> Option<String> {
        let mut energy_end = self.buffer.len();
        for field in Field::ALL {
            let span = locate(&self.buffer, field)?;
            let complete = match (field, energy_terminator) {
                (Field::Energy, EnergyTerminator::EndOfBuffer) => {
                    span.terminated || !span.value.trim().is_empty()
                }
                _ => span.terminated,
            };
            if !complete {
                return None;
            }
            if field == Field::Energy {
                energy_end = span.end;
            }
        }

        debug!("Complete block buffered: {} bytes", self.buffer.len());
        if self.buffer[energy_end..].starts_with(markers::SHOT_NUMBER) {
            let next_block = self.buffer.split_off(energy_end);
            Some(std::mem::replace(&mut self.buffer, next_block))
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }

    /// Whether anything is waiting for more bytes.
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty() || !self.partial_char.is_empty()
    }

    /// Drop everything buffered so far.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.partial_char.clear();
    }

    /// Get current buffer size.
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(EnergyTerminator::default())
    }
}
