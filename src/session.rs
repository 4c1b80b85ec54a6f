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

//! Shot session accumulation and statistics.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bluetooth::constants::mass;

/// A single recorded shot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotRecord {
    /// 1-based position in the session.
    pub index: u32,
    /// Speed in m/s.
    pub velocity: f64,
    /// Energy in joules.
    pub energy: f64,
    /// Local wall-clock time the shot was recorded.
    pub timestamp: DateTime<Local>,
}

/// Minimum, maximum and mean of one measured quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregate {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl Aggregate {
    /// Aggregate over `values`, `None` when empty.
    pub fn over(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut count = 0usize;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;

        for value in values {
            count += 1;
            min = min.min(value);
            max = max.max(value);
            sum += value;
        }

        (count > 0).then(|| Self {
            min,
            max,
            avg: sum / count as f64,
        })
    }
}

/// Session statistics. Aggregates are `None` when there are no shots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistics {
    pub count: usize,
    pub velocity: Option<Aggregate>,
    pub energy: Option<Aggregate>,
}

impl Statistics {
    /// Compute statistics from velocity/energy pairs.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (f64, f64)>,
        I::IntoIter: Clone,
    {
        let pairs = pairs.into_iter();
        Self {
            count: pairs.clone().count(),
            velocity: Aggregate::over(pairs.clone().map(|(v, _)| v)),
            energy: Aggregate::over(pairs.map(|(_, e)| e)),
        }
    }

    /// Whether there is no data to show.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Copy of the session handed to the history view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub shot_count: usize,
    pub mass_grams: f64,
    pub velocities: Vec<f64>,
    pub energies: Vec<f64>,
    pub timestamps: Vec<DateTime<Local>>,
}

/// The live shot session.
#[derive(Debug, Clone)]
pub struct Session {
    shots: Vec<ShotRecord>,
    mass_grams: f64,
}

impl Session {
    /// Create an empty session with the given projectile mass.
    pub fn new(mass_grams: f64) -> Self {
        Self {
            shots: Vec::new(),
            mass_grams,
        }
    }

    /// Record a shot and return it with its session index.
    pub fn record_shot(&mut self, velocity: f64, energy: f64) -> ShotRecord {
        let shot = ShotRecord {
            index: self.shots.len() as u32 + 1,
            velocity,
            energy,
            timestamp: Local::now(),
        };
        self.shots.push(shot.clone());
        shot
    }

    /// Forget all shots. The mass is kept.
    pub fn reset(&mut self) {
        self.shots.clear();
        info!("Session reset");
    }

    /// Statistics over every shot in the session.
    pub fn statistics(&self) -> Statistics {
        Statistics::from_pairs(self.shots.iter().map(|s| (s.velocity, s.energy)))
    }

    pub fn shots(&self) -> &[ShotRecord] {
        &self.shots
    }

    pub fn count(&self) -> usize {
        self.shots.len()
    }

    pub fn last_shot(&self) -> Option<&ShotRecord> {
        self.shots.last()
    }

    pub fn mass_grams(&self) -> f64 {
        self.mass_grams
    }

    pub fn set_mass_grams(&mut self, grams: f64) {
        self.mass_grams = grams;
    }

    /// Value copy for the history view.
    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            shot_count: self.shots.len(),
            mass_grams: self.mass_grams,
            velocities: self.shots.iter().map(|s| s.velocity).collect(),
            energies: self.shots.iter().map(|s| s.energy).collect(),
            timestamps: self.shots.iter().map(|s| s.timestamp).collect(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(mass::DEFAULT_GRAMS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_indexing() {
        let mut session = Session::default();
        for n in 1..=5 {
            let shot = session.record_shot(100.0 + n as f64, 1.0);
            assert_eq!(shot.index, n);
        }
        assert_eq!(session.count(), 5);
        assert_eq!(session.last_shot().map(|s| s.index), Some(5));
    }

    #[test]
    fn test_statistics() {
        let mut session = Session::default();
        session.record_shot(170.0, 3.0);
        session.record_shot(180.0, 4.0);
        session.record_shot(175.0, 3.5);

        let stats = session.statistics();
        assert_eq!(stats.count, 3);
        let velocity = stats.velocity.unwrap();
        assert_eq!(velocity.min, 170.0);
        assert_eq!(velocity.max, 180.0);
        assert!((velocity.avg - 175.0).abs() < 1e-9);
        let energy = stats.energy.unwrap();
        assert_eq!(energy.min, 3.0);
        assert_eq!(energy.max, 4.0);
        assert!((energy.avg - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_statistics() {
        let stats = Session::default().statistics();
        assert!(stats.is_empty());
        assert!(stats.velocity.is_none());
        assert!(stats.energy.is_none());
    }

    #[test]
    fn test_reset_restarts_indexing_and_keeps_mass() {
        let mut session = Session::new(12.5);
        session.record_shot(150.0, 2.0);
        session.record_shot(151.0, 2.1);

        session.reset();
        for _ in 0..3 {
            assert!(session.statistics().is_empty());
        }
        assert_eq!(session.mass_grams(), 12.5);

        let shot = session.record_shot(152.0, 2.2);
        assert_eq!(shot.index, 1);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut session = Session::default();
        session.record_shot(150.0, 2.0);
        let snapshot = session.snapshot();

        session.record_shot(160.0, 2.5);
        assert_eq!(snapshot.shot_count, 1);
        assert_eq!(snapshot.velocities, vec![150.0]);
        assert_eq!(snapshot.energies, vec![2.0]);
        assert_eq!(snapshot.timestamps.len(), 1);
        assert_eq!(snapshot.mass_grams, 0.25);
    }
}
