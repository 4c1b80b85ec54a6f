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

//! Shot history review and export.
//!
//! A [`HistoryView`] is built from a [`HistorySnapshot`] and owns its own copy
//! of the shots. Removing or clearing entries never touches the live session.

use anyhow::Result;
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::session::{HistorySnapshot, Statistics};

/// Header row of the exported table.
pub const CSV_HEADER: &str = "Номер;Время;Скорость (м/с);Энергия (Дж)";

/// Errors from history operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("no shot data to export")]
    NothingToExport,
    #[error("history is already empty")]
    AlreadyEmpty,
}

/// A single history entry.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    /// Session index the shot had when the snapshot was taken.
    pub shot_number: u32,
    pub velocity: f64,
    pub energy: f64,
    pub timestamp: DateTime<Local>,
}

impl HistoryEntry {
    /// Capture time as `HH:MM:SS`.
    pub fn time(&self) -> String {
        self.timestamp.format("%H:%M:%S").to_string()
    }
}

/// Editable copy of a session's shots.
#[derive(Debug, Clone)]
pub struct HistoryView {
    entries: Vec<HistoryEntry>,
    mass_grams: f64,
}

impl HistoryView {
    /// Build a view from a session snapshot.
    pub fn from_snapshot(snapshot: HistorySnapshot) -> Self {
        let entries = snapshot
            .velocities
            .iter()
            .zip(&snapshot.energies)
            .enumerate()
            .map(|(i, (&velocity, &energy))| HistoryEntry {
                shot_number: i as u32 + 1,
                velocity,
                energy,
                timestamp: snapshot
                    .timestamps
                    .get(i)
                    .copied()
                    .unwrap_or_else(Local::now),
            })
            .collect();

        Self {
            entries,
            mass_grams: snapshot.mass_grams,
        }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn mass_grams(&self) -> f64 {
        self.mass_grams
    }

    /// Statistics over the entries currently in the view.
    pub fn statistics(&self) -> Statistics {
        Statistics::from_pairs(self.entries.iter().map(|e| (e.velocity, e.energy)))
    }

    /// One-line statistics summary.
    pub fn summary(&self) -> String {
        let stats = self.statistics();
        match (stats.velocity, stats.energy) {
            (Some(v), Some(e)) => format!(
                "Total: {} | Speed: max {:.1}/min {:.1}/avg {:.1} m/s | Energy: max {:.2}/avg {:.2} J",
                stats.count, v.max, v.min, v.avg, e.max, e.avg
            ),
            _ => "No shot data".to_string(),
        }
    }

    /// Multi-line description of one entry.
    pub fn details(&self, position: usize) -> Option<String> {
        let entry = self.entries.get(position)?;
        Some(format!(
            "Shot #{}\nSpeed: {:.1} m/s\nEnergy: {:.2} J\nTime: {}\nMass: {:.2} g",
            entry.shot_number,
            entry.velocity,
            entry.energy,
            entry.time(),
            self.mass_grams
        ))
    }

    /// Single-line text for sharing one entry.
    pub fn share_text(&self, position: usize) -> Option<String> {
        let entry = self.entries.get(position)?;
        Some(format!(
            "Shot #{}: speed {:.1} m/s, energy {:.2} J. Time: {}",
            entry.shot_number,
            entry.velocity,
            entry.energy,
            entry.time()
        ))
    }

    /// Remove the entry at `position`.
    pub fn remove_at(&mut self, position: usize) -> Option<HistoryEntry> {
        if position < self.entries.len() {
            Some(self.entries.remove(position))
        } else {
            None
        }
    }

    /// Remove all entries, returning how many were dropped.
    pub fn clear(&mut self) -> Result<usize, HistoryError> {
        if self.entries.is_empty() {
            return Err(HistoryError::AlreadyEmpty);
        }
        let count = self.entries.len();
        self.entries.clear();
        info!("History cleared ({} entries)", count);
        Ok(count)
    }

    /// Render the entries as a semicolon separated table.
    pub fn to_csv(&self) -> Result<String, HistoryError> {
        if self.entries.is_empty() {
            return Err(HistoryError::NothingToExport);
        }

        let mut csv = String::with_capacity(64 + self.entries.len() * 32);
        csv.push_str(CSV_HEADER);
        csv.push('\n');
        for entry in &self.entries {
            // Writing into a String cannot fail.
            let _ = writeln!(
                csv,
                "{};{};{:.1};{:.2}",
                entry.shot_number,
                entry.time(),
                entry.velocity,
                entry.energy
            );
        }
        Ok(csv)
    }

    /// Export history to a file. Returns the number of rows written.
    pub fn export(&self, path: &Path) -> Result<usize> {
        let csv = self.to_csv()?;
        std::fs::write(path, csv)?;
        info!("Exported {} entries to {:?}", self.entries.len(), path);
        Ok(self.entries.len())
    }
}
