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

//! Front-end boundary.
//!
//! The controller reports to a [`DisplaySink`] and takes [`UserAction`]s from
//! whatever front end is attached. The console front end lives in [`console`].

pub mod console;

use std::fmt;
use std::path::PathBuf;

use crate::bluetooth::ConnectError;
use crate::mass::ProjectileMass;
use crate::session::{ShotRecord, Statistics};
use crate::state::ConnectionStatus;
use crate::storage::{HistoryError, HistoryView};

pub use console::{run_console, ConsoleDisplay, ConsoleInput, Input};

/// Actions a front end can request.
#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    Connect,
    Disconnect,
    Reset,
    SetMass(ProjectileMass),
    ShowStatistics,
    /// Open the history view, or refresh it from the live session.
    ShowHistory,
    /// Drop an entry (0-based) from the open history view.
    RemoveHistoryEntry(usize),
    ClearHistory,
    ShowDetails(usize),
    ShareEntry(usize),
    /// Write the open history view, or the live session if none is open.
    Export(String),
    Quit,
}

/// User-facing notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Connected { device_name: String },
    Disconnected,
    LinkLost { reason: String },
    ConnectFailed(ConnectError),
    ConnectInProgress,
    AlreadyConnected,
    NotConnected,
    MassSet { grams: f64 },
    CounterReset,
    Exported { count: usize, path: PathBuf },
    ExportFailed { reason: String },
    HistoryNotOpen,
    /// Position is 0-based; shown 1-based.
    NoSuchEntry { position: usize },
    HistoryEntryRemoved { shot_number: u32 },
    HistoryCleared { count: usize },
    HistoryFailed(HistoryError),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Connected { device_name } => write!(f, "Connected to {device_name}"),
            Notice::Disconnected => write!(f, "Disconnected"),
            Notice::LinkLost { reason } => write!(f, "Connection lost: {reason}"),
            Notice::ConnectFailed(err) => match err {
                ConnectError::AdapterOff => write!(f, "Turn Bluetooth on first"),
                ConnectError::NoAdapter => write!(f, "Bluetooth is not supported on this system"),
                ConnectError::PermissionDenied => {
                    write!(f, "Bluetooth permission missing, grant access and try again")
                }
                ConnectError::InvalidAddress(address) => {
                    write!(f, "Check the device address: {address:?} is not valid")
                }
                ConnectError::ServiceNotFound(address) => {
                    write!(f, "{address} has no serial port service")
                }
                ConnectError::Io(reason) => write!(f, "Could not connect: {reason}"),
            },
            Notice::ConnectInProgress => write!(f, "Already connecting"),
            Notice::AlreadyConnected => write!(f, "Already connected"),
            Notice::NotConnected => write!(f, "Not connected to the chronograph"),
            Notice::MassSet { grams } => write!(f, "Mass set: {grams:.2} g"),
            Notice::CounterReset => write!(f, "Counter reset"),
            Notice::Exported { count, path } => {
                write!(f, "Exported {count} records to {}", path.display())
            }
            Notice::ExportFailed { reason } => write!(f, "Export failed: {reason}"),
            Notice::HistoryNotOpen => write!(f, "Open the history first"),
            Notice::NoSuchEntry { position } => {
                write!(f, "No history entry {}", position + 1)
            }
            Notice::HistoryEntryRemoved { shot_number } => {
                write!(f, "Shot #{shot_number} removed from history")
            }
            Notice::HistoryCleared { count } => write!(f, "History cleared ({count} shots)"),
            Notice::HistoryFailed(err) => write!(f, "{err}"),
        }
    }
}

/// Receives everything the controller wants shown.
pub trait DisplaySink: Send {
    /// A new shot was recorded.
    fn shot_recorded(&mut self, shot: &ShotRecord, stats: &Statistics);

    /// The session was reset; readings go back to the no-data state.
    fn session_cleared(&mut self, mass_grams: f64);

    /// The connection status changed.
    fn connection_changed(&mut self, status: ConnectionStatus, device_name: Option<&str>);

    fn show_statistics(&mut self, stats: &Statistics);

    fn show_history(&mut self, history: &HistoryView);

    /// Free text such as the details or share text of a history entry.
    fn show_text(&mut self, text: &str);

    fn notify(&mut self, notice: &Notice);
}

/// Cosmetic speed class used for colouring readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VelocityBand {
    Low,
    Medium,
    High,
}

impl VelocityBand {
    pub fn of(velocity: f64) -> Self {
        if velocity > 180.0 {
            VelocityBand::High
        } else if velocity > 160.0 {
            VelocityBand::Medium
        } else {
            VelocityBand::Low
        }
    }

    /// ANSI colour escape for terminals.
    pub fn ansi(&self) -> &'static str {
        match self {
            VelocityBand::Low => "\x1b[32m",
            VelocityBand::Medium => "\x1b[33m",
            VelocityBand::High => "\x1b[31m",
        }
    }
}
