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

//! Application state visible outside the controller.

use parking_lot::RwLock;
use std::sync::Arc;

/// Connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Connecting => "Connecting...",
            ConnectionStatus::Connected => "Connected",
        }
    }

    /// Label of the action the connect toggle performs in this state.
    pub fn action_hint(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "CONNECT",
            ConnectionStatus::Connecting => "WAIT",
            ConnectionStatus::Connected => "DISCONNECT",
        }
    }
}

/// Shared application state.
///
/// Written only by the controller; other tasks read it.
#[derive(Debug)]
pub struct AppState {
    /// Current connection status.
    pub connection_status: RwLock<ConnectionStatus>,

    /// Connected device name.
    pub connected_device: RwLock<Option<String>>,

    /// Projectile mass last confirmed, in grams.
    pub mass_grams: RwLock<f64>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            connection_status: RwLock::new(ConnectionStatus::Disconnected),
            connected_device: RwLock::new(None),
            mass_grams: RwLock::new(crate::bluetooth::constants::mass::DEFAULT_GRAMS),
        }
    }
}

impl AppState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_connecting(&self) {
        *self.connection_status.write() = ConnectionStatus::Connecting;
    }

    pub fn set_connected(&self, device_name: String) {
        *self.connection_status.write() = ConnectionStatus::Connected;
        *self.connected_device.write() = Some(device_name);
    }

    pub fn set_disconnected(&self) {
        *self.connection_status.write() = ConnectionStatus::Disconnected;
        *self.connected_device.write() = None;
    }

    pub fn get_status(&self) -> ConnectionStatus {
        *self.connection_status.read()
    }

    pub fn get_device_name(&self) -> Option<String> {
        self.connected_device.read().clone()
    }

    pub fn set_mass_grams(&self, grams: f64) {
        *self.mass_grams.write() = grams;
    }

    pub fn get_mass_grams(&self) -> f64 {
        *self.mass_grams.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        let state = AppState::new();
        assert_eq!(state.get_status(), ConnectionStatus::Disconnected);

        state.set_connecting();
        assert_eq!(state.get_status(), ConnectionStatus::Connecting);
        assert_eq!(state.get_device_name(), None);

        state.set_connected("HC-05".to_string());
        assert_eq!(state.get_status(), ConnectionStatus::Connected);
        assert_eq!(state.get_device_name().as_deref(), Some("HC-05"));

        state.set_disconnected();
        assert_eq!(state.get_status(), ConnectionStatus::Disconnected);
        assert_eq!(state.get_device_name(), None);
    }

    #[test]
    fn test_mass_default() {
        let state = AppState::new();
        assert_eq!(state.get_mass_grams(), 0.25);
        state.set_mass_grams(12.5);
        assert_eq!(state.get_mass_grams(), 12.5);
    }
}
