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

//! Configuration module.
//!
//! Handles loading and saving application settings.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::bluetooth::constants::{
    mass, DEFAULT_DEVICE_ADDRESS, DEFAULT_IDLE_FLUSH_MS, DEFAULT_RFCOMM_CHANNEL,
};
use crate::bluetooth::EnergyTerminator;
use crate::mass::ProjectileMass;

const APP_DIR: &str = "chronograph-link";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for exports.
    #[serde(skip)]
    pub data_dir: PathBuf,

    /// Bluetooth settings.
    pub bluetooth: BluetoothConfig,

    /// Session settings.
    pub session: SessionConfig,

    /// Protocol settings.
    pub protocol: ProtocolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Address of the chronograph's serial module.
    pub device_address: String,

    /// RFCOMM channel of the serial port service.
    pub rfcomm_channel: u8,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            device_address: DEFAULT_DEVICE_ADDRESS.to_string(),
            rfcomm_channel: DEFAULT_RFCOMM_CHANNEL,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Projectile mass at startup, in grams.
    pub default_mass_grams: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_mass_grams: mass::DEFAULT_GRAMS,
        }
    }
}

impl SessionConfig {
    /// The configured mass, or the default if it is out of range.
    pub fn mass(&self) -> ProjectileMass {
        ProjectileMass::new(self.default_mass_grams).unwrap_or_else(|e| {
            warn!("Ignoring default_mass_grams: {}, using {}", e, ProjectileMass::default());
            ProjectileMass::default()
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// What ends the energy line of a shot block.
    pub energy_terminator: EnergyTerminator,

    /// Quiet time in milliseconds before a block missing its final newline
    /// is taken anyway. 0 turns this off.
    pub idle_flush_ms: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            energy_terminator: EnergyTerminator::default(),
            idle_flush_ms: DEFAULT_IDLE_FLUSH_MS,
        }
    }
}

impl ProtocolConfig {
    pub fn idle_flush(&self) -> Option<Duration> {
        (self.idle_flush_ms > 0).then(|| Duration::from_millis(self.idle_flush_ms))
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

impl Config {
    /// Path of the configuration file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Load configuration from file or create default.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::default_path())?;

        // Set data directory
        config.data_dir = data_dir();
        std::fs::create_dir_all(&config.data_dir)?;

        Ok(config)
    }

    /// Load configuration from `path`, writing defaults there if it is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let mut config: Self = toml::from_str(&content)?;
            config.session.default_mass_grams = config.session.mass().grams();
            config
        } else {
            let config = Self::default();
            config.save_to(path)?;
            config
        };

        Ok(config)
    }

    /// Save configuration to file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolve an export target. Bare file names land in the data directory.
    pub fn export_path(&self, target: &str) -> PathBuf {
        let path = Path::new(target);
        if path.is_absolute() || path.components().count() > 1 {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }
}
