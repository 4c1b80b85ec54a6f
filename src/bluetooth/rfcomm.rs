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

//! Bluetooth RFCOMM client for the HC-05 serial module.

use bluer::rfcomm::{SocketAddr, Stream};
use bluer::{Address, ErrorKind};
use tracing::{debug, info, warn};

use super::constants::SPP_UUID;
use super::link::{Channel, ConnectError, Connector};
use crate::config::BluetoothConfig;

/// Connects to the chronograph over BlueZ.
#[derive(Debug, Clone)]
pub struct RfcommConnector {
    address: String,
    channel: u8,
}

impl RfcommConnector {
    pub fn new(address: impl Into<String>, channel: u8) -> Self {
        Self {
            address: address.into(),
            channel,
        }
    }

    pub fn from_config(config: &BluetoothConfig) -> Self {
        Self::new(config.device_address.clone(), config.rfcomm_channel)
    }

    /// Parse the configured address.
    pub fn address(&self) -> Result<Address, ConnectError> {
        self.address
            .parse()
            .map_err(|_| ConnectError::InvalidAddress(self.address.clone()))
    }
}

/// Classify a BlueZ error.
fn classify(err: bluer::Error) -> ConnectError {
    match err.kind {
        ErrorKind::NotReady => ConnectError::AdapterOff,
        ErrorKind::NotAuthorized | ErrorKind::NotPermitted => ConnectError::PermissionDenied,
        ErrorKind::NotFound => ConnectError::NoAdapter,
        _ => ConnectError::Io(err.to_string()),
    }
}

impl Connector for RfcommConnector {
    async fn connect(&self) -> Result<Channel, ConnectError> {
        let address = self.address()?;

        let session = bluer::Session::new().await.map_err(classify)?;
        let adapter = session.default_adapter().await.map_err(classify)?;
        info!("Using Bluetooth adapter: {}", adapter.name());

        if !adapter.is_powered().await.map_err(classify)? {
            return Err(ConnectError::AdapterOff);
        }

        let device = adapter.device(address).map_err(classify)?;
        match device.uuids().await {
            Ok(Some(uuids)) if !uuids.contains(&SPP_UUID) => {
                warn!("{} advertises {} services, none of them SPP", address, uuids.len());
                return Err(ConnectError::ServiceNotFound(address.to_string()));
            }
            Ok(_) => {}
            Err(e) if matches!(e.kind, ErrorKind::DoesNotExist) => {
                // Not paired or discovered yet; RFCOMM can still reach it.
                debug!("{} unknown to BlueZ, connecting directly", address);
            }
            Err(e) => return Err(classify(e)),
        }
        let device_name = device
            .alias()
            .await
            .unwrap_or_else(|_| address.to_string());

        info!("Connecting to {} ({}) on channel {}", device_name, address, self.channel);
        let stream = Stream::connect(SocketAddr::new(address, self.channel))
            .await
            .map_err(|e| ConnectError::from_io(&e))?;

        let (reader, writer) = stream.into_split();
        Ok(Channel::new(device_name, reader, writer))
    }
}
