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

//! Serial link lifecycle.
//!
//! A [`Connector`] opens a [`Channel`]; [`ActiveLink`] owns it while
//! connected, with the read half moved into a reader task and the write half
//! kept for commands.

use std::fmt;
use std::future::Future;
use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::connection::{ConnectionEvent, ConnectionHandler, ReaderExit};
use super::protocol::DeviceCommand;

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// An open serial channel to the device.
pub struct Channel {
    pub device_name: String,
    pub reader: BoxedReader,
    pub writer: BoxedWriter,
}

impl Channel {
    pub fn new(
        device_name: impl Into<String>,
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            device_name: device_name.into(),
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("device_name", &self.device_name)
            .finish_non_exhaustive()
    }
}

/// Reasons a connect attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("Bluetooth adapter is turned off")]
    AdapterOff,
    #[error("no Bluetooth adapter available")]
    NoAdapter,
    #[error("Bluetooth permission missing")]
    PermissionDenied,
    #[error("invalid device address {0:?}")]
    InvalidAddress(String),
    #[error("device {0} does not offer the serial port service")]
    ServiceNotFound(String),
    #[error("connection failed: {0}")]
    Io(String),
}

impl ConnectError {
    /// Classify a socket error.
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => ConnectError::PermissionDenied,
            _ => ConnectError::Io(err.to_string()),
        }
    }
}

/// Opens serial channels to the chronograph.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self) -> impl Future<Output = Result<Channel, ConnectError>> + Send;
}

/// A connected link: the reader task plus the write half.
pub struct ActiveLink {
    link_id: u64,
    device_name: String,
    writer: BoxedWriter,
    stop_tx: Option<oneshot::Sender<()>>,
    reader: JoinHandle<ReaderExit>,
}

impl ActiveLink {
    /// Spawn the reader task for `channel`.
    pub fn start(link_id: u64, channel: Channel, event_tx: mpsc::Sender<ConnectionEvent>) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel();
        let handler = ConnectionHandler::new(channel.reader, link_id, event_tx);
        let reader = tokio::spawn(handler.run(stop_rx));
        info!("Link {} up to {}", link_id, channel.device_name);

        Self {
            link_id,
            device_name: channel.device_name,
            writer: channel.writer,
            stop_tx: Some(stop_tx),
            reader,
        }
    }

    pub fn link_id(&self) -> u64 {
        self.link_id
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Write a command line to the device.
    pub async fn send(&mut self, command: &DeviceCommand) -> io::Result<()> {
        self.writer.write_all(&command.to_wire()).await?;
        self.writer.flush().await?;
        debug!("Sent command: {}", command.to_line());
        Ok(())
    }

    /// Tear the link down.
    ///
    /// Signals the reader, waits for it to exit, and only then closes the
    /// write half.
    pub async fn close(mut self) -> ReaderExit {
        if let Some(stop_tx) = self.stop_tx.take() {
            // Fails only if the reader already exited on its own.
            let _ = stop_tx.send(());
        }

        let exit = match (&mut self.reader).await {
            Ok(exit) => exit,
            Err(e) => {
                error!("Reader task for link {} failed: {}", self.link_id, e);
                ReaderExit::Aborted
            }
        };

        if let Err(e) = self.writer.shutdown().await {
            debug!("Write half shutdown: {}", e);
        }
        info!("Link {} closed ({:?})", self.link_id, exit);
        exit
    }
}
