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

//! Reader task for a single serial connection.
//!
//! The reader only moves bytes. Everything it reads is forwarded as a
//! [`ConnectionEvent`] to the consumer, which owns all parsing state.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use super::constants::READ_CHUNK_SIZE;
use super::link::{Channel, ConnectError};

/// Events delivered to the consumer.
///
/// Every event carries the id of the link it belongs to, so the consumer can
/// drop events from a link it already tore down.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// A connect attempt finished.
    ConnectFinished {
        link_id: u64,
        result: Result<Channel, ConnectError>,
    },
    /// Raw bytes read from the device.
    DataReceived { link_id: u64, data: Vec<u8> },
    /// The device closed the stream or a read failed.
    Lost { link_id: u64, reason: String },
}

impl ConnectionEvent {
    pub fn link_id(&self) -> u64 {
        match self {
            ConnectionEvent::ConnectFinished { link_id, .. }
            | ConnectionEvent::DataReceived { link_id, .. }
            | ConnectionEvent::Lost { link_id, .. } => *link_id,
        }
    }
}

/// How a reader task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderExit {
    /// Stop was requested by the owner.
    Stopped,
    /// The device closed the stream.
    Closed,
    /// A read failed.
    Failed,
    /// The consumer dropped its receiver.
    ConsumerGone,
    /// The task did not finish cleanly.
    Aborted,
}

/// Handler for a single serial connection.
pub struct ConnectionHandler<R> {
    reader: R,
    link_id: u64,
    event_tx: mpsc::Sender<ConnectionEvent>,
}

impl<R: AsyncRead + Unpin> ConnectionHandler<R> {
    /// Create a new connection handler.
    pub fn new(reader: R, link_id: u64, event_tx: mpsc::Sender<ConnectionEvent>) -> Self {
        Self {
            reader,
            link_id,
            event_tx,
        }
    }

    /// Run the read loop until the stream ends or `stop_rx` fires.
    ///
    /// A stop request never produces a [`ConnectionEvent::Lost`]. Dropping the
    /// stop sender counts as a stop request.
    pub async fn run(mut self, mut stop_rx: oneshot::Receiver<()>) -> ReaderExit {
        info!("Connection handler started (link {})", self.link_id);
        let mut buf = vec![0u8; READ_CHUNK_SIZE];

        loop {
            let read = tokio::select! {
                biased;
                _ = &mut stop_rx => {
                    info!("Reader stopped on request (link {})", self.link_id);
                    return ReaderExit::Stopped;
                }
                read = self.reader.read(&mut buf) => read,
            };

            let (event, exit) = match read {
                Ok(0) => {
                    info!("Connection closed by remote");
                    let event = ConnectionEvent::Lost {
                        link_id: self.link_id,
                        reason: "connection closed by device".to_string(),
                    };
                    (event, Some(ReaderExit::Closed))
                }
                Ok(n) => {
                    debug!("Received: {:?}", String::from_utf8_lossy(&buf[..n]));
                    let event = ConnectionEvent::DataReceived {
                        link_id: self.link_id,
                        data: buf[..n].to_vec(),
                    };
                    (event, None)
                }
                Err(e) => {
                    error!("Read error: {}", e);
                    let event = ConnectionEvent::Lost {
                        link_id: self.link_id,
                        reason: e.to_string(),
                    };
                    (event, Some(ReaderExit::Failed))
                }
            };

            // The consumer may be the one waiting for us to stop, so a full
            // queue must not block the stop request.
            tokio::select! {
                biased;
                _ = &mut stop_rx => {
                    info!("Reader stopped on request (link {})", self.link_id);
                    return ReaderExit::Stopped;
                }
                sent = self.event_tx.send(event) => {
                    if sent.is_err() {
                        debug!("Event consumer gone, reader exiting");
                        return ReaderExit::ConsumerGone;
                    }
                }
            }

            if let Some(exit) = exit {
                return exit;
            }
        }
    }
}
