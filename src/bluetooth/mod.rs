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

//! Bluetooth communication module.
//!
//! RFCOMM client for the chronograph's serial module, the text framing of its
//! shot reports and the command it accepts.

pub mod constants;
mod connection;
mod link;
mod protocol;
mod reassembler;
mod rfcomm;

pub use connection::{ConnectionEvent, ConnectionHandler, ReaderExit};
pub use link::{ActiveLink, BoxedReader, BoxedWriter, Channel, ConnectError, Connector};
pub use protocol::{locate, parse_block, DeviceCommand, Field, FieldSpan, ParseError, ShotBlock};
pub use reassembler::{EnergyTerminator, LineBuffer};
pub use rfcomm::RfcommConnector;
