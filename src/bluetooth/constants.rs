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

//! Serial link and wire protocol constants for the chronograph.

use uuid::Uuid;

/// Standard Serial Port Profile UUID, advertised by the HC-05 module.
pub const SPP_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// Address of the HC-05 module the chronograph ships with.
pub const DEFAULT_DEVICE_ADDRESS: &str = "00:18:E4:34:EF:18";

/// RFCOMM channel the HC-05 serves SPP on.
pub const DEFAULT_RFCOMM_CHANNEL: u8 = 1;

/// Size of a single read from the serial stream.
pub const READ_CHUNK_SIZE: usize = 1024;

/// Capacity of the event channel between the reader task and the consumer.
pub const EVENT_QUEUE_DEPTH: usize = 64;

/// Most text the line buffer holds while waiting for a block to complete.
pub const MAX_BUFFER_BYTES: usize = 4096;

/// Quiet time after which a trailing block without a final newline is taken.
pub const DEFAULT_IDLE_FLUSH_MS: u64 = 500;

/// Inbound protocol markers. Each one prefixes a field value on its own line.
pub mod markers {
    pub const SHOT_NUMBER: &str = "Shot #";
    pub const SPEED: &str = "Speed: ";
    pub const ENERGY: &str = "Energy: ";
}

/// Line terminator of the text protocol in both directions.
pub const LINE_TERMINATOR: char = '\n';

/// Mass parameter limits, in grams.
pub mod mass {
    pub const DEFAULT_GRAMS: f64 = 0.25;
    pub const MIN_GRAMS: f64 = 0.01;
    pub const MAX_GRAMS: f64 = 99.99;
}
