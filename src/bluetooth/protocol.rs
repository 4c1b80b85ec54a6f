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

//! Chronograph text protocol.
//!
//! The device reports every shot as a block of three lines:
//!
//! ```text
//! Shot #<integer>
//! Speed: <float>
//! Energy: <float>
//! ```
//!
//! The only outbound message is `MASS:<grams>` with two decimals.

use std::fmt;

use thiserror::Error;

use super::constants::{markers, LINE_TERMINATOR};

/// A named field of a shot block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    ShotNumber,
    Speed,
    Energy,
}

impl Field {
    /// All fields, in wire order.
    pub const ALL: [Field; 3] = [Field::ShotNumber, Field::Speed, Field::Energy];

    /// Literal text that precedes the field value.
    pub fn marker(&self) -> &'static str {
        match self {
            Field::ShotNumber => markers::SHOT_NUMBER,
            Field::Speed => markers::SPEED,
            Field::Energy => markers::ENERGY,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::ShotNumber => "shot number",
            Field::Speed => "speed",
            Field::Energy => "energy",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a field value inside a text buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpan<'a> {
    /// Raw value text between the marker and the terminator (untrimmed).
    pub value: &'a str,
    /// Whether something ends the value: a line terminator or, for energy,
    /// the marker of the next block.
    pub terminated: bool,
    /// Byte offset in the searched text just past the value.
    pub end: usize,
}

/// Find the first occurrence of `field` in `text`.
///
/// Returns `None` if the marker is absent. An energy value also ends where
/// the next block's `Shot #` marker starts, since the device may leave out
/// the final newline.
pub fn locate(text: &str, field: Field) -> Option<FieldSpan<'_>> {
    let marker = field.marker();
    let start = text.find(marker)? + marker.len();
    let rest = &text[start..];

    let mut end = rest.find(LINE_TERMINATOR);
    if field == Field::Energy {
        if let Some(next_block) = rest.find(markers::SHOT_NUMBER) {
            end = Some(end.map_or(next_block, |line_end| line_end.min(next_block)));
        }
    }

    Some(match end {
        Some(end) => FieldSpan {
            value: &rest[..end],
            terminated: true,
            end: start + end,
        },
        None => FieldSpan {
            value: rest,
            terminated: false,
            end: text.len(),
        },
    })
}

/// Errors from parsing a shot block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed {field}: {reason}")]
    Malformed { field: Field, reason: String },
}

impl ParseError {
    fn malformed(field: Field, reason: impl Into<String>) -> Self {
        Self::Malformed {
            field,
            reason: reason.into(),
        }
    }

    /// The field that failed to parse.
    pub fn field(&self) -> Field {
        match self {
            Self::Malformed { field, .. } => *field,
        }
    }
}

/// A parsed shot block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotBlock {
    /// Shot number as counted by the device. Informational only.
    pub device_shot_number: u32,
    /// Projectile speed in m/s.
    pub velocity: f64,
    /// Projectile energy in joules.
    pub energy: f64,
}

/// Parse one complete block.
///
/// All three fields must parse or the whole block is rejected. The energy value
/// may run to the end of the block; the other two need a line terminator.
pub fn parse_block(block: &str) -> Result<ShotBlock, ParseError> {
    let device_shot_number = field_value(block, Field::ShotNumber)?
        .parse::<u32>()
        .map_err(|e| ParseError::malformed(Field::ShotNumber, e.to_string()))?;
    let velocity = parse_decimal(block, Field::Speed)?;
    let energy = parse_decimal(block, Field::Energy)?;

    Ok(ShotBlock {
        device_shot_number,
        velocity,
        energy,
    })
}

fn field_value(block: &str, field: Field) -> Result<&str, ParseError> {
    let span = locate(block, field).ok_or_else(|| ParseError::malformed(field, "marker not found"))?;
    if !span.terminated && field != Field::Energy {
        return Err(ParseError::malformed(field, "line is not terminated"));
    }
    Ok(span.value.trim())
}

/// Decimal values always use `.` as separator on the wire.
fn parse_decimal(block: &str, field: Field) -> Result<f64, ParseError> {
    let text = field_value(block, field)?;
    let value = text
        .parse::<f64>()
        .map_err(|e| ParseError::malformed(field, format!("{e}: {text:?}")))?;
    if !value.is_finite() {
        return Err(ParseError::malformed(field, format!("not a finite number: {text:?}")));
    }
    Ok(value)
}

/// Commands sent to the chronograph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceCommand {
    /// Projectile mass in grams, used by the device for energy computation.
    SetMass(f64),
}

impl DeviceCommand {
    /// Command text without the line terminator.
    pub fn to_line(&self) -> String {
        match self {
            DeviceCommand::SetMass(grams) => format!("MASS:{grams:.2}"),
        }
    }

    /// Wire bytes, newline terminated.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut line = self.to_line();
        line.push(LINE_TERMINATOR);
        line.into_bytes()
    }
}
