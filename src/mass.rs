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

//! Projectile mass editing.
//!
//! The mass is edited as four digit wheels: tens of grams, grams, tenths and
//! hundredths. Range checks happen here, before a value reaches the session.

use std::fmt;

use thiserror::Error;

use crate::bluetooth::constants::mass::{DEFAULT_GRAMS, MAX_GRAMS, MIN_GRAMS};

/// Rejected mass input.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum MassError {
    #[error("mass must be at least {min:.2} g (got {0:.2} g)", min = MIN_GRAMS)]
    TooLight(f64),
    #[error("mass must be at most {max:.2} g (got {0:.2} g)", max = MAX_GRAMS)]
    TooHeavy(f64),
    #[error("mass is not a number")]
    NotANumber,
}

/// A validated projectile mass in grams.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct ProjectileMass(f64);

impl ProjectileMass {
    pub fn new(grams: f64) -> Result<Self, MassError> {
        // Compare in hundredths so 0.01 and 99.99 pass despite float noise.
        let hundredths = (grams * 100.0).round();
        if grams.is_nan() {
            Err(MassError::NotANumber)
        } else if hundredths < (MIN_GRAMS * 100.0).round() {
            Err(MassError::TooLight(grams))
        } else if hundredths > (MAX_GRAMS * 100.0).round() {
            Err(MassError::TooHeavy(grams))
        } else {
            Ok(Self(hundredths / 100.0))
        }
    }

    pub fn grams(&self) -> f64 {
        self.0
    }
}

impl Default for ProjectileMass {
    fn default() -> Self {
        Self(DEFAULT_GRAMS)
    }
}

impl fmt::Display for ProjectileMass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} g", self.0)
    }
}

/// Digit positions, most significant first.
pub const DIGIT_HINTS: [&str; 4] = [
    "tens of grams (0-9)",
    "grams (0-9)",
    "tenths (0-9)",
    "hundredths (0-9)",
];

/// Four-digit mass editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MassEditor {
    digits: [u8; 4],
}

impl MassEditor {
    /// Seed the wheels from a mass, clamped into the editable range.
    pub fn from_grams(grams: f64) -> Self {
        let hundredths = (grams * 100.0).round().clamp(1.0, 9999.0) as u16;
        Self {
            digits: [
                (hundredths / 1000 % 10) as u8,
                (hundredths / 100 % 10) as u8,
                (hundredths / 10 % 10) as u8,
                (hundredths % 10) as u8,
            ],
        }
    }

    pub fn digits(&self) -> [u8; 4] {
        self.digits
    }

    fn hundredths(&self) -> u16 {
        self.digits
            .iter()
            .fold(0u16, |acc, &d| acc * 10 + u16::from(d))
    }

    /// Current value in grams.
    pub fn grams(&self) -> f64 {
        f64::from(self.hundredths()) / 100.0
    }

    /// Roll a wheel up, carrying into the wheel on its left.
    ///
    /// Rolling past 99.99 wraps round to the 0.01 floor.
    pub fn increment(&mut self, position: usize) {
        if position >= self.digits.len() {
            return;
        }
        let mut carry_from = Some(position);
        while let Some(pos) = carry_from {
            if self.digits[pos] == 9 {
                self.digits[pos] = 0;
                carry_from = pos.checked_sub(1);
            } else {
                self.digits[pos] += 1;
                carry_from = None;
            }
        }
        self.floor();
    }

    /// Roll a wheel down, borrowing from the wheel on its left.
    ///
    /// Rolling below 0.01 sticks at 0.01.
    pub fn decrement(&mut self, position: usize) {
        if position >= self.digits.len() {
            return;
        }
        let mut borrow_from = Some(position);
        while let Some(pos) = borrow_from {
            if self.digits[pos] == 0 {
                self.digits[pos] = 9;
                borrow_from = pos.checked_sub(1);
            } else {
                self.digits[pos] -= 1;
                borrow_from = None;
            }
        }
        self.floor();
    }

    fn floor(&mut self) {
        if self.hundredths() == 0 {
            self.digits = [0, 0, 0, 1];
        }
    }

    /// Back to the default mass.
    pub fn reset(&mut self) {
        *self = Self::from_grams(DEFAULT_GRAMS);
    }

    /// Validate the edited value.
    pub fn confirm(&self) -> Result<ProjectileMass, MassError> {
        ProjectileMass::new(self.grams())
    }
}

impl Default for MassEditor {
    fn default() -> Self {
        Self::from_grams(DEFAULT_GRAMS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mass_range() {
        assert_eq!(ProjectileMass::new(0.01).unwrap().grams(), 0.01);
        assert_eq!(ProjectileMass::new(99.99).unwrap().grams(), 99.99);
        assert_eq!(ProjectileMass::new(0.0), Err(MassError::TooLight(0.0)));
        assert_eq!(ProjectileMass::new(100.0), Err(MassError::TooHeavy(100.0)));
        assert_eq!(ProjectileMass::new(f64::NAN), Err(MassError::NotANumber));
    }

    #[test]
    fn test_mass_error_message() {
        let err = ProjectileMass::new(120.0).unwrap_err();
        assert_eq!(err.to_string(), "mass must be at most 99.99 g (got 120.00 g)");
    }

    #[test]
    fn test_editor_from_grams() {
        assert_eq!(MassEditor::from_grams(12.5).digits(), [1, 2, 5, 0]);
        assert_eq!(MassEditor::from_grams(0.25).digits(), [0, 0, 2, 5]);
        assert_eq!(MassEditor::from_grams(0.0).digits(), [0, 0, 0, 1]);
        assert_eq!(MassEditor::from_grams(250.0).digits(), [9, 9, 9, 9]);
    }

    #[test]
    fn test_increment_carries() {
        let mut editor = MassEditor::from_grams(0.99);
        editor.increment(3);
        assert_eq!(editor.digits(), [0, 1, 0, 0]);
        assert_eq!(editor.grams(), 1.0);
    }

    #[test]
    fn test_increment_wraps_past_max() {
        let mut editor = MassEditor::from_grams(99.99);
        editor.increment(3);
        assert_eq!(editor.digits(), [0, 0, 0, 1]);
        assert_eq!(editor.confirm().unwrap().grams(), 0.01);

        let mut editor = MassEditor::from_grams(95.0);
        editor.increment(0);
        assert_eq!(editor.digits(), [0, 5, 0, 0]);

        let mut editor = MassEditor::from_grams(99.9);
        editor.increment(2);
        assert_eq!(editor.digits(), [0, 0, 0, 1]);
    }

    #[test]
    fn test_decrement_borrows() {
        let mut editor = MassEditor::from_grams(1.0);
        editor.decrement(3);
        assert_eq!(editor.digits(), [0, 0, 9, 9]);
    }

    #[test]
    fn test_decrement_floor() {
        let mut editor = MassEditor::from_grams(0.01);
        editor.decrement(3);
        assert_eq!(editor.digits(), [0, 0, 0, 1]);
    }

    #[test]
    fn test_confirm_and_reset() {
        let mut editor = MassEditor::from_grams(12.5);
        assert_eq!(editor.confirm().unwrap().grams(), 12.5);

        editor.reset();
        assert_eq!(editor.grams(), 0.25);
        assert_eq!(editor.confirm().unwrap().to_string(), "0.25 g");
    }

    #[test]
    fn test_out_of_range_position_is_ignored() {
        let mut editor = MassEditor::default();
        editor.increment(7);
        editor.decrement(7);
        assert_eq!(editor, MassEditor::default());
    }
}
