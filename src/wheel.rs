//! Outcome registry for a single-zero (European) wheel.
//!
//! The catalog holds exactly one `Outcome` per value in 0..=36. Color is a
//! pure function of the value: 0 is green, the rest follow the standard
//! red/black layout.

use crate::types::{Color, EntryInput, Outcome, SessionError};

/// Number of pockets on the wheel.
pub const POCKETS: usize = 37;

/// Highest pocket value.
pub const MAX_VALUE: u8 = 36;

const RED_NUMBERS: [u8; 18] = [
    1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36,
];

/// The full catalog, indexed by value.
pub static CATALOG: [Outcome; POCKETS] = build_catalog();

const fn is_red(value: u8) -> bool {
    let mut i = 0;
    while i < RED_NUMBERS.len() {
        if RED_NUMBERS[i] == value {
            return true;
        }
        i += 1;
    }
    false
}

/// Color of a pocket. Values above 36 are reported as green; use
/// [`lookup`] when the value has not been validated.
pub const fn color_of(value: u8) -> Color {
    if value == 0 || value > MAX_VALUE {
        Color::Green
    } else if is_red(value) {
        Color::Red
    } else {
        Color::Black
    }
}

const fn build_catalog() -> [Outcome; POCKETS] {
    let mut catalog = [Outcome { value: 0, color: Color::Green }; POCKETS];
    let mut v = 0;
    while v < POCKETS {
        catalog[v] = Outcome {
            value: v as u8,
            color: color_of(v as u8),
        };
        v += 1;
    }
    catalog
}

/// Look up the catalog entry for `value`.
pub fn lookup(value: u8) -> Result<Outcome, SessionError> {
    CATALOG
        .get(value as usize)
        .copied()
        .ok_or(SessionError::NotFound(value))
}

/// Lowest-valued catalog entry of the given color.
pub fn representative(color: Color) -> Outcome {
    match color {
        Color::Green => CATALOG[0],
        Color::Red => CATALOG[1],
        Color::Black => CATALOG[2],
    }
}

/// Resolve whatever the operator entered into a catalog outcome.
pub fn resolve_input(input: EntryInput) -> Result<Outcome, SessionError> {
    match input {
        EntryInput::Value(v) => lookup(v),
        EntryInput::Color(c) => Ok(representative(c)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
