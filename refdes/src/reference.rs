//! Reference Records
//!
//! A [`Reference`] is one symbol unit as it occurs on one sheet instance of a
//! hierarchy. It carries the reference text (full text until split, prefix
//! afterwards), the numeric suffix and everything the annotator and checker
//! compare on.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Position of a symbol on its sheet
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Identity of a symbol occurrence: the same symbol on two sheet instances
/// yields two distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    pub uuid: Uuid,
    pub sheet_path: String,
}

#[derive(Debug, Clone)]
pub struct Reference {
    /// Full reference text before [`Reference::split`], prefix afterwards
    reference: String,
    needs_split: bool,

    /// Numeric suffix, -1 when not assigned
    pub number: i32,
    /// True until a number has been committed
    pub is_new: bool,
    pub unit: i32,
    pub unit_count: i32,
    pub value: String,
    pub footprint: String,
    pub lib_name: String,
    pub position: Position,
    pub sheet_number: i32,
    pub sheet_path: String,
    pub uuid: Uuid,

    pub(crate) flag: bool,
}

impl Reference {
    /// Create a record from its reference text (e.g. `"R12"`, `"U?"`).
    ///
    /// An empty reference becomes `DefRef?` and an empty value becomes `~`,
    /// the same placeholders the schematic editor writes.
    pub fn new(reference: impl Into<String>, uuid: Uuid) -> Self {
        let mut reference = reference.into();
        if reference.is_empty() {
            reference = "DefRef?".to_string();
        }

        Self {
            reference,
            needs_split: true,
            number: -1,
            is_new: false,
            unit: 1,
            unit_count: 1,
            value: "~".to_string(),
            footprint: String::new(),
            lib_name: String::new(),
            position: Position::default(),
            sheet_number: 1,
            sheet_path: "/".to_string(),
            uuid,
            flag: false,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        self.value = if value.is_empty() { "~".to_string() } else { value };
        self
    }

    pub fn with_unit(mut self, unit: i32, unit_count: i32) -> Self {
        self.unit = unit;
        self.unit_count = unit_count;
        self
    }

    pub fn with_lib_name(mut self, lib_name: impl Into<String>) -> Self {
        self.lib_name = lib_name.into();
        self
    }

    pub fn with_footprint(mut self, footprint: impl Into<String>) -> Self {
        self.footprint = footprint.into();
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Position::new(x, y);
        self
    }

    pub fn with_sheet(mut self, sheet_number: i32, sheet_path: impl Into<String>) -> Self {
        self.sheet_number = sheet_number;
        self.sheet_path = sheet_path.into();
        self
    }

    /// Reference prefix once split, full reference text before that.
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Replace the reference text; the record must be split again.
    pub fn set_reference(&mut self, reference: impl Into<String>) {
        self.reference = reference.into();
        self.needs_split = true;
    }

    pub fn instance_key(&self) -> InstanceKey {
        InstanceKey {
            uuid: self.uuid,
            sheet_path: self.sheet_path.clone(),
        }
    }

    pub fn is_same_instance(&self, other: &Reference) -> bool {
        self.uuid == other.uuid && self.sheet_path == other.sheet_path
    }

    pub fn is_split_needed(&self) -> bool {
        if !self.needs_split {
            return false;
        }

        match self.reference.as_bytes().last() {
            Some(b'?') => true,
            Some(c) => c.is_ascii_digit(),
            None => false,
        }
    }

    /// Decompose the reference text into prefix and number.
    ///
    /// `R12` gives `("R", 12)`, `U?` gives `("U", -1)` and marks the record
    /// unannotated. Characters at or below a space inside the trailing digit
    /// run are skipped, so historical texts like `R1 2` still parse. Splitting
    /// twice is a no-op.
    pub fn split(&mut self) {
        if !self.needs_split {
            return;
        }
        self.needs_split = false;
        self.number = -1;

        let bytes = self.reference.as_bytes();
        let Some(&last) = bytes.last() else {
            self.is_new = true;
            return;
        };

        if last == b'?' {
            self.is_new = true;
            self.reference.pop();
            return;
        }

        if !last.is_ascii_digit() {
            self.is_new = true;
            return;
        }

        let mut boundary = bytes.len();
        while boundary > 0 {
            let c = bytes[boundary - 1];
            if c <= b' ' || c.is_ascii_digit() {
                boundary -= 1;
                continue;
            }

            if bytes[boundary].is_ascii_digit() {
                self.number = leading_number(&bytes[boundary..]);
                self.is_new = false;
            }
            self.reference.truncate(boundary);
            return;
        }
        // all digits: nothing to split off
    }

    /// Number suffix for display: `?` when unassigned, zero-padded for power
    /// symbols so `#PWR1` never collides with a user reference.
    pub fn ref_number(&self) -> String {
        if self.number < 0 {
            "?".to_string()
        } else if self.reference.starts_with('#') {
            format!("0{}", self.number)
        } else {
            self.number.to_string()
        }
    }

    /// Prefix and number, e.g. `U3` or `R?`.
    pub fn full_ref(&self) -> String {
        format!("{}{}", self.reference, self.ref_number())
    }

    /// Prefix, number and unit letter for multi-unit symbols, e.g. `U3B`.
    pub fn display_ref(&self) -> String {
        if self.unit_count > 1 {
            format!("{}{}", self.full_ref(), sub_reference(self.unit))
        } else {
            self.full_ref()
        }
    }

    /// Key used to reserve a reference for one unit: `U3..2`.
    pub fn full_reference(&self, unit: Option<i32>) -> String {
        format!(
            "{}{}..{}",
            self.reference,
            self.ref_number(),
            unit.unwrap_or(self.unit)
        )
    }
}

/// Letter suffix for a unit: 1 is `A`, 26 is `Z`, 27 is `AA`, 703 is `AAA`.
pub fn sub_reference(unit: i32) -> String {
    let mut letters = Vec::new();
    let mut n = unit;

    while n > 0 {
        let u = (n - 1) % 26;
        letters.push(b'A' + u as u8);
        n = (n - u) / 26;
    }

    letters.iter().rev().map(|&c| c as char).collect()
}

/// `atoi` on a digit run that may contain blanks: stops at the first non-digit.
fn leading_number(bytes: &[u8]) -> i32 {
    let mut value: i32 = 0;
    for &c in bytes {
        if !c.is_ascii_digit() {
            break;
        }
        value = value.saturating_mul(10).saturating_add((c - b'0') as i32);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(text: &str) -> Reference {
        let mut r = Reference::new(text, Uuid::new_v4());
        r.split();
        r
    }

    #[test]
    fn test_split_numbered() {
        let r = split("R12");
        assert_eq!(r.reference(), "R");
        assert_eq!(r.number, 12);
        assert!(!r.is_new);
    }

    #[test]
    fn test_split_unannotated() {
        let r = split("U?");
        assert_eq!(r.reference(), "U");
        assert_eq!(r.number, -1);
        assert!(r.is_new);

        let r = split("DefRef");
        assert_eq!(r.reference(), "DefRef");
        assert!(r.is_new);
    }

    #[test]
    fn test_split_is_idempotent() {
        let mut r = split("IC42");
        r.split();
        assert_eq!(r.reference(), "IC");
        assert_eq!(r.number, 42);
        assert!(!r.is_new);
        assert!(!r.is_split_needed());
    }

    #[test]
    fn test_split_embedded_blanks() {
        let r = split("R1 2");
        assert_eq!(r.reference(), "R");
        assert_eq!(r.number, 1);

        // blank right after the prefix: no number recovered
        let r = split("R 12");
        assert_eq!(r.reference(), "R");
        assert_eq!(r.number, -1);
    }

    #[test]
    fn test_split_all_digits() {
        let r = split("123");
        assert_eq!(r.reference(), "123");
        assert_eq!(r.number, -1);
    }

    #[test]
    fn test_split_needed() {
        let r = Reference::new("C7", Uuid::new_v4());
        assert!(r.is_split_needed());
        let r = Reference::new("C", Uuid::new_v4());
        assert!(!r.is_split_needed());
        assert_eq!(Reference::new("", Uuid::new_v4()).reference(), "DefRef?");
    }

    #[test]
    fn test_ref_number_and_power_prefix() {
        let mut r = split("R?");
        assert_eq!(r.full_ref(), "R?");
        r.number = 4;
        assert_eq!(r.full_ref(), "R4");

        let p = split("#PWR03");
        assert_eq!(p.number, 3);
        assert_eq!(p.full_ref(), "#PWR03");
    }

    #[test]
    fn test_sub_reference() {
        assert_eq!(sub_reference(0), "");
        assert_eq!(sub_reference(1), "A");
        assert_eq!(sub_reference(26), "Z");
        assert_eq!(sub_reference(27), "AA");
        assert_eq!(sub_reference(52), "AZ");
        assert_eq!(sub_reference(53), "BA");
        assert_eq!(sub_reference(702), "ZZ");
        assert_eq!(sub_reference(703), "AAA");
        assert_eq!(sub_reference(4993), "GJA");
        assert_eq!(sub_reference(-3), "");
    }

    #[test]
    fn test_sub_reference_large_units() {
        let letters = sub_reference(i32::MAX);
        assert!(!letters.is_empty());
        assert!(letters.bytes().all(|c| c.is_ascii_uppercase()));
    }

    #[test]
    fn test_full_reference_key() {
        let r = split("U3").with_unit(2, 4);
        assert_eq!(r.full_reference(None), "U3..2");
        assert_eq!(r.full_reference(Some(4)), "U3..4");
        assert_eq!(r.display_ref(), "U3B");
    }
}
