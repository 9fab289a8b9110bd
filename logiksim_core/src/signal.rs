//! Signal and timing primitives for the simulation.
//!
//! This module defines the fundamental types for representing digital
//! signal values and simulated time. Per the design notes, the historical
//! four-valued `{0, 1, X}` logic is intentionally dropped in favor of plain
//! booleans — see `DESIGN.md` for the rationale.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Not;

/// Simulated time, in integer tick units. Monotonically non-decreasing
/// across a single run of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn new(time: u64) -> Self {
        Timestamp(time)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Add a non-negative delay to this timestamp.
    pub fn add_delay(self, delay: u64) -> Self {
        Timestamp(self.0 + delay)
    }
}

impl From<u64> for Timestamp {
    fn from(time: u64) -> Self {
        Timestamp(time)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A two-valued logic signal: `0` (Low) or `1` (High).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Low,
    High,
}

impl Value {
    pub fn from_bool(value: bool) -> Self {
        if value {
            Value::High
        } else {
            Value::Low
        }
    }

    pub fn to_bool(self) -> bool {
        matches!(self, Value::High)
    }

    pub fn and(self, other: Value) -> Value {
        Value::from_bool(self.to_bool() && other.to_bool())
    }

    pub fn or(self, other: Value) -> Value {
        Value::from_bool(self.to_bool() || other.to_bool())
    }

    pub fn xor(self, other: Value) -> Value {
        Value::from_bool(self.to_bool() ^ other.to_bool())
    }
}

impl Not for Value {
    type Output = Value;

    fn not(self) -> Value {
        Value::from_bool(!self.to_bool())
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Low
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::High => write!(f, "1"),
            Value::Low => write!(f, "0"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_operations() {
        assert_eq!(Value::High.and(Value::High), Value::High);
        assert_eq!(Value::High.and(Value::Low), Value::Low);
        assert_eq!(Value::Low.or(Value::Low), Value::Low);
        assert_eq!(Value::Low.or(Value::High), Value::High);
        assert_eq!(Value::High.xor(Value::High), Value::Low);
        assert_eq!(Value::High.xor(Value::Low), Value::High);
        assert_eq!(!Value::High, Value::Low);
        assert_eq!(!Value::Low, Value::High);
    }

    #[test]
    fn test_timestamp_ordering() {
        assert!(Timestamp(5) < Timestamp(10));
        assert_eq!(Timestamp(5).add_delay(3), Timestamp(8));
    }
}
