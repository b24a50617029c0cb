//! Percentage value object (0-100 scale).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A value between 0 and 100 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percentage(u8);

impl Percentage {
    /// Zero percent.
    pub const ZERO: Self = Self(0);

    /// One hundred percent.
    pub const HUNDRED: Self = Self(100);

    /// Creates a new Percentage, clamping to valid range.
    pub fn new(value: u8) -> Self {
        Self(value.min(100))
    }

    /// Returns the value as u8.
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Rounds down to the nearest multiple of `step`.
    ///
    /// 100 is always preserved so completion is never hidden. A step of 0
    /// or 1 leaves the value untouched.
    pub fn quantize(&self, step: u8) -> Self {
        if step <= 1 || self.0 == 100 {
            return *self;
        }
        Self(self.0 - self.0 % step)
    }
}

impl Default for Percentage {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clamps_to_hundred() {
        assert_eq!(Percentage::new(150).value(), 100);
        assert_eq!(Percentage::new(42).value(), 42);
    }

    #[test]
    fn quantize_rounds_down_to_step() {
        assert_eq!(Percentage::new(57).quantize(10).value(), 50);
        assert_eq!(Percentage::new(9).quantize(10).value(), 0);
        assert_eq!(Percentage::new(57).quantize(1).value(), 57);
        assert_eq!(Percentage::new(57).quantize(0).value(), 57);
    }

    #[test]
    fn quantize_keeps_completion() {
        assert_eq!(Percentage::HUNDRED.quantize(30), Percentage::HUNDRED);
    }

    #[test]
    fn displays_with_percent_sign() {
        assert_eq!(Percentage::new(10).to_string(), "10%");
    }
}
