//! Fault injection parameters.

use std::fmt;
use std::time::Duration;

/// A percentage in `0..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Percent(u8);

/// Returned when a value above 100 is turned into a [`Percent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("percentage must be between 0 and 100, got {0}")]
pub struct PercentError(pub u32);

impl Percent {
    pub const ZERO: Percent = Percent(0);
    pub const HUNDRED: Percent = Percent(100);

    /// Create a percentage, rejecting values above 100.
    pub fn new(value: u32) -> Result<Self, PercentError> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= 100)
            .map(Percent)
            .ok_or(PercentError(value))
    }

    /// Numeric value in `0..=100`.
    pub fn get(self) -> u32 {
        u32::from(self.0)
    }
}

impl TryFrom<u32> for Percent {
    type Error = PercentError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Percent::new(value)
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Immutable fault parameters for a handler.
///
/// `delay` only applies to the primary endpoint; the health endpoint never
/// sleeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultConfig {
    /// Chance that a request fails
    pub fail: Percent,

    /// Artificial delay applied before responding
    pub delay: Duration,
}

impl FaultConfig {
    /// Create a fault configuration
    pub fn new(fail: Percent, delay: Duration) -> Self {
        Self { fail, delay }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_bounds() {
        assert_eq!(Percent::new(0).unwrap(), Percent::ZERO);
        assert_eq!(Percent::new(100).unwrap(), Percent::HUNDRED);
        assert_eq!(Percent::new(101), Err(PercentError(101)));
        assert_eq!(Percent::new(70_000), Err(PercentError(70_000)));
    }

    #[test]
    fn test_percent_display() {
        assert_eq!(Percent::new(25).unwrap().to_string(), "25%");
    }

    #[test]
    fn test_fault_config_default_never_fails() {
        let config = FaultConfig::default();
        assert_eq!(config.fail.get(), 0);
        assert!(config.delay.is_zero());
    }
}
