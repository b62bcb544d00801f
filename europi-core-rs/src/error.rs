//! Error types for the core crate.

use core::fmt;

/// Configuration rejected at construction. Fatal to start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// `min_bpm` must be strictly positive.
    NonPositiveMinBpm,
    /// `min_bpm` must be strictly below `max_bpm`.
    InvalidTempoRange { min_bpm: f32, max_bpm: f32 },
    /// Smoothing window length must be within `1..=MAX_WINDOW_LEN`.
    InvalidWindowLength(usize),
    /// Poll interval must be at least one millisecond.
    ZeroPollInterval,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::NonPositiveMinBpm => write!(f, "min_bpm must be greater than zero"),
            ConfigError::InvalidTempoRange { min_bpm, max_bpm } => {
                write!(f, "min_bpm ({}) must be below max_bpm ({})", min_bpm, max_bpm)
            }
            ConfigError::InvalidWindowLength(len) => {
                write!(f, "invalid smoothing window length {}", len)
            }
            ConfigError::ZeroPollInterval => write!(f, "poll interval must be non-zero"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConfigError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ConfigError::NonPositiveMinBpm => defmt::write!(f, "min_bpm must be greater than zero"),
            ConfigError::InvalidTempoRange { min_bpm, max_bpm } => {
                defmt::write!(f, "min_bpm ({}) must be below max_bpm ({})", min_bpm, max_bpm)
            }
            ConfigError::InvalidWindowLength(len) => {
                defmt::write!(f, "invalid smoothing window length {}", len)
            }
            ConfigError::ZeroPollInterval => defmt::write!(f, "poll interval must be non-zero"),
        }
    }
}

/// Errors from scheduling a trigger pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PulseError {
    /// Every pulse slot is in flight; the pulse was not started.
    QueueFull,
}

impl fmt::Display for PulseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PulseError::QueueFull => write!(f, "pulse queue full"),
        }
    }
}
