use std::time::Duration;

use thiserror::Error;

use crate::valve_state::ValveState;
use crate::variant::Variant;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);
pub const DEFAULT_GUARD: Duration = Duration::from_millis(400);
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(5);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown valve variant \"{0}\", expected one of: bistable, tristate-cycle, tristate-select")]
    UnknownVariant(String),
    #[error("guard interval {guard:?} must be longer than debounce interval {debounce:?}")]
    GuardTooShort { guard: Duration, debounce: Duration },
    #[error("settle delay {settle:?} must be shorter than debounce interval {debounce:?}")]
    SettleTooLong { settle: Duration, debounce: Duration },
    #[error("default state {0} is not legal for this variant")]
    IllegalDefault(ValveState),
    #[error("button wired to state {0}, which this variant cannot reach")]
    IllegalButtonTarget(ValveState),
    #[error("cycle order contains state {0}, which this variant cannot reach")]
    IllegalCycleState(ValveState),
    #[error("cycle order is empty")]
    EmptyCycle,
    #[error("cycle button configured without a cycle order")]
    CycleWithoutOrder,
    #[error("variant has no buttons")]
    NoButtons,
    #[error("variant expects {expected} buttons, {actual} wired")]
    ButtonCount { expected: usize, actual: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timing {
    pub debounce: Duration,
    /// Inputs are ignored this long after every output change.
    pub guard: Duration,
    pub settle: Duration,
}

impl Timing {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.guard <= self.debounce {
            return Err(ConfigError::GuardTooShort {
                guard: self.guard,
                debounce: self.debounce,
            });
        }
        if self.settle >= self.debounce {
            return Err(ConfigError::SettleTooLong {
                settle: self.settle,
                debounce: self.debounce,
            });
        }
        Ok(())
    }

    pub fn settle_ms(&self) -> u32 {
        u32::try_from(self.settle.as_millis()).unwrap_or(u32::MAX)
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            guard: DEFAULT_GUARD,
            settle: DEFAULT_SETTLE,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub variant: Variant,
    pub timing: Timing,
}

impl Config {
    pub fn new(variant: Variant, timing: Timing) -> Result<Self, ConfigError> {
        variant.validate()?;
        timing.validate()?;
        Ok(Self { variant, timing })
    }
}
