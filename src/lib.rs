
pub mod buttons;
pub mod coils;
pub mod config;
pub mod controller;
pub mod protocol;
pub mod sim;
pub mod storage;
pub mod valve_state;
pub mod variant;

pub use config::{Config, ConfigError, Timing};
pub use controller::Controller;
pub use valve_state::ValveState;
pub use variant::{ButtonTarget, Variant};
