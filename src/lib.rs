// lib.rs

pub use anyhow::bail;
pub use log::*;

mod config;
pub use config::*;

mod platform;
pub use platform::*;

mod wifi;
pub use wifi::*;

mod measure;
pub use measure::*;

mod mqtt;
pub use mqtt::*;

mod cycle;
pub use cycle::*;

mod stepper;
pub use stepper::*;

mod ultrasonic;
pub use ultrasonic::*;

pub const FW_VERSION: &str = env!("CARGO_PKG_VERSION");

// EOF
