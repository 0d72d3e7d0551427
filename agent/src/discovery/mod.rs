//! I2C bus and device discovery

pub mod bus;
pub mod parser;
pub mod platform;
pub mod tool;

pub use bus::{I2cBus, I2cDevice};
pub use platform::{BusMap, Platform};
pub use tool::{BusTool, I2cDetect, ReplayTool};
