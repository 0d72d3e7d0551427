//! envsense library
//!
//! I2C bus discovery and environmental sensor drivers for Linux hosts.

pub mod app;
pub mod discovery;
pub mod errors;
pub mod filesys;
pub mod hardware;
pub mod logs;
pub mod sensors;
pub mod storage;
pub mod utils;
pub mod workers;
