//! Hardware access: transports and bus locking

pub mod i2c;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod linux;
pub mod lock;
pub mod mock;

pub use i2c::{addresses, check_address, open_transport, BoxedTransport, I2cTransport};
pub use lock::BusLocks;
pub use mock::MockTransport;
