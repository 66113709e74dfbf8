//! Common utilities and types shared across kvlock

pub mod clock;
pub mod config;
pub mod error;
pub mod utils;

pub use clock::{duration_nanos, Clock, ManualClock, SystemClock};
pub use config::{Config, LockConfig, StoreConfig};
pub use error::{Error, Result};
pub use utils::{format_nanos, parse_duration, validate_key};
