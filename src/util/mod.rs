//! Utility modules for mdeonboard

pub mod logging;

pub use logging::{init_logging, LoggingConfig};
