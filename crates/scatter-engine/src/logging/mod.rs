//! Logging utilities.
//!
//! The engine only emits through the `log` facade. Hosts call
//! [`init_logging`] early; library code never installs a logger itself.

mod init;

pub use init::{init_logging, LoggingConfig};
