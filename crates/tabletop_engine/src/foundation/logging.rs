//! Logging utilities
//!
//! The engine logs through the `log` facade. Binaries call [`init`] once;
//! tests call [`init_for_tests`] as often as they like.

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system
pub fn init() {
    env_logger::init();
}

/// Initialize logging for unit tests.
///
/// Safe to call from every test: only the first call installs the logger.
pub fn init_for_tests() {
    let _ = env_logger::builder().is_test(true).try_init();
}
