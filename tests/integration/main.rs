//! Integration tests for the hub utilities
//!
//! Run with: cargo test --test integration
//!
//! Covers the probe registry against injected environments, the
//! normalization helpers as a configuration consumer would use them, and
//! the command-line interface.

mod cli_tests;
mod helper_tests;
mod probe_tests;

/// Common test initialization
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("hub_utils=debug")
        .try_init();
}
