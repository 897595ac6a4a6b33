#![deny(unsafe_code)]

//! Shared test utilities for the lmpctx workspace.
//!
//! Provides temp-dir project fixtures, configuration builders, and tracing
//! helpers so that individual crate tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! lmpctx-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod project;
pub mod tracing_setup;

pub use config::{TestConfigBuilder, TestSettingsBuilder};
pub use project::TestProject;
pub use tracing_setup::{LogCapture, capture_logs, init_test_tracing};
