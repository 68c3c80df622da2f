//! Prelude module - commonly used test helpers.
//!
//! Use `use vigil_test::prelude::*;` in integration tests.

// Recorders and scripted middleware
pub use crate::{CallLog, CountingMiddleware, FailingMiddleware, HaltingMiddleware, Recorder};

// Fixtures
pub use crate::{
    test_cache_invalidated, test_config_changed, test_metadata, test_site_added,
    test_site_removed, test_status_changed,
};

// Harness
pub use crate::{setup_test_logging, setup_test_logging_default, test_file_with_extension};
