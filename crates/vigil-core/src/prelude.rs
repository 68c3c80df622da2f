//! Prelude module - commonly used types for convenient import.
//!
//! Use `use vigil_core::prelude::*;` to import all essential types.

// Cancellation
pub use crate::{AbortController, AbortReason, AbortSignal, Aborted, sleep};

// Retry
pub use crate::{RetryConfig, RetryOutcome, retry, retry_with_signal};
