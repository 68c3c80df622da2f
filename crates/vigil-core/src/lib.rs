//! Vigil Core - cancellation and retry primitives for the Vigil backend.
//!
//! This crate provides:
//! - Combinable abort signals (`AbortController`, `AbortSignal`)
//! - Timeout-derived signals and sleep that fails on abort
//! - Retry with exponential backoff, optionally bounded by a signal
//!
//! The event bus never cancels listeners itself. Listener bodies that talk
//! to slow collaborators compose these primitives around their own work.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod abort;
pub mod retry;

pub use abort::{AbortController, AbortReason, AbortSignal, Aborted, sleep};
pub use retry::{RetryConfig, RetryOutcome, retry, retry_with_signal};
