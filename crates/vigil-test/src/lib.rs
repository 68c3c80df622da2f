//! Vigil Test - Shared test utilities for the Vigil backend.
//!
//! This crate provides recording listeners, scripted middleware and payload
//! fixtures that can be used across Vigil crates as a dev-dependency.
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! vigil-test.workspace = true
//! ```
//!
//! Then use in integration tests:
//!
//! ```rust,ignore
//! use vigil_events::EventBus;
//! use vigil_test::{Recorder, test_site_added};
//!
//! #[tokio::test]
//! async fn test_site_added_is_delivered() {
//!     let bus = EventBus::new("test").unwrap();
//!     let recorder = Recorder::new();
//!     bus.on(recorder.listener()).unwrap();
//!
//!     bus.emit(test_site_added("site-1")).await.unwrap();
//!
//!     assert_eq!(recorder.len(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
