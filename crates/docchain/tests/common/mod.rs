//! Shared utilities for docchain integration tests.
//!
//! - `TestHarness`: temp directories, an in-memory ledger and pool wiring
//! - fakes for the text, inference and notification seams

pub mod fakes;
pub mod harness;

pub use fakes::*;
pub use harness::TestHarness;
