//! Testing utilities for engine and order-flow tests
//!
//! Used by unit tests here and by integration tests in this and dependent crates.

pub mod helpers;

pub use helpers::*;
