//! Testing utilities and mock implementations
//!
//! This module provides mock tools and clocks for testing the relay
//! pipeline without network access or wall-clock waits.

pub mod mocks;

pub use mocks::*;
