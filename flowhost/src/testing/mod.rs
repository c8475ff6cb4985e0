//! Testing utilities: mock stages and shared fixtures.
//!
//! Available outside `cfg(test)` so downstream hosts can reuse the mocks
//! in their own test suites.

pub mod fixtures;
pub mod mocks;
