//! Integration test support: shared setup and envelope fixtures.

pub mod fixtures;
pub mod setup;
