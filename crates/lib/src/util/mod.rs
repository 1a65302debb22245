//! Shared utilities.
//!
//! Currently only test helpers shared by the unit tests of several modules.

#[cfg(test)]
pub mod testutil;
