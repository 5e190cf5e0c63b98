//! Library half of the `zerotouch` binary, so command implementations can be
//! exercised from integration tests.

pub mod commands;
