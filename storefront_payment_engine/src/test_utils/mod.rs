//! Helpers for tests in this crate and in crates that depend on it.
pub mod prepare_env;
