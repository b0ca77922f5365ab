//! Shared error-context idiom and wire-level data types used across all
//! `otui-*` crates.

pub mod error;
pub mod types;

pub use error::{Error, FromMessage, Result};
