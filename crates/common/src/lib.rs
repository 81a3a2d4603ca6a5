//! Shared error helpers used across all msgsync crates.
//!
//! Each crate keeps its own `thiserror` enum; this crate only supplies the
//! [`FromMessage`] hook and the [`impl_context!`] macro that adds
//! `.context()` to `Result` and `Option`.

pub mod error;

pub use error::FromMessage;
