//! Purpose: Client-side state layer: session and post collection stores.
//! Exports: `SessionStore`, `PostStore`, `StoreError`.
//! Role: The stores own all caching and consistency rules between views; the
//! transport below them and the rendering above them stay dumb.
//! Invariants: Exactly one network-derived error is visible per store at a
//! time; starting any operation clears the prior one.

pub mod posts;
pub mod session;

pub use posts::PostStore;
pub use session::SessionStore;

use crate::core::error::{Error, ErrorKind};
use std::fmt;

/// Snapshot of a failed operation, kept in store state for passive display.
/// The kind stays distinguishable so views can render not-found separately
/// from a generic failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreError {
    pub kind: ErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn from_error(err: &Error, fallback: &str) -> Self {
        Self {
            kind: err.kind(),
            message: err.display_message(fallback),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
