//! Purpose: Define the public API surface consumed by the stores and CLI.
//! Exports: transport client plus the shared model and error types.
//! Invariants: This module is the only public path to the transport layer.

mod client;

pub use crate::core::error::{Error, ErrorKind, to_exit_code};
pub use crate::core::model::{Author, Post, PostDraft, PostPatch, Profile, UserInfo};
pub use crate::core::session::SessionFile;
pub use client::{ApiClient, ApiResult, BlogApi};
