//! Purpose: Core modules shared by the client stores and the server.
//! Exports: `auth`, `error`, `model`, `repo`, `session`.

pub mod auth;
pub mod error;
pub mod model;
pub mod repo;
pub mod session;
