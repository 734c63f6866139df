//! Purpose: Shared library crate behind the `quillpress` binary and tests.
//! Exports: `api` (transport + model), `store` (client state layer), `core`
//! (errors, auth, repository), `paths`.
//! Invariants: The stores are explicit service objects; there is no
//! module-level mutable state anywhere in the crate.

pub mod api;
pub mod core;
pub mod paths;
pub mod store;
