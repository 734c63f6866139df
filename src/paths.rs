//! Purpose: Shared default-directory resolution for client and server state.
//! Exports: `default_config_dir`, `default_data_dir`.
//! Invariants: Client config stays under `~/.quillpress`; server data under
//! `~/.quillpress/data`.

use std::path::PathBuf;

pub fn default_config_dir() -> PathBuf {
    let home = std::env::var_os("HOME").unwrap_or_default();
    PathBuf::from(home).join(".quillpress")
}

pub fn default_data_dir() -> PathBuf {
    default_config_dir().join("data")
}
