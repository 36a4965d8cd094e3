// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Credential Storage
//!
//! Persists the bearer credential across restarts in a single named slot.
//!
//! ## Layout
//!
//! ```text
//! <data_dir>/
//! └── session/
//!     └── credential      raw credential string, no trailing newline
//! ```
//!
//! An absent or empty slot means "no session". Only the session manager
//! writes the slot; the HTTP client reads it to attach the bearer header.

pub mod credential;
pub mod paths;

pub use credential::{
    CredentialStore, FileCredentialStore, MemoryCredentialStore, StorageError, StorageResult,
};
pub use paths::StoragePaths;
