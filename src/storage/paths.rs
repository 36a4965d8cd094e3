// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path utilities for the client data directory.

use std::path::{Path, PathBuf};

use crate::config::DEFAULT_DATA_DIR;

/// Name of the persisted credential slot.
pub const CREDENTIAL_SLOT: &str = "credential";

/// Storage path utilities for the client data directory.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all client data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for session state.
    pub fn session_dir(&self) -> PathBuf {
        self.root.join("session")
    }

    /// Path to the credential slot.
    pub fn credential(&self) -> PathBuf {
        self.session_dir().join(CREDENTIAL_SLOT)
    }

    /// Scratch file used for atomic replacement of the credential slot.
    pub fn credential_tmp(&self) -> PathBuf {
        self.session_dir().join(format!("{CREDENTIAL_SLOT}.tmp"))
    }
}
