// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential slot implementations.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use super::StoragePaths;

/// Error type for credential storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error during file operations
    Io(io::Error),
    /// Slot contents are not valid UTF-8
    Corrupted(String),
    /// Attempted to store an empty credential
    EmptyCredential,
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            StorageError::Corrupted(msg) => write!(f, "Credential slot corrupted: {msg}"),
            StorageError::EmptyCredential => write!(f, "Refusing to store an empty credential"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        StorageError::Io(e)
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// A single persisted slot holding the raw credential string.
pub trait CredentialStore: Send + Sync + std::fmt::Debug {
    /// Read the credential, `None` when the slot is absent or empty.
    fn load(&self) -> StorageResult<Option<String>>;

    /// Replace the slot contents.
    fn save(&self, credential: &str) -> StorageResult<()>;

    /// Remove the slot. Removing an absent slot is not an error.
    fn clear(&self) -> StorageResult<()>;
}

/// File-backed credential slot under the client data directory.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    paths: StoragePaths,
}

impl FileCredentialStore {
    pub fn new(paths: StoragePaths) -> Self {
        Self { paths }
    }

    /// Create the store and make sure its directory is writable up front.
    pub fn open(paths: StoragePaths) -> StorageResult<Self> {
        fs::create_dir_all(paths.session_dir())?;
        Ok(Self::new(paths))
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> StorageResult<Option<String>> {
        let bytes = match fs::read(self.paths.credential()) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let raw = String::from_utf8(bytes).map_err(|e| StorageError::Corrupted(e.to_string()))?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(trimmed.to_string()))
        }
    }

    fn save(&self, credential: &str) -> StorageResult<()> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(StorageError::EmptyCredential);
        }

        fs::create_dir_all(self.paths.session_dir())?;

        // Write to a scratch file then rename, so a crash never leaves a
        // half-written credential in the slot.
        let tmp = self.paths.credential_tmp();
        {
            let mut options = OpenOptions::new();
            options.write(true).create(true).truncate(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }
            let mut file = options.open(&tmp)?;
            file.write_all(credential.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, self.paths.credential())?;
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        match fs::remove_file(self.paths.credential()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory slot for tests and ephemeral clients.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a credential, as if left over from a
    /// previous run.
    pub fn with_credential(credential: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(credential.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> StorageResult<Option<String>> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(slot.clone())
    }

    fn save(&self, credential: &str) -> StorageResult<()> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(StorageError::EmptyCredential);
        }
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(credential.to_string());
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
