// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Coach Session Client
//!
//! Client-side session lifecycle for the coaching backend: one persisted
//! credential, an observable `checking → authenticated | anonymous` phase,
//! local expiry detection from the credential's `exp` claim, and a
//! transport that turns backend failures into user-facing notifications
//! and forced session termination.
//!
//! ## Modules
//!
//! - [`app`]: composition root and expiry watcher
//! - [`auth`]: credential claim decoding and roles
//! - [`config`]: environment-driven configuration
//! - [`error`]: request errors and failure classes
//! - [`http`]: backend transport, failure classifier, notification sinks
//! - [`session`]: session state machine and expiration monitor
//! - [`storage`]: the persisted credential slot

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod storage;

pub use app::CoachClient;
pub use config::{ClientConfig, ConfigError, LogFormat};
pub use error::{ClientError, FailureClass, RequestError};
pub use http::{ApiClient, NotificationSink, ToastQueue, TracingNotifier};
pub use session::{ExpirationMonitor, Phase, SessionManager, SessionState, User};
pub use storage::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
