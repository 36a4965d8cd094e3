// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Lifecycle
//!
//! ## Phases
//!
//! ```text
//!            bootstrap (credential stored)
//!   checking ──────────────────────────────┐
//!      │  no credential / profile fails    │ profile loads
//!      ▼                                   ▼
//!   anonymous ◄──── end_session ──── authenticated
//!      │                                   ▲
//!      └──────── login + profile ──────────┘
//! ```
//!
//! Leaving for `anonymous` always stops the expiration monitor and clears the
//! credential slot under the same lock, so no observer sees one without the
//! other.
//!
//! ## Stale completions
//!
//! Requests are never cancelled. Every credential change and every session
//! end bumps a generation counter; a profile fetch that completes under an
//! older generation is ignored instead of resurrecting the session.

pub mod expiry;
pub mod manager;
pub mod state;

pub use expiry::ExpirationMonitor;
pub use manager::SessionManager;
pub use state::{Phase, SessionState, User};
