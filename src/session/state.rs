// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Observable session state.

use serde::{Deserialize, Serialize};

use crate::auth::Role;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// A stored credential is being confirmed with the backend
    Checking,
    /// Credential confirmed and profile loaded
    Authenticated,
    /// No usable credential
    Anonymous,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Checking => write!(f, "checking"),
            Phase::Authenticated => write!(f, "authenticated"),
            Phase::Anonymous => write!(f, "anonymous"),
        }
    }
}

/// Identity returned by the profile endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub role: Role,
}

impl User {
    /// Whether the admin panel should be offered.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn has_role(&self, required: Role) -> bool {
        self.role.has_privilege(required)
    }
}

/// Snapshot published to observers on every transition.
///
/// `user` is present exactly when `phase` is [`Phase::Authenticated`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub phase: Phase,
    pub user: Option<User>,
}

impl SessionState {
    pub fn checking() -> Self {
        Self {
            phase: Phase::Checking,
            user: None,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            phase: Phase::Anonymous,
            user: None,
        }
    }

    pub fn authenticated(user: User) -> Self {
        Self {
            phase: Phase::Authenticated,
            user: Some(user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase == Phase::Authenticated
    }
}
