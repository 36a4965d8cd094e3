// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User roles reported by the profile endpoint.

use serde::{Deserialize, Serialize};

/// User roles for view gating.
///
/// ## Role Hierarchy
///
/// - `Admin` - Coaching staff; sees the admin panel in addition to everything else
/// - `User` - Regular member with dashboards and logging forms
///
/// The backend enforces access; the client only uses the role to decide which
/// views to offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular member
    #[default]
    User,
    /// Administrative access
    Admin,
}

impl Role {
    /// Check if this role has at least the privileges of the required role.
    pub fn has_privilege(&self, required: Role) -> bool {
        match (self, required) {
            (Role::Admin, _) => true,
            (Role::User, Role::User) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::User => write!(f, "user"),
        }
    }
}
