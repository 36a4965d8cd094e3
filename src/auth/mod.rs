// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Credential Claims
//!
//! The backend issues a three-part bearer credential (`header.claims.signature`).
//! The client never verifies the signature; it only reads the unsigned claims
//! segment to predict when the credential will stop working.
//!
//! ## Trust
//!
//! - Claims are advisory: a forged or skewed `exp` only changes when the
//!   client ends its own session early
//! - Authorization is always decided server-side
//! - Decoding failures are silent and leave the session untouched

pub mod claims;
pub mod error;
pub mod roles;

pub use claims::{decode, Claims};
pub use error::ClaimsError;
pub use roles::Role;
