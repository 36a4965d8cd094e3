// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Claim decoding errors.

/// Reasons a credential could not be decoded into claims.
///
/// None of these are surfaced to the user: a credential that cannot be
/// decoded is simply not monitored for local expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    /// Credential does not have exactly three `.`-separated segments
    SegmentCount(usize),
    /// Claims segment is not valid base64url
    Base64,
    /// Claims segment is not a JSON object with the expected field types
    Json(String),
}

impl ClaimsError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            ClaimsError::SegmentCount(_) => "malformed_segments",
            ClaimsError::Base64 => "malformed_base64",
            ClaimsError::Json(_) => "malformed_json",
        }
    }
}

impl std::fmt::Display for ClaimsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClaimsError::SegmentCount(n) => {
                write!(f, "Credential has {n} segment(s), expected 3")
            }
            ClaimsError::Base64 => write!(f, "Claims segment is not valid base64url"),
            ClaimsError::Json(msg) => write!(f, "Claims segment is not valid JSON: {msg}"),
        }
    }
}

impl std::error::Error for ClaimsError {}
