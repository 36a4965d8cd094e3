// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Unverified claims decoding for bearer credentials.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Deserializer};

use super::ClaimsError;

/// Claims read from the credential payload.
///
/// Every field is optional. A credential without `exp` never expires locally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Claims {
    /// Subject (user identifier)
    #[serde(default)]
    pub sub: Option<String>,

    /// Expiration timestamp (epoch seconds)
    #[serde(default, deserialize_with = "epoch_seconds")]
    pub exp: Option<i64>,

    /// Issued at timestamp (epoch seconds)
    #[serde(default, deserialize_with = "epoch_seconds")]
    pub iat: Option<i64>,
}

impl Claims {
    /// Expiry in epoch milliseconds, if the credential carries one.
    pub fn expires_at_ms(&self) -> Option<i64> {
        self.exp.map(|exp| exp.saturating_mul(1000))
    }
}

/// Decode the claims segment of a credential without verifying it.
///
/// Splits on `.`, base64url-decodes the second segment and parses it as JSON.
/// The header and signature segments are not inspected.
pub fn decode(credential: &str) -> Result<Claims, ClaimsError> {
    let segments: Vec<&str> = credential.trim().split('.').collect();
    if segments.len() != 3 {
        return Err(ClaimsError::SegmentCount(segments.len()));
    }

    // Some issuers pad base64url; the alphabet is otherwise identical.
    let payload = segments[1].trim_end_matches('=');
    let bytes = Base64UrlUnpadded::decode_vec(payload).map_err(|_| ClaimsError::Base64)?;

    serde_json::from_slice(&bytes).map_err(|e| ClaimsError::Json(e.to_string()))
}

/// Accept integer or fractional epoch values; fractions are truncated.
fn epoch_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Number>::deserialize(deserializer)?;
    Ok(value.and_then(|n| n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))))
}
