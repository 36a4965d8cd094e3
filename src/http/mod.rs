// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Backend Transport
//!
//! Every backend call made by the client goes through [`ApiClient`], which:
//!
//! 1. Attaches `Authorization: Bearer <credential>` from the credential slot
//!    (never on the login call)
//! 2. Tags the request with an `x-request-id`
//! 3. Hands any failure to the [`FailureClassifier`] before returning it to
//!    the caller
//!
//! The classifier reacts once per burst to global failure classes (expired
//! session, access denied, rate limiting, server errors, unreachable backend)
//! so feature code only deals with its own validation errors.

pub mod classifier;
pub mod client;
pub mod notify;

pub use classifier::{FailureClassifier, SessionControl};
pub use client::ApiClient;
pub use notify::{NotificationSink, ToastQueue, TracingNotifier};
