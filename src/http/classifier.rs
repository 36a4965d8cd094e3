// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Central reaction to failed backend requests.
//!
//! ## Strategy
//!
//! Each failure is mapped to a [`FailureClass`]. The first failure of a class
//! sets a latch for that class and triggers its side effects (a notification,
//! and for 401 also ending the session). Further failures of the same class
//! are suppressed until the latch expires after the cool-down, is reset
//! explicitly, or (for 401) a new session is established.
//!
//! The login and logout calls are never classified: a rejected login is the
//! caller's business, and a failing logout must not trigger another logout.
//!
//! A 401 for a credential the session no longer holds is ignored. It belongs
//! to a session that already ended or was replaced.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use super::NotificationSink;
use crate::config::{LOGIN_PATH, LOGOUT_PATH};
use crate::error::{FailureClass, RequestError};

/// The session operations the classifier is allowed to invoke.
pub trait SessionControl: Send + Sync {
    /// Whether `credential` is the one the session currently holds.
    fn is_current(&self, credential: &str) -> bool;

    /// End the session locally before returning. The backend logout may
    /// finish later.
    fn expire(&self);
}

/// Classifies request failures and fires deduplicated side effects.
pub struct FailureClassifier {
    sink: Arc<dyn NotificationSink>,
    session: OnceLock<Weak<dyn SessionControl>>,
    exempt_paths: Vec<&'static str>,
    cooldown: Duration,
    latches: Mutex<HashMap<FailureClass, Instant>>,
}

impl std::fmt::Debug for FailureClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureClassifier")
            .field("exempt_paths", &self.exempt_paths)
            .field("cooldown", &self.cooldown)
            .finish_non_exhaustive()
    }
}

impl FailureClassifier {
    pub fn new(sink: Arc<dyn NotificationSink>, cooldown: Duration) -> Self {
        Self {
            sink,
            session: OnceLock::new(),
            exempt_paths: vec![LOGIN_PATH, LOGOUT_PATH],
            cooldown,
            latches: Mutex::new(HashMap::new()),
        }
    }

    /// Attach the session that 401 failures should end.
    ///
    /// Held weakly: the session owns the transport that owns this classifier.
    /// Only the first binding takes effect.
    pub fn bind_session(&self, session: Weak<dyn SessionControl>) {
        if self.session.set(session).is_err() {
            warn!("Failure classifier already bound to a session; ignoring rebind");
        }
    }

    /// Whether failures on this path are left entirely to the caller.
    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.iter().any(|exempt| *exempt == path)
    }

    /// React to a failed request sent with `credential`.
    ///
    /// Returns the class whose side effects fired, or `None` when the failure
    /// was exempt, not a global class, stale, or suppressed by an active latch.
    /// Never waits on the network.
    pub fn handle(
        &self,
        path: &str,
        error: &RequestError,
        credential: Option<&str>,
    ) -> Option<FailureClass> {
        if self.is_exempt(path) {
            debug!(path = %path, error = %error, "Failure on exempt endpoint; not classified");
            return None;
        }

        let class = error.failure_class()?;
        let session = self.session.get().and_then(Weak::upgrade);

        if class.ends_session() {
            if let (Some(session), Some(used)) = (&session, credential) {
                if !session.is_current(used) {
                    debug!(path = %path, "Unauthorized for a replaced credential; ignoring");
                    return None;
                }
            }
        }

        if !self.try_latch(class) {
            debug!(path = %path, class = %class, "Duplicate failure suppressed");
            return None;
        }

        warn!(path = %path, class = %class, error = %error, "Request failed");

        if class.ends_session() {
            match session {
                Some(session) => session.expire(),
                None => debug!("No live session bound; skipping session end"),
            }
        }

        self.sink.error(class.canonical_message());
        Some(class)
    }

    /// Clear every latch.
    pub fn reset(&self) {
        self.lock_latches().clear();
    }

    /// Clear the latch for one class.
    pub fn reset_class(&self, class: FailureClass) {
        self.lock_latches().remove(&class);
    }

    /// Whether a latch is currently suppressing this class.
    pub fn is_latched(&self, class: FailureClass) -> bool {
        self.lock_latches()
            .get(&class)
            .is_some_and(|set_at| set_at.elapsed() < self.cooldown)
    }

    /// Set the latch for `class` unless an unexpired one exists.
    fn try_latch(&self, class: FailureClass) -> bool {
        let mut latches = self.lock_latches();
        let now = Instant::now();
        match latches.get(&class) {
            Some(set_at) if now.duration_since(*set_at) < self.cooldown => false,
            _ => {
                latches.insert(class, now);
                true
            }
        }
    }

    fn lock_latches(&self) -> std::sync::MutexGuard<'_, HashMap<FailureClass, Instant>> {
        self.latches.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SERVER_ERROR_MESSAGE, SESSION_EXPIRED_MESSAGE};
    use crate::http::ToastQueue;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const LIVE: Option<&str> = Some("live.cred.sig");

    #[derive(Default)]
    struct CountingSession {
        ends: AtomicUsize,
    }

    impl SessionControl for CountingSession {
        fn is_current(&self, credential: &str) -> bool {
            credential == "live.cred.sig"
        }

        fn expire(&self) {
            self.ends.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn status(path: &str, code: u16) -> RequestError {
        RequestError::Status {
            method: "GET".to_string(),
            path: path.to_string(),
            status: StatusCode::from_u16(code).unwrap(),
            body: String::new(),
        }
    }

    fn setup(cooldown: Duration) -> (Arc<FailureClassifier>, Arc<ToastQueue>, Arc<CountingSession>) {
        let toasts = Arc::new(ToastQueue::new());
        let classifier = Arc::new(FailureClassifier::new(toasts.clone(), cooldown));
        let session = Arc::new(CountingSession::default());
        let weak: Weak<CountingSession> = Arc::downgrade(&session);
        classifier.bind_session(weak);
        (classifier, toasts, session)
    }

    #[tokio::test]
    async fn unauthorized_ends_session_and_notifies() {
        let (classifier, toasts, session) = setup(Duration::from_secs(3));

        let fired = classifier.handle("/workouts", &status("/workouts", 401), LIVE);

        assert_eq!(fired, Some(FailureClass::AuthenticationInvalid));
        assert_eq!(session.ends.load(Ordering::SeqCst), 1);
        assert_eq!(toasts.drain(), vec![SESSION_EXPIRED_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn unauthorized_for_replaced_credential_is_ignored() {
        let (classifier, toasts, session) = setup(Duration::from_secs(3));

        let stale = Some("old.cred.sig");
        let fired = classifier.handle("/workouts", &status("/workouts", 401), stale);

        assert_eq!(fired, None);
        assert_eq!(session.ends.load(Ordering::SeqCst), 0);
        assert!(toasts.is_empty());
        assert!(!classifier.is_latched(FailureClass::AuthenticationInvalid));
    }

    #[tokio::test]
    async fn unauthorized_without_credential_still_notifies() {
        let (classifier, toasts, session) = setup(Duration::from_secs(3));

        classifier.handle("/workouts", &status("/workouts", 401), None);

        assert_eq!(session.ends.load(Ordering::SeqCst), 1);
        assert_eq!(toasts.len(), 1);
    }

    #[tokio::test]
    async fn forbidden_notifies_without_ending_session() {
        let (classifier, toasts, session) = setup(Duration::from_secs(3));

        classifier.handle("/admin/users", &status("/admin/users", 403), LIVE);

        assert_eq!(session.ends.load(Ordering::SeqCst), 0);
        assert_eq!(toasts.len(), 1);
    }

    #[tokio::test]
    async fn unhandled_client_errors_have_no_global_action() {
        let (classifier, toasts, session) = setup(Duration::from_secs(3));

        for code in [400, 404, 409, 422] {
            let fired = classifier.handle("/meals", &status("/meals", code), LIVE);
            assert_eq!(fired, None);
        }

        assert!(toasts.is_empty());
        assert_eq!(session.ends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn login_and_logout_are_exempt() {
        let (classifier, toasts, session) = setup(Duration::from_secs(3));

        assert_eq!(classifier.handle(LOGIN_PATH, &status(LOGIN_PATH, 401), None), None);
        assert_eq!(classifier.handle(LOGOUT_PATH, &status(LOGOUT_PATH, 500), LIVE), None);

        assert!(toasts.is_empty());
        assert_eq!(session.ends.load(Ordering::SeqCst), 0);
        assert!(!classifier.is_latched(FailureClass::AuthenticationInvalid));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_unauthorized_burst_fires_once() {
        let (classifier, toasts, session) = setup(Duration::from_secs(3));

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..5 {
            let classifier = classifier.clone();
            tasks.spawn(async move {
                let path = format!("/dashboard/{i}");
                classifier.handle(&path, &status(&path, 401), LIVE)
            });
        }

        let mut fired = 0;
        while let Some(result) = tasks.join_next().await {
            if result.unwrap().is_some() {
                fired += 1;
            }
        }

        assert_eq!(fired, 1);
        assert_eq!(session.ends.load(Ordering::SeqCst), 1);
        assert_eq!(toasts.drain(), vec![SESSION_EXPIRED_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn latches_are_per_class() {
        let (classifier, toasts, _session) = setup(Duration::from_secs(3));

        classifier.handle("/a", &status("/a", 500), LIVE);
        classifier.handle("/b", &status("/b", 502), LIVE);
        classifier.handle("/c", &status("/c", 429), LIVE);

        assert_eq!(toasts.len(), 2);
        assert!(classifier.is_latched(FailureClass::ServerError));
        assert!(classifier.is_latched(FailureClass::RateLimited));
        assert!(!classifier.is_latched(FailureClass::AuthorizationDenied));
    }

    #[tokio::test(start_paused = true)]
    async fn latch_expires_after_cooldown() {
        let (classifier, toasts, _session) = setup(Duration::from_secs(3));

        classifier.handle("/a", &status("/a", 500), LIVE);
        tokio::time::advance(Duration::from_millis(2999)).await;
        classifier.handle("/a", &status("/a", 500), LIVE);
        assert_eq!(toasts.len(), 1);

        tokio::time::advance(Duration::from_millis(2)).await;
        classifier.handle("/a", &status("/a", 500), LIVE);
        assert_eq!(
            toasts.drain(),
            vec![SERVER_ERROR_MESSAGE.to_string(), SERVER_ERROR_MESSAGE.to_string()]
        );
    }

    #[tokio::test]
    async fn reset_rearms_latches() {
        let (classifier, toasts, session) = setup(Duration::from_secs(60));

        classifier.handle("/a", &status("/a", 401), LIVE);
        classifier.reset_class(FailureClass::AuthenticationInvalid);
        classifier.handle("/a", &status("/a", 401), LIVE);
        assert_eq!(session.ends.load(Ordering::SeqCst), 2);

        classifier.handle("/a", &status("/a", 503), LIVE);
        classifier.reset();
        classifier.handle("/a", &status("/a", 503), LIVE);
        assert_eq!(toasts.len(), 4);
    }

    #[tokio::test]
    async fn dropped_session_still_notifies() {
        let toasts = Arc::new(ToastQueue::new());
        let classifier = FailureClassifier::new(toasts.clone(), Duration::from_secs(3));
        {
            let session = Arc::new(CountingSession::default());
            let weak: Weak<CountingSession> = Arc::downgrade(&session);
            classifier.bind_session(weak);
        }

        classifier.handle("/a", &status("/a", 401), LIVE);
        assert_eq!(toasts.len(), 1);
    }
}
