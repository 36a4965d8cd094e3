// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session state machine.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::{ExpirationMonitor, Phase, SessionState, User};
use crate::config::{ClientConfig, LOGIN_PATH, LOGOUT_PATH, PROFILE_PATH};
use crate::error::{ClientError, FailureClass};
use crate::http::{ApiClient, FailureClassifier, NotificationSink, SessionControl};
use crate::storage::CredentialStore;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

/// Mutable session data. Only [`SessionManager`] touches it.
#[derive(Debug)]
struct SessionCore {
    phase: Phase,
    user: Option<User>,
    /// Mirror of the credential slot.
    credential: Option<String>,
    /// Bumped whenever the credential changes or the session ends, so a
    /// completion started against an older credential can tell it is stale.
    generation: u64,
    /// The slot still holds a credential that a teardown failed to remove.
    pending_clear: bool,
}

impl SessionCore {
    fn snapshot(&self) -> SessionState {
        SessionState {
            phase: self.phase,
            user: self.user.clone(),
        }
    }
}

/// Owns the session lifecycle: credential slot, phase, profile and the
/// expiration monitor.
///
/// All mutation goes through these methods. Observers read snapshots via
/// [`SessionManager::subscribe`].
#[derive(Debug)]
pub struct SessionManager {
    this: Weak<SessionManager>,
    api: ApiClient,
    store: Arc<dyn CredentialStore>,
    monitor: ExpirationMonitor,
    core: Mutex<SessionCore>,
    state: watch::Sender<SessionState>,
}

impl SessionManager {
    /// Build the session manager together with its transport.
    ///
    /// The transport's failure classifier is bound back to this manager so a
    /// 401 on any request can end the session.
    pub fn new(
        config: &ClientConfig,
        store: Arc<dyn CredentialStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Arc<Self>, ClientError> {
        let classifier = FailureClassifier::new(sink, config.failure_cooldown());
        let api = ApiClient::new(config.clone(), Arc::clone(&store), classifier)?;
        let (state, _) = watch::channel(SessionState::checking());

        Ok(Arc::new_cyclic(|weak: &Weak<SessionManager>| {
            let control: Weak<dyn SessionControl> = weak.clone();
            api.classifier().bind_session(control);

            SessionManager {
                this: weak.clone(),
                api,
                store,
                monitor: ExpirationMonitor::new(config.expiry_buffer()),
                core: Mutex::new(SessionCore {
                    phase: Phase::Checking,
                    user: None,
                    credential: None,
                    generation: 0,
                    pending_clear: false,
                }),
                state,
            }
        }))
    }

    /// Transport for feature requests. Shares the credential and classifier.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub(crate) fn monitor(&self) -> &ExpirationMonitor {
        &self.monitor
    }

    /// Whether the current credential is past (or within the buffer of) its
    /// `exp` claim.
    pub fn is_expired(&self) -> bool {
        self.monitor.is_expired()
    }

    /// Whether an expiry alarm is pending for the current credential.
    pub fn is_expiry_armed(&self) -> bool {
        self.monitor.is_armed()
    }

    /// Observe the local expiry flag.
    pub fn subscribe_expiry(&self) -> watch::Receiver<bool> {
        self.monitor.subscribe()
    }

    pub fn phase(&self) -> Phase {
        self.lock_core().phase
    }

    pub fn user(&self) -> Option<User> {
        self.lock_core().user.clone()
    }

    pub fn state(&self) -> SessionState {
        self.lock_core().snapshot()
    }

    /// Observe every phase/user transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Resolve the initial phase from the credential slot.
    ///
    /// Without a stored credential the session goes straight to anonymous.
    /// Otherwise it stays in checking until the profile fetch decides, unless
    /// the credential's own `exp` has already passed.
    pub async fn bootstrap(&self) {
        if self.retry_pending_clear() {
            return;
        }

        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to read credential slot; starting anonymous");
                None
            }
        };

        let Some(credential) = stored else {
            let mut core = self.lock_core();
            core.phase = Phase::Anonymous;
            core.user = None;
            self.publish(&core);
            info!("No stored credential; session is anonymous");
            return;
        };

        {
            let mut core = self.lock_core();
            core.generation = core.generation.wrapping_add(1);
            core.credential = Some(credential.clone());
            core.phase = Phase::Checking;
            core.user = None;
            self.monitor.start_monitoring(&credential);
            self.publish(&core);
        }

        if self.monitor.is_expired() {
            info!("Stored credential already expired; ending session");
            self.end_session().await;
            return;
        }

        self.load_profile().await;
    }

    /// Exchange email and password for a credential and load the profile.
    ///
    /// Returns `true` when the session ended up authenticated. Any failure
    /// (rejected credentials, unreachable backend, unusable token, failing
    /// profile load) returns `false` and leaves the session anonymous.
    pub async fn login(&self, email: &str, password: &str) -> bool {
        let request = LoginRequest { email, password };
        let token = match self
            .api
            .post_json::<_, LoginResponse>(LOGIN_PATH, &request)
            .await
        {
            Ok(response) if !response.token.trim().is_empty() => response.token.trim().to_string(),
            Ok(_) => {
                warn!("Login response did not include a token");
                return false;
            }
            Err(e) => {
                info!(error = %e, status = ?e.status(), "Login rejected");
                return false;
            }
        };

        if let Err(e) = self.store.save(&token) {
            warn!(error = %e, "Failed to persist credential after login");
            return false;
        }

        {
            let mut core = self.lock_core();
            core.generation = core.generation.wrapping_add(1);
            core.credential = Some(token.clone());
            core.pending_clear = false;
            self.monitor.start_monitoring(&token);
        }
        info!("Login accepted; loading profile");

        self.load_profile().await
    }

    /// Fetch the current user with the stored credential.
    ///
    /// Success authenticates the session and re-arms the monitor, unless the
    /// credential turned out to be expired, which ends the session instead.
    /// Any failure means the credential is unusable: the slot is cleared and
    /// the session becomes anonymous. A completion that arrives after the
    /// credential changed or the session ended is discarded.
    pub async fn load_profile(&self) -> bool {
        let (generation, credential) = {
            let mut core = self.lock_core();
            if core.credential.is_none() && !core.pending_clear {
                core.credential = self.store.load().ok().flatten();
            }
            (core.generation, core.credential.clone())
        };

        let Some(credential) = credential else {
            debug!("No credential to load a profile with");
            self.teardown(None);
            return false;
        };

        match self.api.get_json::<User>(PROFILE_PATH).await {
            Ok(user) => {
                let authenticated = {
                    let mut core = self.lock_core();
                    if core.generation != generation {
                        debug!("Discarding profile for a credential that is no longer current");
                        return false;
                    }
                    self.monitor.start_monitoring(&credential);
                    if self.monitor.is_expired() {
                        false
                    } else {
                        info!(email = %user.email, role = %user.role, "Session authenticated");
                        core.phase = Phase::Authenticated;
                        core.user = Some(user);
                        self.publish(&core);
                        true
                    }
                };

                if !authenticated {
                    info!("Credential expired during profile load; ending session");
                    self.end_session().await;
                    return false;
                }

                self.api
                    .classifier()
                    .reset_class(FailureClass::AuthenticationInvalid);
                true
            }
            Err(e) => {
                warn!(error = %e, "Profile load failed; discarding credential");
                self.teardown(Some(generation));
                false
            }
        }
    }

    /// End the session: stop the monitor, clear the slot, go anonymous, then
    /// tell the backend (best-effort).
    ///
    /// Concurrent and repeated calls are safe; only the first one transitions
    /// and calls the logout endpoint.
    pub async fn end_session(&self) {
        if let Some(credential) = self.teardown(None) {
            self.remote_logout(&credential).await;
        }
    }

    /// End the session locally and leave the backend logout to a background
    /// task. Used where the caller must not wait on the network.
    pub fn expire(&self) {
        let Some(credential) = self.teardown(None) else {
            return;
        };

        match self.this.upgrade() {
            Some(this) => {
                tokio::spawn(async move { this.remote_logout(&credential).await });
            }
            None => debug!("Session manager dropping; skipping backend logout"),
        }
    }

    /// User-initiated logout. Same as [`SessionManager::end_session`].
    pub async fn logout(&self) {
        self.end_session().await;
    }

    async fn remote_logout(&self, credential: &str) {
        match self.api.post_with_credential(LOGOUT_PATH, credential).await {
            Ok(()) => debug!("Backend logout acknowledged"),
            Err(e) => debug!(error = %e, "Backend logout failed; local session already ended"),
        }
    }

    /// Retry removing a credential a failed teardown left in the slot.
    ///
    /// Returns `true` when one was pending; the session then starts anonymous
    /// whether or not the retry succeeds.
    fn retry_pending_clear(&self) -> bool {
        let mut core = self.lock_core();
        if !core.pending_clear {
            return false;
        }

        match self.store.clear() {
            Ok(()) => {
                info!("Removed credential left behind by an earlier logout");
                core.pending_clear = false;
            }
            Err(e) => error!(error = %e, "Credential slot still cannot be cleared"),
        }
        core.phase = Phase::Anonymous;
        core.user = None;
        self.publish(&core);
        true
    }

    /// Local half of ending a session.
    ///
    /// With `only_generation`, nothing happens if the session moved on since.
    /// Returns the removed credential when a live session was torn down.
    fn teardown(&self, only_generation: Option<u64>) -> Option<String> {
        let mut core = self.lock_core();

        if only_generation.is_some_and(|g| g != core.generation) {
            debug!("Session changed since the failing request; not tearing down");
            return None;
        }

        if core.phase == Phase::Anonymous && core.credential.is_none() {
            debug!("Session already ended");
            return None;
        }

        core.generation = core.generation.wrapping_add(1);
        let credential = core.credential.take();
        self.monitor.stop_monitoring();
        if let Err(e) = self.store.clear() {
            error!(error = %e, "Failed to clear credential slot; will retry on next bootstrap");
            core.pending_clear = true;
        }
        core.phase = Phase::Anonymous;
        core.user = None;
        self.publish(&core);
        info!("Session ended");

        credential
    }

    fn publish(&self, core: &SessionCore) {
        let next = core.snapshot();
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn lock_core(&self) -> MutexGuard<'_, SessionCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionControl for SessionManager {
    fn is_current(&self, credential: &str) -> bool {
        let core = self.lock_core();
        match &core.credential {
            Some(current) => current == credential,
            None if core.pending_clear => false,
            None => self.store.load().ok().flatten().as_deref() == Some(credential),
        }
    }

    fn expire(&self) {
        SessionManager::expire(self);
    }
}
