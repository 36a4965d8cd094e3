// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Composition Root
//!
//! Wires the credential slot, notification sink and session manager
//! together, and runs the expiry watcher: the one place that turns the
//! monitor's `expired` flag into `end_session()`.
//!
//! ## Shutdown
//!
//! The watcher uses `tokio_util::sync::CancellationToken` for graceful
//! shutdown, the same way the other background loops in this crate do.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::http::{ApiClient, NotificationSink, TracingNotifier};
use crate::session::SessionManager;
use crate::storage::{CredentialStore, FileCredentialStore, StoragePaths};

/// A fully wired coaching client.
///
/// Must be created inside a Tokio runtime.
pub struct CoachClient {
    session: Arc<SessionManager>,
    shutdown: CancellationToken,
    watcher: Option<JoinHandle<()>>,
}

impl CoachClient {
    pub fn new(
        config: &ClientConfig,
        store: Arc<dyn CredentialStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, ClientError> {
        let session = SessionManager::new(config, store, sink)?;
        let shutdown = CancellationToken::new();
        let expired = session.subscribe_expiry();
        let watcher = tokio::spawn(watch_expiry(
            Arc::clone(&session),
            expired,
            shutdown.clone(),
        ));

        Ok(Self {
            session,
            shutdown,
            watcher: Some(watcher),
        })
    }

    /// File-backed credential slot under the configured data directory and
    /// log-only notifications.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let store = FileCredentialStore::open(StoragePaths::new(config.data_dir()))?;
        Self::new(config, Arc::new(store), Arc::new(TracingNotifier))
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Transport for feature requests.
    pub fn api(&self) -> &ApiClient {
        self.session.api()
    }

    /// Stop the expiry watcher and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(watcher) = self.watcher.take() {
            let _ = watcher.await;
        }
    }
}

impl Drop for CoachClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// End the session whenever the expiration monitor reports expiry.
///
/// `expired` is subscribed before the task is spawned, so a flag raised in
/// between is still seen.
async fn watch_expiry(
    session: Arc<SessionManager>,
    mut expired: watch::Receiver<bool>,
    shutdown: CancellationToken,
) {
    info!("Expiry watcher starting");

    if *expired.borrow_and_update() {
        info!("Credential already expired; ending session");
        session.end_session().await;
    }

    loop {
        tokio::select! {
            changed = expired.changed() => {
                if changed.is_err() {
                    return;
                }
                if *expired.borrow_and_update() {
                    info!("Credential expired locally; ending session");
                    session.end_session().await;
                }
            }
            _ = shutdown.cancelled() => {
                info!("Expiry watcher shutting down");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ToastQueue;
    use crate::session::Phase;
    use crate::storage::MemoryCredentialStore;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use std::time::Duration;

    fn expired_credential() -> String {
        let payload = URL_SAFE_NO_PAD.encode(r#"{"exp":1000}"#);
        format!("header.{payload}.signature")
    }

    fn client() -> CoachClient {
        let config = ClientConfig::new("http://127.0.0.1:9").unwrap();
        CoachClient::new(
            &config,
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(ToastQueue::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn watcher_sees_expiry_raised_before_it_first_runs() {
        let client = client();
        let session = client.session().clone();
        let mut updates = session.subscribe();

        // Current-thread runtime: the watcher has not been polled yet.
        session.monitor().start_monitoring(&expired_credential());
        assert!(session.is_expired());

        tokio::time::timeout(
            Duration::from_secs(2),
            updates.wait_for(|s| s.phase == Phase::Anonymous),
        )
        .await
        .expect("watcher should end the session")
        .unwrap();
        assert!(!session.is_expired());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_the_watcher() {
        let client = client();
        let session = client.session().clone();
        client.shutdown().await;

        session.monitor().start_monitoring(&expired_credential());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(session.phase(), Phase::Checking);
        assert!(session.is_expired());
    }
}
