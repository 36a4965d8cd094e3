// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Expiration Monitor
//!
//! Predicts credential expiry from the unverified `exp` claim and flips an
//! observable `expired` flag shortly before the backend would start
//! rejecting the credential.
//!
//! ## Timing
//!
//! - `exp` already passed: the flag is set synchronously inside
//!   [`ExpirationMonitor::start_monitoring`]
//! - otherwise a one-shot alarm fires after `exp - now - buffer`, floored at
//!   zero, so a credential expiring within the buffer counts as expired
//! - no `exp`, or undecodable claims: nothing is armed and the flag is left
//!   alone
//!
//! The monitor only detects. Whoever observes the flag decides what to do.
//!
//! ## Cancellation
//!
//! Each alarm is a spawned task racing a sleep against a
//! `tokio_util::sync::CancellationToken`. Starting a new cycle or stopping
//! cancels the pending token first, and every alarm carries the cycle number
//! it was armed for, so a late wake-up from a cancelled cycle is discarded.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::auth;

#[derive(Debug, Default)]
struct Alarm {
    cycle: u64,
    cancel: Option<CancellationToken>,
}

impl Alarm {
    /// Cancel the pending alarm, if any, and start a new cycle.
    fn disarm(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        self.cycle = self.cycle.wrapping_add(1);
    }
}

#[derive(Debug)]
struct Shared {
    alarm: Mutex<Alarm>,
    expired: watch::Sender<bool>,
}

impl Shared {
    fn lock_alarm(&self) -> MutexGuard<'_, Alarm> {
        self.alarm.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_expired(&self, value: bool) {
        self.expired.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Called from the alarm task.
    fn fire(&self, cycle: u64) {
        let mut alarm = self.lock_alarm();
        if alarm.cycle != cycle || alarm.cancel.is_none() {
            debug!(cycle, "Discarding alarm from a cancelled cycle");
            return;
        }
        alarm.cancel = None;
        self.set_expired(true);
        info!("Credential reached its local expiry");
    }
}

/// One-shot, cancellable expiry alarm with an observable flag.
#[derive(Debug)]
pub struct ExpirationMonitor {
    buffer: Duration,
    shared: Arc<Shared>,
}

impl ExpirationMonitor {
    /// Create a monitor that fires `buffer` before the real expiry.
    pub fn new(buffer: Duration) -> Self {
        let (expired, _) = watch::channel(false);
        Self {
            buffer,
            shared: Arc::new(Shared {
                alarm: Mutex::new(Alarm::default()),
                expired,
            }),
        }
    }

    pub fn buffer(&self) -> Duration {
        self.buffer
    }

    /// Begin a monitoring cycle for `credential`, cancelling any previous one.
    ///
    /// Must be called from within a Tokio runtime when the credential has a
    /// future `exp`, since the alarm is a spawned task.
    pub fn start_monitoring(&self, credential: &str) {
        self.start_monitoring_at(credential, now_ms());
    }

    fn start_monitoring_at(&self, credential: &str, now_ms: i64) {
        let mut alarm = self.shared.lock_alarm();
        alarm.disarm();

        let claims = match auth::decode(credential) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(
                    error_code = e.error_code(),
                    error = %e,
                    "Credential claims unreadable; not monitoring expiry"
                );
                return;
            }
        };

        let Some(expires_at_ms) = claims.expires_at_ms() else {
            debug!("Credential has no exp claim; not monitoring expiry");
            return;
        };

        let until_expiry_ms = expires_at_ms.saturating_sub(now_ms);
        if until_expiry_ms <= 0 {
            info!(
                expired_ms_ago = until_expiry_ms.saturating_neg(),
                "Credential already expired"
            );
            self.shared.set_expired(true);
            return;
        }

        let delay = Duration::from_millis(until_expiry_ms as u64).saturating_sub(self.buffer);
        let deadline = tokio::time::Instant::now() + delay;
        let token = CancellationToken::new();
        alarm.cancel = Some(token.clone());
        let cycle = alarm.cycle;
        let shared = Arc::clone(&self.shared);

        debug!(
            cycle,
            delay_ms = delay.as_millis() as u64,
            until_expiry_ms,
            "Arming expiry alarm"
        );

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => shared.fire(cycle),
                _ = token.cancelled() => {}
            }
        });
    }

    /// Cancel any pending alarm and reset the flag to `false`. Idempotent.
    pub fn stop_monitoring(&self) {
        let mut alarm = self.shared.lock_alarm();
        let was_armed = alarm.cancel.is_some();
        alarm.disarm();
        self.shared.set_expired(false);
        if was_armed {
            debug!("Expiry alarm cancelled");
        }
    }

    /// Current value of the flag.
    pub fn is_expired(&self) -> bool {
        *self.shared.expired.borrow()
    }

    /// Whether an alarm is pending.
    pub fn is_armed(&self) -> bool {
        self.shared.lock_alarm().cancel.is_some()
    }

    /// Observe the flag. Receivers see each false→true and true→false change.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shared.expired.subscribe()
    }
}

impl Drop for ExpirationMonitor {
    fn drop(&mut self) {
        self.shared.lock_alarm().disarm();
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    const BUFFER: Duration = Duration::from_millis(5000);
    const NOW_MS: i64 = 1_700_000_000_000;

    fn credential(payload: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let claims = URL_SAFE_NO_PAD.encode(payload.as_bytes());
        format!("{header}.{claims}.sig")
    }

    fn expiring_in(ms: i64) -> String {
        credential(&format!(r#"{{"sub":"a@b.com","exp":{}}}"#, (NOW_MS + ms) / 1000))
    }

    /// Let spawned alarm tasks observe the current (paused) clock.
    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn past_exp_sets_flag_synchronously() {
        let monitor = ExpirationMonitor::new(BUFFER);
        monitor.start_monitoring_at(&expiring_in(-10_000), NOW_MS);

        assert!(monitor.is_expired());
        assert!(!monitor.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn exp_equal_to_now_counts_as_expired() {
        let monitor = ExpirationMonitor::new(BUFFER);
        monitor.start_monitoring_at(&expiring_in(0), NOW_MS);
        assert!(monitor.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn fires_buffer_before_expiry() {
        let monitor = ExpirationMonitor::new(BUFFER);
        monitor.start_monitoring_at(&expiring_in(60_000), NOW_MS);
        assert!(monitor.is_armed());

        tokio::time::advance(Duration::from_millis(54_999)).await;
        settle().await;
        assert!(!monitor.is_expired());

        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert!(monitor.is_expired());
        assert!(!monitor.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn expiring_within_buffer_fires_next_tick() {
        let monitor = ExpirationMonitor::new(BUFFER);
        monitor.start_monitoring_at(&expiring_in(3_000), NOW_MS);

        // Not synchronous: the credential has not actually expired yet.
        assert!(!monitor.is_expired());

        settle().await;
        assert!(monitor.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_exp_never_arms() {
        let monitor = ExpirationMonitor::new(BUFFER);
        monitor.start_monitoring_at(&credential(r#"{"sub":"a@b.com"}"#), NOW_MS);

        assert!(!monitor.is_armed());
        tokio::time::advance(Duration::from_secs(365 * 24 * 3600)).await;
        settle().await;
        assert!(!monitor.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_credential_is_ignored() {
        let monitor = ExpirationMonitor::new(BUFFER);
        monitor.start_monitoring_at("h.p.s", NOW_MS);
        monitor.start_monitoring_at("not-a-credential", NOW_MS);

        assert!(!monitor.is_armed());
        assert!(!monitor.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_previous_alarm() {
        let monitor = ExpirationMonitor::new(BUFFER);
        monitor.start_monitoring_at(&expiring_in(10_000), NOW_MS);
        monitor.start_monitoring_at(&expiring_in(120_000), NOW_MS);

        // The first alarm would have fired at 5s.
        tokio::time::advance(Duration::from_secs(20)).await;
        settle().await;
        assert!(!monitor.is_expired());
        assert!(monitor.is_armed());

        tokio::time::advance(Duration::from_secs(100)).await;
        settle().await;
        assert!(monitor.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_with_undecodable_credential_cancels_previous_alarm() {
        let monitor = ExpirationMonitor::new(BUFFER);
        monitor.start_monitoring_at(&expiring_in(10_000), NOW_MS);
        monitor.start_monitoring_at("garbage", NOW_MS);

        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert!(!monitor.is_armed());
        assert!(!monitor.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_keeps_flag_false_past_expiry() {
        let monitor = ExpirationMonitor::new(BUFFER);
        monitor.start_monitoring_at(&expiring_in(10_000), NOW_MS);
        monitor.stop_monitoring();

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert!(!monitor.is_expired());
        assert!(!monitor.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_resets_flag_and_is_idempotent() {
        let monitor = ExpirationMonitor::new(BUFFER);
        monitor.start_monitoring_at(&expiring_in(-1_000), NOW_MS);
        assert!(monitor.is_expired());

        monitor.stop_monitoring();
        monitor.stop_monitoring();
        assert!(!monitor.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_observe_transition() {
        let monitor = ExpirationMonitor::new(BUFFER);
        let mut expired = monitor.subscribe();
        assert!(!*expired.borrow_and_update());

        monitor.start_monitoring_at(&expiring_in(30_000), NOW_MS);
        tokio::time::advance(Duration::from_secs(25)).await;

        expired.changed().await.unwrap();
        assert!(*expired.borrow_and_update());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_buffer_fires_at_expiry() {
        let monitor = ExpirationMonitor::new(Duration::ZERO);
        monitor.start_monitoring_at(&expiring_in(2_000), NOW_MS);

        tokio::time::advance(Duration::from_millis(1_999)).await;
        settle().await;
        assert!(!monitor.is_expired());

        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert!(monitor.is_expired());
    }

    #[tokio::test]
    async fn wall_clock_start_uses_current_time() {
        let monitor = ExpirationMonitor::new(BUFFER);
        let exp = chrono::Utc::now().timestamp() - 10;
        monitor.start_monitoring(&credential(&format!(r#"{{"exp":{exp}}}"#)));
        assert!(monitor.is_expired());
    }
}
