// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User-facing error notifications.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use tracing::warn;

/// Receives human-readable error messages for display.
pub trait NotificationSink: Send + Sync {
    fn error(&self, message: &str);
}

/// Sink that only logs. Used by headless clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn error(&self, message: &str) {
        warn!(notification = %message, "User notification");
    }
}

/// Queue of pending error toasts, drained by the UI shell on each render.
#[derive(Debug, Default)]
pub struct ToastQueue {
    pending: Mutex<VecDeque<String>>,
}

impl ToastQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every queued message, oldest first.
    pub fn drain(&self) -> Vec<String> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationSink for ToastQueue {
    fn error(&self, message: &str) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(message.to_string());
    }
}
