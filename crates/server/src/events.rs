// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Unapproved-updates notification
//!
//! When the offering engine finds applicable software it may not offer
//! because nothing approved it, it raises this event so an operator
//! surface can react (typically by approving and letting the client's next
//! sync pick the updates up). Dispatch is best-effort: no subscribers is
//! fine, and a lagging subscriber loses old events rather than blocking
//! the engine.

use tokio::sync::broadcast;
use tracing::debug;
use update_sync_model::UpdateIdentity;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Applicable software updates that were withheld for lack of approval
#[derive(Debug, Clone)]
pub struct UnapprovedUpdatesEvent {
    pub updates: Vec<UpdateIdentity>,
}

/// Broadcast notifier for [`UnapprovedUpdatesEvent`]
#[derive(Debug)]
pub struct UnapprovedUpdatesNotifier {
    sender: broadcast::Sender<UnapprovedUpdatesEvent>,
}

impl Default for UnapprovedUpdatesNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl UnapprovedUpdatesNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Subscribe to future events
    pub fn subscribe(&self) -> broadcast::Receiver<UnapprovedUpdatesEvent> {
        self.sender.subscribe()
    }

    /// Raise the event; a no-op when `updates` is empty
    pub fn notify(&self, updates: Vec<UpdateIdentity>) {
        if updates.is_empty() {
            return;
        }
        debug!(count = updates.len(), "unapproved applicable updates requested");
        let _ = self.sender.send(UnapprovedUpdatesEvent { updates });
    }
}
