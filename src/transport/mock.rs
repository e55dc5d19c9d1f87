//! In-memory transport for tests and benches.
//!
//! Replays status transitions and raw rows on demand, records every
//! open/remove so tests can assert on channel bookkeeping, and stops
//! delivering events for removed handles.

use super::{ChangeHandler, ChangeSpec, ChannelTransport, StatusHandler, TransportChannel};
use crate::types::{ChangeAction, RawChange, TransportStatus};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One mock channel. Created via [`MockTransport::open_channel`].
pub struct MockChannel {
    topic: String,
    removed: AtomicBool,
    listeners: Mutex<Vec<(ChangeSpec, ChangeHandler)>>,
    status_handler: Mutex<Option<StatusHandler>>,
}

impl MockChannel {
    fn new(topic: &str) -> Self {
        MockChannel {
            topic: topic.to_string(),
            removed: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
            status_handler: Mutex::new(None),
        }
    }

    fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }

    fn emit_status(&self, status: TransportStatus) {
        if self.is_removed() {
            return;
        }
        let handler = self.status_handler.lock().clone();
        if let Some(h) = handler {
            h(status);
        }
    }

    fn emit_change(&self, change: &RawChange) {
        if self.is_removed() {
            return;
        }
        let listeners = self.listeners.lock().clone();
        for (spec, handler) in listeners {
            if spec.table == change.table && spec.action == change.action {
                handler(change.clone());
            }
        }
    }
}

impl TransportChannel for MockChannel {
    fn topic(&self) -> String {
        self.topic.clone()
    }

    fn on_change(&self, spec: ChangeSpec, handler: ChangeHandler) {
        self.listeners.lock().push((spec, handler));
    }

    fn subscribe(&self, on_status: StatusHandler) {
        *self.status_handler.lock() = Some(on_status);
    }
}

/// In-memory [`ChannelTransport`].
///
/// Each `open_channel` returns a fresh handle, even for a repeated
/// topic, mirroring a real transport where a removed channel must be
/// re-created. Test drivers address channels by topic; emits go to the
/// most recently opened live handle for that topic.
#[derive(Default)]
pub struct MockTransport {
    channels: Mutex<Vec<Arc<MockChannel>>>,
    opened: Mutex<Vec<String>>,
    removed_topics: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Topics opened so far, in order, including re-opens.
    pub fn opened_topics(&self) -> Vec<String> {
        self.opened.lock().clone()
    }

    /// Topics removed so far, in order.
    pub fn removed_topics(&self) -> Vec<String> {
        self.removed_topics.lock().clone()
    }

    /// Number of channels currently live (opened and not removed).
    pub fn live_channel_count(&self) -> usize {
        self.channels.lock().iter().filter(|c| !c.is_removed()).count()
    }

    fn live_channel(&self, topic: &str) -> Option<Arc<MockChannel>> {
        self.channels
            .lock()
            .iter()
            .rev()
            .find(|c| c.topic == topic && !c.is_removed())
            .cloned()
    }

    /// Drive a status transition on the live channel for `topic`.
    /// Returns false if no live channel matched.
    pub fn emit_status(&self, topic: &str, status: TransportStatus) -> bool {
        match self.live_channel(topic) {
            Some(ch) => {
                ch.emit_status(status);
                true
            }
            None => false,
        }
    }

    /// Deliver a raw change on the live channel for `topic`.
    pub fn emit_change(
        &self,
        topic: &str,
        table: &str,
        action: ChangeAction,
        record: serde_json::Value,
    ) -> bool {
        self.emit_change_full(topic, table, action, record, None)
    }

    /// Deliver a raw change with an old row image (updates/deletes).
    pub fn emit_change_full(
        &self,
        topic: &str,
        table: &str,
        action: ChangeAction,
        record: serde_json::Value,
        old_record: Option<serde_json::Value>,
    ) -> bool {
        let change = RawChange {
            table: table.to_string(),
            action,
            record,
            old_record,
        };
        match self.live_channel(topic) {
            Some(ch) => {
                ch.emit_change(&change);
                true
            }
            None => false,
        }
    }
}

impl ChannelTransport for MockTransport {
    fn open_channel(&self, topic: &str) -> Arc<dyn TransportChannel> {
        let channel = Arc::new(MockChannel::new(topic));
        self.opened.lock().push(topic.to_string());
        self.channels.lock().push(channel.clone());
        channel
    }

    fn remove_channel(&self, channel: &Arc<dyn TransportChannel>) {
        let topic = channel.topic();
        let channels = self.channels.lock();
        // Match by identity, not topic: a re-opened topic must not
        // remove the replacement handle.
        let target = Arc::as_ptr(channel) as *const ();
        for ch in channels.iter() {
            if Arc::as_ptr(ch) as *const () == target && !ch.is_removed() {
                ch.removed.store(true, Ordering::SeqCst);
                self.removed_topics.lock().push(topic);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn removed_channel_drops_events() {
        let transport = MockTransport::new();
        let ch = transport.open_channel("deposits:0xaa");

        let seen = Arc::new(Mutex::new(0usize));
        let seen2 = seen.clone();
        ch.on_change(
            ChangeSpec::new("deposits", ChangeAction::Insert),
            Arc::new(move |_| {
                *seen2.lock() += 1;
            }),
        );

        transport.emit_change("deposits:0xaa", "deposits", ChangeAction::Insert, json!({}));
        assert_eq!(*seen.lock(), 1);

        transport.remove_channel(&ch);
        let delivered =
            transport.emit_change("deposits:0xaa", "deposits", ChangeAction::Insert, json!({}));
        assert!(!delivered);
        assert_eq!(*seen.lock(), 1);
    }

    #[test]
    fn reopened_topic_gets_fresh_handle() {
        let transport = MockTransport::new();
        let first = transport.open_channel("txs:0xaa");
        transport.remove_channel(&first);
        let _second = transport.open_channel("txs:0xaa");

        assert_eq!(transport.live_channel_count(), 1);
        assert_eq!(transport.opened_topics().len(), 2);
        assert_eq!(transport.removed_topics(), vec!["txs:0xaa".to_string()]);
    }

    #[test]
    fn listeners_filter_by_table_and_action() {
        let transport = MockTransport::new();
        let ch = transport.open_channel("wl:0xaa");

        let inserts = Arc::new(Mutex::new(0usize));
        let inserts2 = inserts.clone();
        ch.on_change(
            ChangeSpec::new("whitelist", ChangeAction::Insert),
            Arc::new(move |_| {
                *inserts2.lock() += 1;
            }),
        );

        transport.emit_change("wl:0xaa", "whitelist", ChangeAction::Delete, json!({}));
        transport.emit_change("wl:0xaa", "other_table", ChangeAction::Insert, json!({}));
        transport.emit_change("wl:0xaa", "whitelist", ChangeAction::Insert, json!({}));
        assert_eq!(*inserts.lock(), 1);
    }
}
