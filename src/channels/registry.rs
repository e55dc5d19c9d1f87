//! Channel registry: one transport channel per (entity, wallet) key.
//!
//! The registry exclusively owns transport handles and all reconnect
//! bookkeeping. State is instance-owned, never static, so tests can run
//! independent registries side by side.

use super::reconnect::RetryPolicy;
use crate::error::SyncError;
use crate::scheduler::{ReconnectScheduler, TimerHandle};
use crate::transport::{ChangeHandler, ChangeSpec, ChannelTransport, StatusHandler, TransportChannel};
use crate::types::{ChannelKey, ChannelStatus, TransportStatus};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// One listener registration for a channel: spec plus the handler that
/// receives raw payloads (the owning entity's validator).
pub struct ChannelBinding {
    pub spec: ChangeSpec,
    pub handler: ChangeHandler,
}

/// Per-channel lifecycle hooks supplied by the owning adapter.
#[derive(Clone)]
pub struct ChannelHooks {
    /// Fired exactly once after a successful resubscribe that followed
    /// an outage. Never fired on the first subscribe.
    pub on_reconnect: Arc<dyn Fn() + Send + Sync>,
    /// Fired on terminal failure, after all retry attempts are spent.
    pub on_error: Arc<dyn Fn(SyncError) + Send + Sync>,
}

struct ChannelEntry {
    channel: Arc<dyn TransportChannel>,
    status: ChannelStatus,
    /// Consecutive failures since the last successful subscribe.
    attempts: u32,
    /// The next `Subscribed` transition is a recovery, not a first
    /// subscribe; fire `on_reconnect` once and clear.
    reconnecting: bool,
    pending_timer: Option<TimerHandle>,
    /// Bumped on every resubscribe; status callbacks from a replaced
    /// transport handle carry a stale generation and are ignored.
    generation: u64,
    bindings: Arc<Vec<ChannelBinding>>,
    hooks: ChannelHooks,
}

/// Registry of live channels with reconnect bookkeeping.
pub struct ChannelRegistry {
    transport: Arc<dyn ChannelTransport>,
    scheduler: Arc<dyn ReconnectScheduler>,
    policy: RetryPolicy,
    /// Self-reference handed to status callbacks and timers so they
    /// cannot keep the registry alive past its owner.
    weak: Weak<ChannelRegistry>,
    inner: Mutex<HashMap<ChannelKey, ChannelEntry>>,
}

impl ChannelRegistry {
    pub fn new(
        transport: Arc<dyn ChannelTransport>,
        scheduler: Arc<dyn ReconnectScheduler>,
        policy: RetryPolicy,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| ChannelRegistry {
            transport,
            scheduler,
            policy,
            weak: weak.clone(),
            inner: Mutex::new(HashMap::new()),
        })
    }

    /// Open a channel for `key`, attaching one listener per binding.
    ///
    /// Idempotent per key: an existing entry (subscribing, active, or
    /// mid-reconnect) is left alone; no second transport channel is
    /// created.
    pub fn open(&self, key: &ChannelKey, bindings: Vec<ChannelBinding>, hooks: ChannelHooks) {
        let (channel, bindings, generation) = {
            let mut inner = self.inner.lock();
            if inner.contains_key(key) {
                debug!(channel = %key.topic(), "open: channel already registered");
                return;
            }

            let channel = self.transport.open_channel(&key.topic());
            let bindings = Arc::new(bindings);
            inner.insert(
                key.clone(),
                ChannelEntry {
                    channel: channel.clone(),
                    status: ChannelStatus::Subscribing,
                    attempts: 0,
                    reconnecting: false,
                    pending_timer: None,
                    generation: 1,
                    bindings: bindings.clone(),
                    hooks,
                },
            );
            (channel, bindings, 1)
        };

        debug!(channel = %key.topic(), "opening channel");
        self.attach(key, &channel, &bindings, generation);
    }

    /// Tear down the channel for `key`: cancel any pending reconnect
    /// timer first (a late timer must never resurrect a closed
    /// channel), then remove the transport channel and all bookkeeping.
    /// Idempotent no-op when the key is unknown.
    pub fn close(&self, key: &ChannelKey) {
        let entry = self.inner.lock().remove(key);
        if let Some(mut entry) = entry {
            if let Some(timer) = entry.pending_timer.take() {
                timer.cancel();
            }
            self.transport.remove_channel(&entry.channel);
            debug!(channel = %key.topic(), "closed channel");
        }
    }

    /// Current lifecycle status, `None` if the key is not registered.
    pub fn status(&self, key: &ChannelKey) -> Option<ChannelStatus> {
        self.inner.lock().get(key).map(|e| e.status)
    }

    /// Consecutive failure count since the last successful subscribe.
    pub fn attempts(&self, key: &ChannelKey) -> Option<u32> {
        self.inner.lock().get(key).map(|e| e.attempts)
    }

    pub fn contains(&self, key: &ChannelKey) -> bool {
        self.inner.lock().contains_key(key)
    }

    pub fn channel_count(&self) -> usize {
        self.inner.lock().len()
    }

    /// Register listeners and activate the channel. The status callback
    /// carries the generation it was attached under so a replaced
    /// handle cannot act on current state.
    fn attach(
        &self,
        key: &ChannelKey,
        channel: &Arc<dyn TransportChannel>,
        bindings: &Arc<Vec<ChannelBinding>>,
        generation: u64,
    ) {
        for binding in bindings.iter() {
            channel.on_change(binding.spec.clone(), binding.handler.clone());
        }

        let registry = self.weak.clone();
        let key = key.clone();
        let on_status: StatusHandler = Arc::new(move |status| {
            if let Some(registry) = registry.upgrade() {
                registry.handle_status(&key, generation, status);
            }
        });
        channel.subscribe(on_status);
    }

    fn handle_status(&self, key: &ChannelKey, generation: u64, status: TransportStatus) {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.get_mut(key) else {
            return;
        };
        if entry.generation != generation {
            return;
        }

        match status {
            TransportStatus::Subscribed => {
                // The transport can recover on its own before the
                // backoff timer fires; a live timer here would tear
                // down the healthy channel.
                if let Some(timer) = entry.pending_timer.take() {
                    timer.cancel();
                }
                entry.status = ChannelStatus::Active;
                entry.attempts = 0;
                if entry.reconnecting {
                    entry.reconnecting = false;
                    let hook = entry.hooks.on_reconnect.clone();
                    drop(inner);
                    debug!(channel = %key.topic(), "channel recovered");
                    hook();
                }
            }
            TransportStatus::ChannelError | TransportStatus::TimedOut => {
                self.handle_failure(inner, key);
            }
            TransportStatus::Closed => {
                if let Some(timer) = entry.pending_timer.take() {
                    timer.cancel();
                }
                inner.remove(key);
                debug!(channel = %key.topic(), "transport closed channel");
            }
        }
    }

    /// Failure path for one channel. Expects `inner` locked with an
    /// entry present for `key`.
    fn handle_failure(
        &self,
        mut inner: parking_lot::MutexGuard<'_, HashMap<ChannelKey, ChannelEntry>>,
        key: &ChannelKey,
    ) {
        let Some(entry) = inner.get_mut(key) else {
            return;
        };

        // At most one scheduled reconnect per channel.
        if entry.pending_timer.is_some() {
            return;
        }

        entry.attempts += 1;
        let attempt = entry.attempts;

        if attempt >= self.policy.max_attempts {
            let Some(entry) = inner.remove(key) else {
                return;
            };
            drop(inner);

            self.transport.remove_channel(&entry.channel);
            warn!(channel = %key.topic(), attempts = attempt, "giving up on channel");
            (entry.hooks.on_error)(SyncError::ReconnectExhausted { attempts: attempt });
            return;
        }

        let delay = self.policy.delay_for(attempt);
        entry.reconnecting = true;
        entry.status = ChannelStatus::Reconnecting;

        let registry = self.weak.clone();
        let retry_key = key.clone();
        let timer = self.scheduler.schedule(
            delay,
            Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    registry.resubscribe(&retry_key);
                }
            }),
        );
        entry.pending_timer = Some(timer);
        debug!(
            channel = %key.topic(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            "scheduled reconnect"
        );
    }

    /// Fired by the backoff timer: replace the dead transport handle
    /// and subscribe again. No-op if the channel was closed in the
    /// meantime.
    fn resubscribe(&self, key: &ChannelKey) {
        let (old_channel, new_channel, bindings, generation) = {
            let mut inner = self.inner.lock();
            let Some(entry) = inner.get_mut(key) else {
                return;
            };
            entry.pending_timer = None;

            let old_channel = entry.channel.clone();
            let new_channel = self.transport.open_channel(&key.topic());
            entry.channel = new_channel.clone();
            entry.status = ChannelStatus::Subscribing;
            entry.generation += 1;
            (old_channel, new_channel, entry.bindings.clone(), entry.generation)
        };

        // Remove the dead handle before re-attaching.
        self.transport.remove_channel(&old_channel);
        debug!(channel = %key.topic(), "resubscribing");
        self.attach(key, &new_channel, &bindings, generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EntityKind;
    use crate::scheduler::ManualScheduler;
    use crate::transport::mock::MockTransport;
    use crate::types::WalletAddress;

    fn noop_hooks() -> ChannelHooks {
        ChannelHooks {
            on_reconnect: Arc::new(|| {}),
            on_error: Arc::new(|_| {}),
        }
    }

    fn key() -> ChannelKey {
        ChannelKey::wallet(EntityKind::Deposits, WalletAddress::new("0xaa"))
    }

    fn registry() -> (Arc<ChannelRegistry>, Arc<MockTransport>, Arc<ManualScheduler>) {
        let transport = Arc::new(MockTransport::new());
        let scheduler = Arc::new(ManualScheduler::new());
        let registry = ChannelRegistry::new(
            transport.clone(),
            scheduler.clone(),
            RetryPolicy::default(),
        );
        (registry, transport, scheduler)
    }

    #[test]
    fn open_is_idempotent_per_key() {
        let (registry, transport, _) = registry();

        registry.open(&key(), Vec::new(), noop_hooks());
        registry.open(&key(), Vec::new(), noop_hooks());

        assert_eq!(transport.opened_topics().len(), 1);
        assert_eq!(registry.channel_count(), 1);
    }

    #[test]
    fn close_removes_channel_and_bookkeeping() {
        let (registry, transport, _) = registry();

        registry.open(&key(), Vec::new(), noop_hooks());
        registry.close(&key());
        registry.close(&key());

        assert!(!registry.contains(&key()));
        assert_eq!(transport.removed_topics().len(), 1);
    }

    #[test]
    fn failure_schedules_single_reconnect() {
        let (registry, transport, scheduler) = registry();

        registry.open(&key(), Vec::new(), noop_hooks());
        transport.emit_status(&key().topic(), TransportStatus::ChannelError);
        // A second failure before the timer fires must not schedule again.
        transport.emit_status(&key().topic(), TransportStatus::ChannelError);

        assert_eq!(scheduler.pending_count(), 1);
        assert_eq!(registry.attempts(&key()), Some(1));
        assert_eq!(registry.status(&key()), Some(ChannelStatus::Reconnecting));
    }

    #[test]
    fn self_recovery_cancels_pending_reconnect() {
        let (registry, transport, scheduler) = registry();

        registry.open(&key(), Vec::new(), noop_hooks());
        transport.emit_status(&key().topic(), TransportStatus::ChannelError);
        // Same handle comes back before the backoff timer fires.
        transport.emit_status(&key().topic(), TransportStatus::Subscribed);

        assert_eq!(scheduler.pending_count(), 0);
        assert_eq!(scheduler.fire_all(), 0);
        assert_eq!(registry.status(&key()), Some(ChannelStatus::Active));
        assert_eq!(registry.attempts(&key()), Some(0));
        assert_eq!(transport.opened_topics().len(), 1);
        assert!(transport.removed_topics().is_empty());
    }

    #[test]
    fn stale_generation_status_is_ignored() {
        let (registry, transport, scheduler) = registry();

        registry.open(&key(), Vec::new(), noop_hooks());
        transport.emit_status(&key().topic(), TransportStatus::ChannelError);
        assert!(scheduler.fire_next());

        // A late callback from the replaced handle carries generation 1;
        // the entry is on generation 2 by now.
        registry.handle_status(&key(), 1, TransportStatus::Subscribed);
        assert_eq!(registry.status(&key()), Some(ChannelStatus::Subscribing));

        transport.emit_status(&key().topic(), TransportStatus::Subscribed);
        assert_eq!(registry.status(&key()), Some(ChannelStatus::Active));
    }

    #[test]
    fn closed_status_clears_bookkeeping() {
        let (registry, transport, _) = registry();

        registry.open(&key(), Vec::new(), noop_hooks());
        transport.emit_status(&key().topic(), TransportStatus::Closed);

        assert!(!registry.contains(&key()));
    }
}
