//! Service facade wiring transport, scheduler, registry, and fan-out.

use crate::channels::{ChannelRegistry, RetryPolicy};
use crate::entities::{subscribe_entity, EntityKind, EntitySubscription};
use crate::error::{Result, SyncError};
use crate::fanout::{EntityInterest, FanoutManager, SyncEvent, WalletHandle, DEFAULT_MAX_ACTIVE_WALLETS};
use crate::scheduler::{ReconnectScheduler, ThreadScheduler};
use crate::transport::ChannelTransport;
use crossbeam_channel::unbounded;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// Top-level configuration for the subscription layer.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Cap on concurrently active wallet subscriptions.
    pub max_active_wallets: usize,
    /// Reconnect backoff policy, shared by every channel.
    pub retry: RetryPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_active_wallets: DEFAULT_MAX_ACTIVE_WALLETS,
            retry: RetryPolicy::default(),
        }
    }
}

/// Handle to the process-wide indexer-state stream.
#[derive(Debug)]
pub struct GlobalStateHandle {
    pub receiver: crossbeam_channel::Receiver<SyncEvent>,
}

impl GlobalStateHandle {
    pub fn try_recv(&self) -> std::result::Result<SyncEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> std::result::Result<SyncEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

struct ServiceInner {
    registry: Arc<ChannelRegistry>,
    fanout: FanoutManager,
    /// The global indexer-state channel is mounted at most once per
    /// service by a designated owner.
    global: Mutex<Option<EntitySubscription>>,
}

/// Entry point for consumers.
///
/// Built enabled over a configured transport, or [`disabled`] when the
/// realtime backend is not configured — in which case the whole
/// subsystem is inert: `activate` is a no-op and the indexer-state
/// watch fails fast with [`SyncError::NotConfigured`]. The check
/// happens once, here, not at every call site.
///
/// [`disabled`]: SyncService::disabled
pub struct SyncService {
    inner: Option<ServiceInner>,
}

impl SyncService {
    pub fn new(
        config: SyncConfig,
        transport: Arc<dyn ChannelTransport>,
        scheduler: Arc<dyn ReconnectScheduler>,
    ) -> Self {
        let registry = ChannelRegistry::new(transport, scheduler, config.retry.clone());
        let fanout = FanoutManager::new(registry.clone(), config.max_active_wallets);
        info!(
            max_active_wallets = config.max_active_wallets,
            max_attempts = config.retry.max_attempts,
            "realtime sync enabled"
        );
        SyncService {
            inner: Some(ServiceInner {
                registry,
                fanout,
                global: Mutex::new(None),
            }),
        }
    }

    /// Default configuration with the thread-backed timer scheduler.
    pub fn with_defaults(transport: Arc<dyn ChannelTransport>) -> Self {
        Self::new(SyncConfig::default(), transport, Arc::new(ThreadScheduler))
    }

    /// An inert service for deployments without a realtime backend.
    pub fn disabled() -> Self {
        info!("realtime backend not configured; sync disabled");
        SyncService { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Activate a wallet's subscriptions. `None` when disabled, when
    /// the wallet is already active, or when `interest` is empty.
    pub fn activate(&self, wallet: &str, interest: &EntityInterest) -> Option<WalletHandle> {
        self.inner
            .as_ref()
            .and_then(|inner| inner.fanout.activate(wallet, interest))
    }

    /// Deactivate a wallet. No-op when disabled or inactive.
    pub fn deactivate(&self, wallet: &str) {
        if let Some(inner) = &self.inner {
            inner.fanout.deactivate(wallet);
        }
    }

    pub fn is_active(&self, wallet: &str) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| inner.fanout.is_active(wallet))
    }

    pub fn active_count(&self) -> usize {
        self.inner
            .as_ref()
            .map_or(0, |inner| inner.fanout.active_count())
    }

    /// Mount the global indexer-state channel.
    ///
    /// Designed for a single owner: a second mount while one is live
    /// fails with [`SyncError::AlreadyActive`]. After a terminal
    /// reconnect failure, call [`unwatch_indexer_state`] and mount
    /// again to retry.
    ///
    /// [`unwatch_indexer_state`]: SyncService::unwatch_indexer_state
    pub fn watch_indexer_state(&self) -> Result<GlobalStateHandle> {
        let inner = self.inner.as_ref().ok_or(SyncError::NotConfigured)?;

        let mut global = inner.global.lock();
        if global.is_some() {
            return Err(SyncError::AlreadyActive("indexer_state".to_string()));
        }

        let (sender, receiver) = unbounded();
        let subscription =
            subscribe_entity(&inner.registry, EntityKind::IndexerState, None, &sender);
        *global = Some(subscription);

        Ok(GlobalStateHandle { receiver })
    }

    /// Unmount the global indexer-state channel. Idempotent.
    pub fn unwatch_indexer_state(&self) {
        if let Some(inner) = &self.inner {
            if let Some(subscription) = inner.global.lock().take() {
                subscription.unsubscribe();
            }
        }
    }

    /// Tear down every wallet and the global channel. Used on
    /// disconnect/logout.
    pub fn cleanup(&self) {
        if let Some(inner) = &self.inner {
            inner.fanout.cleanup();
            if let Some(subscription) = inner.global.lock().take() {
                subscription.unsubscribe();
            }
        }
    }
}
