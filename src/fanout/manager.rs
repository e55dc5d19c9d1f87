//! Per-wallet subscription fan-out with a bounded active set.

use super::types::{DropReason, EntityInterest, SyncEvent, WalletHandle};
use crate::channels::ChannelRegistry;
use crate::entities::{subscribe_entity, EntitySubscription};
use crate::types::WalletAddress;
use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

/// Default cap on concurrently active wallet subscriptions.
pub const DEFAULT_MAX_ACTIVE_WALLETS: usize = 10;

struct ActiveWallet {
    sender: Sender<SyncEvent>,
    subscriptions: Vec<EntitySubscription>,
}

/// Explicit FIFO bookkeeping: `order` is activation order, `wallets`
/// the lookup index. Eviction always takes `order.front()`.
#[derive(Default)]
struct FanoutState {
    order: VecDeque<WalletAddress>,
    wallets: HashMap<WalletAddress, ActiveWallet>,
}

impl FanoutState {
    /// Remove one wallet: notify its stream exactly once, then drain
    /// every teardown. Teardowns are idempotent and infallible, so one
    /// channel's teardown can never block the rest.
    fn remove(&mut self, wallet: &WalletAddress, reason: DropReason) -> bool {
        let Some(active) = self.wallets.remove(wallet) else {
            return false;
        };
        self.order.retain(|w| w != wallet);

        let _ = active.sender.send(SyncEvent::Dropped { reason });
        for subscription in &active.subscriptions {
            subscription.unsubscribe();
        }
        true
    }
}

/// The per-wallet aggregation point.
///
/// Activates the relevant entity adapters together, enforces the global
/// cap on active wallets by FIFO eviction, and exposes idempotent
/// activate/deactivate plus bulk cleanup. Nothing here returns an
/// error: these are UI-lifecycle hooks with best-effort semantics.
pub struct FanoutManager {
    registry: Arc<ChannelRegistry>,
    max_active_wallets: usize,
    inner: Mutex<FanoutState>,
}

impl FanoutManager {
    pub fn new(registry: Arc<ChannelRegistry>, max_active_wallets: usize) -> Self {
        FanoutManager {
            registry,
            max_active_wallets: max_active_wallets.max(1),
            inner: Mutex::new(FanoutState::default()),
        }
    }

    /// Activate subscriptions for a wallet.
    ///
    /// Returns `None` when the wallet is already active (idempotent: no
    /// re-subscribe, no double-count) or when `interest` is empty. If
    /// the cap is reached, the oldest-activated wallet is evicted first
    /// (its stream sees `Dropped { Evicted }` before teardown).
    pub fn activate(&self, wallet: &str, interest: &EntityInterest) -> Option<WalletHandle> {
        let wallet = WalletAddress::new(wallet);
        if interest.is_empty() {
            return None;
        }

        let mut inner = self.inner.lock();
        if inner.wallets.contains_key(&wallet) {
            debug!(%wallet, "activate: wallet already active");
            return None;
        }

        while inner.order.len() >= self.max_active_wallets {
            let Some(oldest) = inner.order.front().cloned() else {
                break;
            };
            warn!(evicted = %oldest, incoming = %wallet, "active wallet cap reached");
            inner.remove(&oldest, DropReason::Evicted);
        }

        let (sender, receiver) = unbounded();
        let subscriptions = interest
            .entities()
            .iter()
            .map(|&kind| subscribe_entity(&self.registry, kind, Some(&wallet), &sender))
            .collect();

        inner.order.push_back(wallet.clone());
        inner.wallets.insert(
            wallet.clone(),
            ActiveWallet {
                sender,
                subscriptions,
            },
        );
        debug!(%wallet, entities = interest.entities().len(), "activated wallet");

        Some(WalletHandle { wallet, receiver })
    }

    /// Deactivate a wallet, tearing down every channel opened on its
    /// behalf. Idempotent: deactivating an inactive wallet is a no-op.
    pub fn deactivate(&self, wallet: &str) {
        let wallet = WalletAddress::new(wallet);
        if self.inner.lock().remove(&wallet, DropReason::Unsubscribed) {
            debug!(%wallet, "deactivated wallet");
        }
    }

    pub fn is_active(&self, wallet: &str) -> bool {
        let wallet = WalletAddress::new(wallet);
        self.inner.lock().wallets.contains_key(&wallet)
    }

    pub fn active_count(&self) -> usize {
        self.inner.lock().wallets.len()
    }

    /// Active wallets in activation order (front = next to evict).
    pub fn active_wallets(&self) -> Vec<WalletAddress> {
        self.inner.lock().order.iter().cloned().collect()
    }

    /// Tear down every active wallet unconditionally and clear all
    /// bookkeeping. Used on disconnect/logout.
    pub fn cleanup(&self) {
        let mut inner = self.inner.lock();
        while let Some(wallet) = inner.order.front().cloned() {
            inner.remove(&wallet, DropReason::Shutdown);
        }
        debug!("fan-out cleanup complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::RetryPolicy;
    use crate::entities::EntityKind;
    use crate::scheduler::ManualScheduler;
    use crate::transport::mock::MockTransport;

    fn manager(cap: usize) -> (FanoutManager, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::new());
        let registry = ChannelRegistry::new(
            transport.clone(),
            Arc::new(ManualScheduler::new()),
            RetryPolicy::default(),
        );
        (FanoutManager::new(registry, cap), transport)
    }

    #[test]
    fn activate_is_idempotent() {
        let (manager, transport) = manager(10);
        let interest = EntityInterest::of(&[EntityKind::Deposits]);

        let first = manager.activate("0xAA", &interest);
        assert!(first.is_some());
        assert!(manager.activate("0xaa", &interest).is_none());

        assert_eq!(manager.active_count(), 1);
        assert_eq!(transport.opened_topics().len(), 1);
    }

    #[test]
    fn deactivate_is_idempotent() {
        let (manager, _) = manager(10);
        let interest = EntityInterest::of(&[EntityKind::Deposits]);

        manager.activate("0xaa", &interest);
        manager.deactivate("0xaa");
        manager.deactivate("0xaa");

        assert!(!manager.is_active("0xaa"));
        assert_eq!(manager.active_count(), 0);
    }

    #[test]
    fn interest_controls_opened_channels() {
        let (manager, transport) = manager(10);
        let interest = EntityInterest::of(&[EntityKind::Transactions, EntityKind::Whitelist]);

        manager.activate("0xaa", &interest);

        let topics = transport.opened_topics();
        assert_eq!(topics.len(), 2);
        assert!(topics.contains(&"transactions:0xaa".to_string()));
        assert!(topics.contains(&"whitelist:0xaa".to_string()));
    }

    #[test]
    fn empty_interest_is_a_noop() {
        let (manager, transport) = manager(10);
        assert!(manager.activate("0xaa", &EntityInterest::of(&[])).is_none());
        assert_eq!(transport.opened_topics().len(), 0);
        assert!(!manager.is_active("0xaa"));
    }

    #[test]
    fn cleanup_drains_everything() {
        let (manager, transport) = manager(10);
        let interest = EntityInterest::all();

        let h1 = manager.activate("0xaa", &interest).unwrap();
        let _h2 = manager.activate("0xbb", &interest).unwrap();
        manager.cleanup();

        assert_eq!(manager.active_count(), 0);
        assert_eq!(transport.live_channel_count(), 0);

        let drained = h1.drain();
        assert!(matches!(
            drained.last(),
            Some(SyncEvent::Dropped {
                reason: DropReason::Shutdown
            })
        ));
    }
}
