//! Event and handle types for wallet subscriptions.

use crate::entities::{EntityKind, EntityRecord};
use crate::error::SyncError;
use crate::types::WalletAddress;

/// Events delivered on a wallet's subscription stream.
#[derive(Clone, Debug)]
pub enum SyncEvent {
    /// A validated row was inserted.
    Inserted {
        entity: EntityKind,
        record: EntityRecord,
    },

    /// A validated row was updated.
    Updated {
        entity: EntityKind,
        record: EntityRecord,
    },

    /// A validated row was deleted (record is the old row image).
    Deleted {
        entity: EntityKind,
        record: EntityRecord,
    },

    /// An entity channel recovered after an outage; re-fetch state that
    /// may have changed while it was down. Fires exactly once per
    /// outage-then-recovery cycle, never on the first subscribe.
    Reconnected { entity: EntityKind },

    /// A terminal reconnect failure or a payload validation failure.
    Error(SyncError),

    /// The subscription ended. Sent exactly once, immediately before
    /// teardown.
    Dropped { reason: DropReason },
}

/// Why a wallet subscription ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// Evicted under capacity pressure (FIFO-oldest wallet).
    Evicted,
    /// Explicitly deactivated.
    Unsubscribed,
    /// Bulk cleanup (disconnect/logout).
    Shutdown,
}

/// Which entities a caller wants for a wallet. Only listed entities
/// open channels; a dashboard panel that only shows transactions does
/// not open deposit or whitelist channels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityInterest {
    entities: Vec<EntityKind>,
}

impl EntityInterest {
    /// Every wallet-scoped entity (the global indexer-state entity is
    /// mounted separately, never per wallet).
    pub fn all() -> Self {
        EntityInterest {
            entities: EntityKind::wallet_scoped().to_vec(),
        }
    }

    pub fn of(entities: &[EntityKind]) -> Self {
        let mut deduped = Vec::new();
        for &kind in entities {
            if kind != EntityKind::IndexerState && !deduped.contains(&kind) {
                deduped.push(kind);
            }
        }
        EntityInterest { entities: deduped }
    }

    pub fn entities(&self) -> &[EntityKind] {
        &self.entities
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Handle to one wallet's active subscription.
///
/// Dropping the handle does not deactivate the wallet; call
/// `deactivate` on the manager for that.
pub struct WalletHandle {
    pub wallet: WalletAddress,
    /// Stream of validated events for this wallet.
    pub receiver: crossbeam_channel::Receiver<SyncEvent>,
}

impl WalletHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<SyncEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<SyncEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<SyncEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently buffered.
    pub fn drain(&self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interest_dedupes_and_excludes_global() {
        let interest = EntityInterest::of(&[
            EntityKind::Deposits,
            EntityKind::Deposits,
            EntityKind::IndexerState,
            EntityKind::Transactions,
        ]);
        assert_eq!(
            interest.entities(),
            &[EntityKind::Deposits, EntityKind::Transactions]
        );
    }

    #[test]
    fn all_covers_every_wallet_scoped_entity() {
        let interest = EntityInterest::all();
        assert!(!interest.entities().contains(&EntityKind::IndexerState));
        assert_eq!(interest.entities().len(), EntityKind::wallet_scoped().len());
    }
}
