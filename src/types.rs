//! Core types for the subscription layer.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::entities::EntityKind;

/// A vault wallet address, normalized to lowercase.
///
/// Addresses arrive from callers in mixed case; the indexer stores and
/// filters them lowercased, so normalization happens once at the
/// boundary and every map key and row filter uses the normalized form.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WalletAddress(String);

impl WalletAddress {
    pub fn new(addr: impl AsRef<str>) -> Self {
        WalletAddress(addr.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WalletAddress({})", self.0)
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WalletAddress {
    fn from(s: &str) -> Self {
        WalletAddress::new(s)
    }
}

/// Identity of one realtime channel: an entity type, partitioned by
/// wallet address. `wallet: None` is the single global channel (indexer
/// state is process-wide, not per wallet).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ChannelKey {
    pub entity: EntityKind,
    pub wallet: Option<WalletAddress>,
}

impl ChannelKey {
    pub fn wallet(entity: EntityKind, wallet: WalletAddress) -> Self {
        ChannelKey {
            entity,
            wallet: Some(wallet),
        }
    }

    pub fn global(entity: EntityKind) -> Self {
        ChannelKey {
            entity,
            wallet: None,
        }
    }

    /// Transport topic name for this channel, e.g. `"deposits:0xabc"`.
    pub fn topic(&self) -> String {
        match &self.wallet {
            Some(w) => format!("{}:{}", self.entity.name(), w),
            None => format!("{}:global", self.entity.name()),
        }
    }
}

impl fmt::Debug for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelKey({})", self.topic())
    }
}

/// Which change action a raw event represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Insert => "INSERT",
            ChangeAction::Update => "UPDATE",
            ChangeAction::Delete => "DELETE",
        }
    }
}

/// Connection-status transitions reported by the transport for one
/// channel, in the order the transport emits them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportStatus {
    Subscribed,
    ChannelError,
    TimedOut,
    Closed,
}

/// Observable lifecycle state of a registered channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Opened, waiting for the first `Subscribed` transition.
    Subscribing,
    /// Live and delivering events.
    Active,
    /// Failed; a backoff timer is pending or a resubscribe is in flight.
    Reconnecting,
}

/// One raw change event as delivered by the transport.
///
/// `record` is the new row image (empty for deletes on some backends);
/// `old_record` is the previous image, present for updates and deletes.
#[derive(Clone, Debug)]
pub struct RawChange {
    pub table: String,
    pub action: ChangeAction,
    pub record: serde_json::Value,
    pub old_record: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_address_normalizes_case() {
        let a = WalletAddress::new("0xAbCdEf");
        let b = WalletAddress::new(" 0xabcdef ");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "0xabcdef");
    }

    #[test]
    fn channel_key_topics() {
        let k = ChannelKey::wallet(EntityKind::Deposits, WalletAddress::new("0xFF"));
        assert_eq!(k.topic(), "deposits:0xff");

        let g = ChannelKey::global(EntityKind::IndexerState);
        assert_eq!(g.topic(), "indexer_state:global");
    }
}
