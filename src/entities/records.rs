//! Typed domain records mirrored from the indexer's relational store.
//!
//! Deserialization is the schema boundary: a raw payload either
//! round-trips into one of these types or is rejected with a
//! [`SyncError::Validation`] naming the entity. Rejected payloads are
//! never delivered as data.

use crate::error::{Result, SyncError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Safe-parse a raw row into a typed record; never panics.
pub fn parse_record<T: DeserializeOwned>(entity: &str, raw: &serde_json::Value) -> Result<T> {
    serde_json::from_value(raw.clone()).map_err(|e| SyncError::validation(entity, e))
}

/// A queued or executed multisig transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub wallet_address: String,
    pub destination: String,
    /// Wei amount as a decimal string (exceeds u64).
    pub value: String,
    #[serde(default)]
    pub data: Option<String>,
    pub nonce: i64,
    pub executed: bool,
    #[serde(default)]
    pub executed_tx_hash: Option<String>,
    pub created_at: String,
}

/// An owner's confirmation of a queued transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Confirmation {
    pub id: i64,
    pub wallet_address: String,
    pub transaction_id: i64,
    pub owner_address: String,
    pub created_at: String,
}

/// A native-token deposit into the vault.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
    pub id: i64,
    pub wallet_address: String,
    pub sender_address: String,
    pub amount: String,
    pub tx_hash: String,
    pub created_at: String,
}

/// Rolling daily-limit accounting for a vault.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyLimitState {
    pub wallet_address: String,
    pub daily_limit: String,
    pub spent_today: String,
    pub last_reset_day: i64,
}

/// A whitelisted destination address.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    pub id: i64,
    pub wallet_address: String,
    pub address: String,
    #[serde(default)]
    pub label: Option<String>,
    pub created_at: String,
}

/// A module enabled on the vault contract.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WalletModule {
    pub id: i64,
    pub wallet_address: String,
    pub module_address: String,
    pub enabled: bool,
}

/// A vault owner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WalletOwner {
    pub id: i64,
    pub wallet_address: String,
    pub owner_address: String,
    pub added_at: String,
}

/// Social-recovery configuration for a vault.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    pub wallet_address: String,
    pub threshold: i64,
    pub delay_seconds: i64,
    pub enabled: bool,
}

/// A guardian registered for social recovery.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecoveryGuardian {
    pub id: i64,
    pub wallet_address: String,
    pub guardian_address: String,
}

/// A guardian's approval of an in-flight recovery.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecoveryApproval {
    pub id: i64,
    pub wallet_address: String,
    pub recovery_nonce: i64,
    pub guardian_address: String,
    pub approved_at: String,
}

/// An ERC-20 transfer touching the vault.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenTransfer {
    pub id: i64,
    pub wallet_address: String,
    pub token_address: String,
    pub sender_address: String,
    pub recipient_address: String,
    pub amount: String,
    pub tx_hash: String,
    pub created_at: String,
}

/// Process-wide indexer health, not partitioned by wallet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexerState {
    pub chain_id: i64,
    pub last_processed_block: i64,
    pub healthy: bool,
    pub updated_at: String,
}
