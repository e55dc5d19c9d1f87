//! Entity subscription adapters.
//!
//! Every domain entity is a declarative descriptor: which tables it
//! spans, which change actions it cares about, and how its rows parse.
//! One generic [`subscribe_entity`] primitive turns a descriptor into a
//! registered channel, so adapters stay data, not hand-written
//! near-duplicate subscribe methods.

pub mod records;

pub use records::{
    Confirmation, DailyLimitState, Deposit, IndexerState, RecoveryApproval, RecoveryConfig,
    RecoveryGuardian, TokenTransfer, Transaction, WalletModule, WalletOwner, WhitelistEntry,
};

use crate::channels::registry::{ChannelBinding, ChannelHooks, ChannelRegistry};
use crate::error::{Result, SyncError};
use crate::fanout::SyncEvent;
use crate::transport::ChangeSpec;
use crate::types::{ChangeAction, ChannelKey, RawChange, WalletAddress};
use crossbeam_channel::Sender;
use records::parse_record;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

/// Column carrying the owning wallet on every partitioned table.
const WALLET_COLUMN: &str = "wallet_address";

/// One physical table an entity listens on.
#[derive(Clone, Copy, Debug)]
pub struct TableBinding {
    pub table: &'static str,
    pub actions: &'static [ChangeAction],
    /// Column for the server-side wallet filter; `None` on global tables.
    pub filter_column: Option<&'static str>,
}

/// The domain entities mirrored by the indexer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Transactions,
    Confirmations,
    Deposits,
    DailyLimit,
    Whitelist,
    Modules,
    Owners,
    Recovery,
    RecoveryApprovals,
    TokenTransfers,
    /// Process-wide indexer health; keyed singly, never per wallet.
    IndexerState,
}

use crate::types::ChangeAction::{Delete, Insert, Update};

impl EntityKind {
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Transactions => "transactions",
            EntityKind::Confirmations => "confirmations",
            EntityKind::Deposits => "deposits",
            EntityKind::DailyLimit => "daily_limit",
            EntityKind::Whitelist => "whitelist",
            EntityKind::Modules => "modules",
            EntityKind::Owners => "owners",
            EntityKind::Recovery => "recovery",
            EntityKind::RecoveryApprovals => "recovery_approvals",
            EntityKind::TokenTransfers => "token_transfers",
            EntityKind::IndexerState => "indexer_state",
        }
    }

    /// Every entity partitioned by wallet address.
    pub fn wallet_scoped() -> &'static [EntityKind] {
        &[
            EntityKind::Transactions,
            EntityKind::Confirmations,
            EntityKind::Deposits,
            EntityKind::DailyLimit,
            EntityKind::Whitelist,
            EntityKind::Modules,
            EntityKind::Owners,
            EntityKind::Recovery,
            EntityKind::RecoveryApprovals,
            EntityKind::TokenTransfers,
        ]
    }

    /// Tables, actions, and filters this entity listens on. Recovery
    /// spans two tables fanned into the same stream.
    pub fn bindings(&self) -> &'static [TableBinding] {
        match self {
            EntityKind::Transactions => &[TableBinding {
                table: "transactions",
                actions: &[Insert, Update],
                filter_column: Some(WALLET_COLUMN),
            }],
            EntityKind::Confirmations => &[TableBinding {
                table: "confirmations",
                actions: &[Insert],
                filter_column: Some(WALLET_COLUMN),
            }],
            EntityKind::Deposits => &[TableBinding {
                table: "deposits",
                actions: &[Insert],
                filter_column: Some(WALLET_COLUMN),
            }],
            EntityKind::DailyLimit => &[TableBinding {
                table: "daily_limit_states",
                actions: &[Insert, Update],
                filter_column: Some(WALLET_COLUMN),
            }],
            EntityKind::Whitelist => &[TableBinding {
                table: "whitelist_entries",
                actions: &[Insert, Delete],
                filter_column: Some(WALLET_COLUMN),
            }],
            EntityKind::Modules => &[TableBinding {
                table: "wallet_modules",
                actions: &[Insert, Update, Delete],
                filter_column: Some(WALLET_COLUMN),
            }],
            EntityKind::Owners => &[TableBinding {
                table: "wallet_owners",
                actions: &[Insert, Delete],
                filter_column: Some(WALLET_COLUMN),
            }],
            EntityKind::Recovery => &[
                TableBinding {
                    table: "recovery_configs",
                    actions: &[Insert, Update, Delete],
                    filter_column: Some(WALLET_COLUMN),
                },
                TableBinding {
                    table: "recovery_guardians",
                    actions: &[Insert, Delete],
                    filter_column: Some(WALLET_COLUMN),
                },
            ],
            EntityKind::RecoveryApprovals => &[TableBinding {
                table: "recovery_approvals",
                actions: &[Insert],
                filter_column: Some(WALLET_COLUMN),
            }],
            EntityKind::TokenTransfers => &[TableBinding {
                table: "token_transfers",
                actions: &[Insert],
                filter_column: Some(WALLET_COLUMN),
            }],
            EntityKind::IndexerState => &[TableBinding {
                table: "indexer_state",
                actions: &[Insert, Update],
                filter_column: None,
            }],
        }
    }

    /// Parse one raw row from `table` into a typed record. The table
    /// must be one this entity declares in [`EntityKind::bindings`]; a
    /// row from anywhere else is a validation error, not a guess.
    pub fn parse(&self, table: &str, raw: &serde_json::Value) -> Result<EntityRecord> {
        match (self, table) {
            (EntityKind::Transactions, "transactions") => {
                parse_record::<Transaction>("transaction", raw).map(EntityRecord::Transaction)
            }
            (EntityKind::Confirmations, "confirmations") => {
                parse_record::<Confirmation>("confirmation", raw).map(EntityRecord::Confirmation)
            }
            (EntityKind::Deposits, "deposits") => {
                parse_record::<Deposit>("deposit", raw).map(EntityRecord::Deposit)
            }
            (EntityKind::DailyLimit, "daily_limit_states") => {
                parse_record::<DailyLimitState>("daily_limit_state", raw)
                    .map(EntityRecord::DailyLimit)
            }
            (EntityKind::Whitelist, "whitelist_entries") => {
                parse_record::<WhitelistEntry>("whitelist_entry", raw)
                    .map(EntityRecord::Whitelist)
            }
            (EntityKind::Modules, "wallet_modules") => {
                parse_record::<WalletModule>("wallet_module", raw).map(EntityRecord::Module)
            }
            (EntityKind::Owners, "wallet_owners") => {
                parse_record::<WalletOwner>("wallet_owner", raw).map(EntityRecord::Owner)
            }
            (EntityKind::Recovery, "recovery_configs") => {
                parse_record::<RecoveryConfig>("recovery_config", raw)
                    .map(EntityRecord::RecoveryConfig)
            }
            (EntityKind::Recovery, "recovery_guardians") => {
                parse_record::<RecoveryGuardian>("recovery_guardian", raw)
                    .map(EntityRecord::RecoveryGuardian)
            }
            (EntityKind::RecoveryApprovals, "recovery_approvals") => {
                parse_record::<RecoveryApproval>("recovery_approval", raw)
                    .map(EntityRecord::RecoveryApproval)
            }
            (EntityKind::TokenTransfers, "token_transfers") => {
                parse_record::<TokenTransfer>("token_transfer", raw)
                    .map(EntityRecord::TokenTransfer)
            }
            (EntityKind::IndexerState, "indexer_state") => {
                parse_record::<IndexerState>("indexer_state", raw).map(EntityRecord::IndexerState)
            }
            _ => Err(SyncError::Validation {
                entity: self.name().to_string(),
                message: format!("row from undeclared table {table}"),
            }),
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A validated record from any entity.
#[derive(Clone, Debug, PartialEq)]
pub enum EntityRecord {
    Transaction(Transaction),
    Confirmation(Confirmation),
    Deposit(Deposit),
    DailyLimit(DailyLimitState),
    Whitelist(WhitelistEntry),
    Module(WalletModule),
    Owner(WalletOwner),
    RecoveryConfig(RecoveryConfig),
    RecoveryGuardian(RecoveryGuardian),
    RecoveryApproval(RecoveryApproval),
    TokenTransfer(TokenTransfer),
    IndexerState(IndexerState),
}

/// Teardown for one entity channel. Closing cancels any pending
/// reconnect timer, removes the transport channel, and clears the
/// registry bookkeeping for the key. Safe to call more than once.
pub struct EntitySubscription {
    registry: Weak<ChannelRegistry>,
    key: ChannelKey,
}

impl EntitySubscription {
    pub fn key(&self) -> &ChannelKey {
        &self.key
    }

    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.close(&self.key);
        }
    }
}

/// Open (or reuse) the channel for one entity and wire validated
/// events into `sender`.
///
/// `wallet` is `None` only for the global indexer-state entity.
pub fn subscribe_entity(
    registry: &Arc<ChannelRegistry>,
    kind: EntityKind,
    wallet: Option<&WalletAddress>,
    sender: &Sender<SyncEvent>,
) -> EntitySubscription {
    let key = match wallet {
        Some(w) => ChannelKey::wallet(kind, w.clone()),
        None => ChannelKey::global(kind),
    };

    let mut bindings = Vec::new();
    for table in kind.bindings() {
        for &action in table.actions {
            let spec = match (table.filter_column, wallet) {
                (Some(column), Some(w)) => {
                    ChangeSpec::filtered(table.table, action, column, w.as_str())
                }
                _ => ChangeSpec::new(table.table, action),
            };
            let sender = sender.clone();
            let table_name = table.table.to_string();
            let handler: Arc<dyn Fn(RawChange) + Send + Sync> = Arc::new(move |change| {
                let event = translate_change(kind, &table_name, &change);
                let _ = sender.send(event);
            });
            bindings.push(ChannelBinding { spec, handler });
        }
    }

    let reconnect_sender = sender.clone();
    let error_sender = sender.clone();
    let hooks = ChannelHooks {
        on_reconnect: Arc::new(move || {
            let _ = reconnect_sender.send(SyncEvent::Reconnected { entity: kind });
        }),
        on_error: Arc::new(move |err: SyncError| {
            let _ = error_sender.send(SyncEvent::Error(err));
        }),
    };

    registry.open(&key, bindings, hooks);

    EntitySubscription {
        registry: Arc::downgrade(registry),
        key,
    }
}

/// Validate one raw change and shape it into a stream event. Malformed
/// payloads become errors, never data.
fn translate_change(kind: EntityKind, table: &str, change: &RawChange) -> SyncEvent {
    // Deletes carry the row in the old image; fall back to the new
    // image for backends that populate only `record`.
    let raw = match change.action {
        ChangeAction::Delete => change.old_record.as_ref().unwrap_or(&change.record),
        _ => &change.record,
    };

    match kind.parse(table, raw) {
        Ok(record) => match change.action {
            ChangeAction::Insert => SyncEvent::Inserted {
                entity: kind,
                record,
            },
            ChangeAction::Update => SyncEvent::Updated {
                entity: kind,
                record,
            },
            ChangeAction::Delete => SyncEvent::Deleted {
                entity: kind,
                record,
            },
        },
        Err(err) => SyncEvent::Error(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recovery_spans_two_tables() {
        let bindings = EntityKind::Recovery.bindings();
        let tables: Vec<_> = bindings.iter().map(|b| b.table).collect();
        assert_eq!(tables, vec!["recovery_configs", "recovery_guardians"]);
    }

    #[test]
    fn recovery_parse_dispatches_by_table() {
        let guardian = json!({
            "id": 1,
            "wallet_address": "0xaa",
            "guardian_address": "0xgg"
        });
        let parsed = EntityKind::Recovery
            .parse("recovery_guardians", &guardian)
            .unwrap();
        assert!(matches!(parsed, EntityRecord::RecoveryGuardian(_)));

        let config = json!({
            "wallet_address": "0xaa",
            "threshold": 2,
            "delay_seconds": 86400,
            "enabled": true
        });
        let parsed = EntityKind::Recovery.parse("recovery_configs", &config).unwrap();
        assert!(matches!(parsed, EntityRecord::RecoveryConfig(_)));
    }

    #[test]
    fn parse_rejects_rows_from_undeclared_tables() {
        let row = json!({ "id": 1, "wallet_address": "0xaa" });

        let err = EntityKind::Deposits.parse("transactions", &row).unwrap_err();
        match err {
            SyncError::Validation { entity, message } => {
                assert_eq!(entity, "deposits");
                assert!(message.contains("transactions"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = EntityKind::Recovery.parse("recovery_approvals", &row).unwrap_err();
        assert!(matches!(err, SyncError::Validation { .. }));
    }

    #[test]
    fn only_indexer_state_is_global() {
        for kind in EntityKind::wallet_scoped() {
            assert!(kind.bindings().iter().all(|b| b.filter_column.is_some()));
        }
        assert!(EntityKind::IndexerState.bindings()[0].filter_column.is_none());
    }

    #[test]
    fn malformed_delete_surfaces_as_error() {
        let change = RawChange {
            table: "deposits".to_string(),
            action: ChangeAction::Delete,
            record: json!({}),
            old_record: Some(json!({ "id": 1 })),
        };
        let event = translate_change(EntityKind::Deposits, "deposits", &change);
        assert!(matches!(event, SyncEvent::Error(SyncError::Validation { .. })));
    }
}
