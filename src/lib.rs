//! # Vaultfeed
//!
//! Bounded, self-healing change-feed subscriptions for a multisig
//! vault dashboard, layered over an indexer that mirrors on-chain
//! state into a relational store.
//!
//! ## Core Concepts
//!
//! - **Channels**: one filtered change stream per (entity, wallet),
//!   owned by the registry, repaired with exponential backoff
//! - **Entity adapters**: declarative table descriptors turning raw
//!   payloads into typed, validated records
//! - **Fan-out**: per-wallet activation with a FIFO-evicting cap on
//!   concurrently active wallets
//! - **Catch-up**: a `Reconnected` event after every outage so
//!   consumers can re-fetch state they may have missed
//!
//! ## Example
//!
//! ```ignore
//! use vaultfeed::{EntityInterest, SyncEvent, SyncService};
//!
//! let service = SyncService::with_defaults(transport);
//! let handle = service.activate("0xAbc...", &EntityInterest::all()).unwrap();
//!
//! match handle.recv() {
//!     Ok(SyncEvent::Inserted { entity, record }) => { /* invalidate cache */ }
//!     Ok(SyncEvent::Reconnected { entity }) => { /* re-fetch entity */ }
//!     _ => {}
//! }
//! ```

pub mod channels;
pub mod entities;
pub mod error;
pub mod fanout;
pub mod scheduler;
pub mod service;
pub mod transport;
pub mod types;

// Re-exports
pub use channels::{ChannelRegistry, RetryPolicy};
pub use entities::{EntityKind, EntityRecord};
pub use error::{Result, SyncError};
pub use fanout::{
    DropReason, EntityInterest, FanoutManager, SyncEvent, WalletHandle, DEFAULT_MAX_ACTIVE_WALLETS,
};
pub use scheduler::{ManualScheduler, ReconnectScheduler, ThreadScheduler, TimerHandle};
pub use service::{GlobalStateHandle, SyncConfig, SyncService};
pub use transport::{ChangeSpec, ChannelTransport, TransportChannel};
pub use types::{ChangeAction, ChannelKey, ChannelStatus, RawChange, TransportStatus, WalletAddress};
