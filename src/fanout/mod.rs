//! Wallet subscription fan-out.
//!
//! A caller activates a wallet with an [`EntityInterest`] and gets back
//! a [`WalletHandle`] streaming validated [`SyncEvent`]s for every
//! entity it asked for. The manager bounds the number of concurrently
//! active wallets, evicting the oldest-activated wallet (pure FIFO)
//! when the cap is exceeded.
//!
//! # Example
//!
//! ```ignore
//! let handle = manager.activate("0xAbc...", &EntityInterest::all()).unwrap();
//!
//! loop {
//!     match handle.recv() {
//!         Ok(SyncEvent::Inserted { entity, record }) => refresh(entity, record),
//!         Ok(SyncEvent::Reconnected { entity }) => refetch(entity),
//!         Ok(SyncEvent::Dropped { .. }) => break,
//!         Ok(_) => {}
//!         Err(_) => break,
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::{FanoutManager, DEFAULT_MAX_ACTIVE_WALLETS};
pub use types::{DropReason, EntityInterest, SyncEvent, WalletHandle};
