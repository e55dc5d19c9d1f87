//! Realtime channel ownership and repair.
//!
//! - [`registry`]: one transport channel per (entity, wallet) key, with
//!   all reconnect bookkeeping instance-owned.
//! - [`reconnect`]: the exponential-backoff retry policy.

pub mod reconnect;
pub mod registry;

pub use reconnect::RetryPolicy;
pub use registry::{ChannelBinding, ChannelHooks, ChannelRegistry};
