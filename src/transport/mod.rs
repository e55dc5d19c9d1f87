//! Boundary with the realtime change-feed transport.
//!
//! The transport is an injected dependency: anything that can open a
//! named channel, attach per-table filtered listeners, report status
//! transitions through a single subscribe callback, and remove the
//! channel again. The registry owns the handles; nothing above it
//! touches the transport directly.

pub mod mock;

use crate::types::{RawChange, TransportStatus};
use std::sync::Arc;

/// Listener for raw change events on one table/action binding.
pub type ChangeHandler = Arc<dyn Fn(RawChange) + Send + Sync>;

/// Listener for connection-status transitions of one channel.
pub type StatusHandler = Arc<dyn Fn(TransportStatus) + Send + Sync>;

/// One filtered listener registration: table, action, and an optional
/// server-side row filter in `"<column>=eq.<value>"` form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeSpec {
    pub table: String,
    pub action: crate::types::ChangeAction,
    pub filter: Option<String>,
}

impl ChangeSpec {
    pub fn new(table: &str, action: crate::types::ChangeAction) -> Self {
        ChangeSpec {
            table: table.to_string(),
            action,
            filter: None,
        }
    }

    /// Restrict rows to one (lowercased) wallet address.
    pub fn filtered(table: &str, action: crate::types::ChangeAction, column: &str, value: &str) -> Self {
        ChangeSpec {
            table: table.to_string(),
            action,
            filter: Some(format!("{}=eq.{}", column, value.to_lowercase())),
        }
    }
}

/// One named channel on the transport.
///
/// Listener registration happens before `subscribe`; after the owning
/// registry calls [`ChannelTransport::remove_channel`], no further
/// events may fire on this handle.
pub trait TransportChannel: Send + Sync {
    /// The channel's topic name.
    fn topic(&self) -> String;

    /// Register a filtered change listener. Multiple listeners per
    /// channel are allowed.
    fn on_change(&self, spec: ChangeSpec, handler: ChangeHandler);

    /// Activate the channel. `on_status` receives every status
    /// transition over the channel's lifetime.
    fn subscribe(&self, on_status: StatusHandler);
}

/// The process-wide transport connection, shared by all channels.
pub trait ChannelTransport: Send + Sync {
    /// Create (or re-create after removal) a named channel.
    fn open_channel(&self, topic: &str) -> Arc<dyn TransportChannel>;

    /// Release the channel's resources. Events on the handle must not
    /// fire afterwards. Safe to call for an already-removed handle.
    fn remove_channel(&self, channel: &Arc<dyn TransportChannel>);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChangeAction;

    #[test]
    fn filter_values_are_lowercased() {
        let spec = ChangeSpec::filtered("deposits", ChangeAction::Insert, "wallet_address", "0xABC");
        assert_eq!(spec.filter.as_deref(), Some("wallet_address=eq.0xabc"));
    }
}
