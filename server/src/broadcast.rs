use std::collections::HashMap;

use system::{Action, ConnectionId};

use crate::connection::ConnectionEvent;

pub type ConnectionTx = tokio::sync::mpsc::UnboundedSender<ConnectionEvent>;

/// Outbound queues of every live connection, keyed by connection id.
///
/// Queues are unbounded so the session task never waits on a slow peer; a
/// send only fails once the connection's receiving side is gone.
#[derive(Default)]
pub struct BroadcastHub {
    connection_txs: HashMap<ConnectionId, ConnectionTx>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, connection_id: ConnectionId, tx: ConnectionTx) {
        self.connection_txs.insert(connection_id, tx);
    }

    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<ConnectionTx> {
        self.connection_txs.remove(connection_id)
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.connection_txs.contains_key(connection_id)
    }

    pub fn len(&self) -> usize {
        self.connection_txs.len()
    }

    /// Returns false when the connection is unknown or its queue is closed.
    pub fn send(&self, to: &ConnectionId, event: ConnectionEvent) -> bool {
        match self.connection_txs.get(to) {
            Some(tx) => tx.send(event).is_ok(),
            None => {
                log::warn!("No outbound queue for connection {}", to);
                false
            }
        }
    }

    /// Delivers `action` to each recipient and returns the ones that could not
    /// be reached. One failure never stops delivery to the rest.
    pub fn broadcast(&self, recipients: &[ConnectionId], action: &Action) -> Vec<ConnectionId> {
        recipients
            .iter()
            .filter(|to| !self.send(to, ConnectionEvent::Action(action.clone())))
            .cloned()
            .collect()
    }
}
