//! Registry of live connections grouped by session.
//!
//! Process-wide lifetime, explicitly constructed and injected (no global).
//! Broadcasting enqueues onto each target's bounded outbound queue with
//! per-recipient failure isolation: a full or closed queue on one recipient
//! never prevents delivery to the others.

use crate::ws::connection::IdentityState;
use crate::ws::message::Envelope;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

/// Pool-side view of one connection. The connection owns its transport and
/// queue receiver; the pool holds the sender and the teardown token.
#[derive(Clone)]
pub struct ConnectionHandle {
    pub id: String,
    pub session_id: String,
    pub identity: Arc<std::sync::RwLock<IdentityState>>,
    outbound: mpsc::Sender<Envelope>,
    cancel: CancellationToken,
}

impl ConnectionHandle {
    pub fn new(
        id: String,
        session_id: String,
        identity: Arc<std::sync::RwLock<IdentityState>>,
        outbound: mpsc::Sender<Envelope>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            session_id,
            identity,
            outbound,
            cancel,
        }
    }

    /// Enqueue one envelope without blocking. A full queue means the peer has
    /// stalled: the connection is torn down rather than backpressuring the
    /// producer.
    fn deliver(&self, envelope: Envelope) {
        match self.outbound.try_send(envelope) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(connection_id = %self.id, "outbound queue full, dropping connection");
                self.cancel.cancel();
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(connection_id = %self.id, "outbound queue closed, message dropped");
            }
        }
    }
}

#[derive(Default)]
struct PoolInner {
    by_id: HashMap<String, ConnectionHandle>,
    by_session: HashMap<String, HashSet<String>>,
}

/// Connection registry with session-scoped broadcast primitives.
#[derive(Default)]
pub struct ConnectionPool {
    inner: RwLock<PoolInner>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, handle: ConnectionHandle) {
        let mut inner = self.inner.write().await;
        inner
            .by_session
            .entry(handle.session_id.clone())
            .or_default()
            .insert(handle.id.clone());
        tracing::info!(
            connection_id = %handle.id,
            session_id = %handle.session_id,
            "connection registered"
        );
        inner.by_id.insert(handle.id.clone(), handle);
    }

    /// Remove a connection. Unregistering an absent id is a no-op.
    pub async fn unregister(&self, connection_id: &str) -> Option<ConnectionHandle> {
        let mut inner = self.inner.write().await;
        let handle = inner.by_id.remove(connection_id)?;
        if let Some(ids) = inner.by_session.get_mut(&handle.session_id) {
            ids.remove(connection_id);
            if ids.is_empty() {
                inner.by_session.remove(&handle.session_id);
            }
        }
        tracing::info!(connection_id, session_id = %handle.session_id, "connection unregistered");
        Some(handle)
    }

    /// Number of live connections in a session.
    pub async fn session_size(&self, session_id: &str) -> usize {
        let inner = self.inner.read().await;
        inner.by_session.get(session_id).map(|s| s.len()).unwrap_or(0)
    }

    /// Send to a single connection by id.
    pub async fn send_to_connection(&self, connection_id: &str, envelope: Envelope) {
        let inner = self.inner.read().await;
        if let Some(handle) = inner.by_id.get(connection_id) {
            handle.deliver(envelope);
        }
    }

    /// Send to every connection in a session.
    pub async fn broadcast_to_session(&self, session_id: &str, envelope: Envelope) {
        self.broadcast_filtered(session_id, None, envelope).await;
    }

    /// Send to every connection in a session except one.
    pub async fn broadcast_to_session_except(
        &self,
        session_id: &str,
        excluded_id: &str,
        envelope: Envelope,
    ) {
        self.broadcast_filtered(session_id, Some(excluded_id), envelope)
            .await;
    }

    /// Send to a single connection, but only if it belongs to the session.
    /// Used for progress updates so only the requester sees in-flight phases.
    pub async fn send_to_session_member(
        &self,
        session_id: &str,
        connection_id: &str,
        envelope: Envelope,
    ) {
        let inner = self.inner.read().await;
        let member = inner
            .by_session
            .get(session_id)
            .map(|ids| ids.contains(connection_id))
            .unwrap_or(false);
        if !member {
            return;
        }
        if let Some(handle) = inner.by_id.get(connection_id) {
            handle.deliver(envelope);
        }
    }

    async fn broadcast_filtered(
        &self,
        session_id: &str,
        excluded_id: Option<&str>,
        envelope: Envelope,
    ) {
        let inner = self.inner.read().await;
        let Some(ids) = inner.by_session.get(session_id) else {
            return;
        };
        for id in ids {
            if excluded_id == Some(id.as_str()) {
                continue;
            }
            if let Some(handle) = inner.by_id.get(id) {
                handle.deliver(envelope.clone());
            }
        }
    }
}
