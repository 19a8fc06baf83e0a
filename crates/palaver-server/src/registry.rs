//! Connection registry — the server's directory of live connections.
//!
//! This is the only mutable state shared across workers and the router.
//! Mutations are serialized through one lock, reads share it, and the lock is
//! never held across I/O. Entries hand out opaque [`PeerId`]s so a stale
//! unregister can never evict a newer connection that reused the name.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use tokio::sync::mpsc;

use palaver_core::Message;

/// Opaque identity of one registered connection. Never reused.
pub type PeerId = u64;

/// A registered connection as the router sees it: a name, an identity, and
/// the sending half of the worker's outbound queue. The worker owns the
/// socket; nothing here does I/O.
#[derive(Debug, Clone)]
pub struct Peer {
    pub id: PeerId,
    pub username: String,
    outbound: mpsc::UnboundedSender<Message>,
}

impl Peer {
    /// Queue a message for delivery to this peer's client.
    ///
    /// Fails only when the worker is already tearing down; the caller logs
    /// and moves on — the disconnect announcement is the worker's job.
    pub fn deliver(&self, message: Message) -> Result<(), DeliverError> {
        self.outbound.send(message).map_err(|_| DeliverError)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("peer worker has shut down")]
pub struct DeliverError;

/// Errors rejecting a registration. Both are login-time refusals sent back
/// to the client as typed replies; neither affects existing connections.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("server is full ({0} connections)")]
    ServerFull(usize),

    #[error("username \"{0}\" is already taken")]
    UsernameTaken(String),
}

/// Concurrency-safe username → connection directory with a configurable
/// capacity bound.
pub struct ConnectionRegistry {
    peers: RwLock<HashMap<String, Peer>>,
    capacity: usize,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
            capacity,
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new connection under `username`.
    ///
    /// Capacity and uniqueness are checked under the same lock acquisition,
    /// so two racing logins can never both succeed for one name or for the
    /// last free slot.
    pub fn register(
        &self,
        username: &str,
        outbound: mpsc::UnboundedSender<Message>,
    ) -> Result<Peer, RegistryError> {
        let mut peers = self.peers.write().expect("registry lock poisoned");

        if peers.len() >= self.capacity {
            return Err(RegistryError::ServerFull(self.capacity));
        }
        if peers.contains_key(username) {
            return Err(RegistryError::UsernameTaken(username.to_owned()));
        }

        let peer = Peer {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            username: username.to_owned(),
            outbound,
        };
        peers.insert(username.to_owned(), peer.clone());
        Ok(peer)
    }

    /// Case-sensitive exact-match lookup.
    pub fn find(&self, username: &str) -> Option<Peer> {
        self.peers
            .read()
            .expect("registry lock poisoned")
            .get(username)
            .cloned()
    }

    /// Release a registration. Idempotent, and identity-checked: if the name
    /// has since been re-registered by a newer connection, that entry stays.
    pub fn unregister(&self, peer: &Peer) {
        let mut peers = self.peers.write().expect("registry lock poisoned");
        if peers.get(&peer.username).is_some_and(|p| p.id == peer.id) {
            peers.remove(&peer.username);
        }
    }

    /// All currently registered peers, for broadcast fan-out.
    pub fn snapshot(&self) -> Vec<Peer> {
        self.peers
            .read()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// All registered usernames, unordered.
    pub fn usernames(&self) -> Vec<String> {
        self.peers
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
