//! Live connection table, readable from any thread.
//!
//! The reactor thread inserts an entry on accept and removes it on close.
//! Other threads get a [`RosterHandle`] and may only look.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;

use lockfree::map::Map as LockfreeMap;

use crate::net::tcp::traits::ConnectionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerInfo {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    pub connected_at: SystemTime,
}

/// Writer side, owned by the server.
pub(crate) struct Roster {
    peers: Arc<LockfreeMap<u64, PeerInfo>>,
}

impl Roster {
    pub(crate) fn new() -> Self {
        Self {
            peers: Arc::new(LockfreeMap::new()),
        }
    }

    pub(crate) fn insert(&self, id: ConnectionId, addr: SocketAddr) {
        self.peers.insert(
            id.as_u64(),
            PeerInfo {
                id,
                addr,
                connected_at: SystemTime::now(),
            },
        );
    }

    pub(crate) fn remove(&self, id: ConnectionId) {
        self.peers.remove(&id.as_u64());
    }

    pub(crate) fn handle(&self) -> RosterHandle {
        RosterHandle {
            peers: self.peers.clone(),
        }
    }
}

/// Read-only view of the connections currently open on a server.
#[derive(Clone)]
pub struct RosterHandle {
    peers: Arc<LockfreeMap<u64, PeerInfo>>,
}

impl RosterHandle {
    pub fn len(&self) -> usize {
        self.peers.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.iter().next().is_none()
    }

    pub fn get(&self, id: ConnectionId) -> Option<PeerInfo> {
        self.peers.get(&id.as_u64()).map(|entry| *entry.val())
    }

    /// Entries sorted by connection id.
    pub fn snapshot(&self) -> Vec<PeerInfo> {
        let mut peers: Vec<PeerInfo> = self.peers.iter().map(|entry| *entry.val()).collect();
        peers.sort_by_key(|peer| peer.id);
        peers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_insert_remove() {
        let roster = Roster::new();
        let handle = roster.handle();
        let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        roster.insert(ConnectionId(2), addr);
        roster.insert(ConnectionId(1), addr);
        assert_eq!(handle.len(), 2);
        let ids: Vec<_> = handle.snapshot().iter().map(|peer| peer.id).collect();
        assert_eq!(ids, vec![ConnectionId(1), ConnectionId(2)]);

        roster.remove(ConnectionId(1));
        assert!(handle.get(ConnectionId(1)).is_none());
        assert_eq!(handle.get(ConnectionId(2)).map(|peer| peer.addr), Some(addr));
    }

    #[test]
    fn test_handle_is_shared_across_threads() {
        let roster = Roster::new();
        let handle = roster.handle();
        roster.insert(ConnectionId(7), "10.0.0.1:1".parse().unwrap());

        let seen = std::thread::spawn(move || handle.len()).join().unwrap();
        assert_eq!(seen, 1);
        assert!(!roster.handle().is_empty());
    }
}
