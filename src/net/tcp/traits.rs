use crate::codec::{Encode, Framed};
use crate::net::errors::NetworkEvent;
use mio::Token;

/// Unique identifier for connections.
///
/// Ids are assigned from a counter when a connection is accepted and never
/// reused during the server's lifetime. The id doubles as the mio token of
/// the connection's socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        ConnectionId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn token(&self) -> Token {
        Token(self.0 as usize)
    }

    pub fn from_token(token: Token) -> Self {
        ConnectionId(token.0 as u64)
    }
}

/// The connections alive at the moment a message is dispatched, in id order.
#[derive(Debug, Clone, Copy)]
pub struct Peers<'a> {
    ids: &'a [ConnectionId],
}

impl<'a> Peers<'a> {
    pub fn new(ids: &'a [ConnectionId]) -> Self {
        Self { ids }
    }

    pub fn iter(&self) -> impl Iterator<Item = ConnectionId> + 'a {
        let ids = self.ids;
        ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.ids.contains(&id)
    }
}

/// Application hook run for every fully decoded inbound message.
///
/// This is the only piece that changes between server variants: it decides
/// what the wire messages are and where replies go. It runs on the reactor
/// thread and must not block.
pub trait DispatchPolicy: 'static {
    type Inbound: Framed + Clone;
    type Outbound: Encode + Clone;

    /// Returns `(target, message)` pairs to enqueue. Targets that are no
    /// longer connected are skipped.
    fn on_message(
        &mut self,
        source: ConnectionId,
        message: Self::Inbound,
        peers: Peers<'_>,
    ) -> Vec<(ConnectionId, Self::Outbound)>;

    /// Called for connection lifecycle changes.
    fn on_event(&mut self, event: &NetworkEvent) {
        let _ = event;
    }
}

/// Log levels for network events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Logger trait for network events
///
/// The engine reports everything it swallows (closed connections, rejected
/// frames, refused accepts) through this trait.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

/// Default no-op logger that discards all messages
#[derive(Debug, Default, Clone)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn log(&self, _level: LogLevel, _message: &str) {}
}

/// Forwards to the `tracing` macros under the `mill_frame` target.
#[derive(Debug, Default, Clone)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(target: "mill_frame", "{message}"),
            LogLevel::Info => tracing::info!(target: "mill_frame", "{message}"),
            LogLevel::Warn => tracing::warn!(target: "mill_frame", "{message}"),
            LogLevel::Error => tracing::error!(target: "mill_frame", "{message}"),
        }
    }
}
