use crate::codec::{DecodeError, FrameError};
use crate::net::tcp::ConnectionId;
use std::io;
use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
    #[error("Bind Error on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("Accept Error: {0}")]
    Accept(#[source] io::Error),
    #[error("Connect Error: {0}")]
    Connect(#[source] io::Error),
    #[error("Protocol Error: {0}")]
    Protocol(#[from] FrameError),
    #[error("Decoder Error: {0}")]
    Decoder(#[from] DecodeError),
    #[error("Frame of {len} bytes can never fit an outbound buffer of {capacity} bytes")]
    FrameTooLarge { len: usize, capacity: usize },
    #[error("Max connections reached, rejecting {0}")]
    MaxConnectionsReached(SocketAddr),
    #[error("Unknown connection {0:?}")]
    UnknownConnection(ConnectionId),
    #[error("Configuration Error: {0}")]
    Configuration(String),
    #[error("EventLoop is gone")]
    EventLoopGone,
}

/// Lifecycle notifications delivered to the dispatch policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    Listening(SocketAddr),
    ConnectionEstablished(ConnectionId, SocketAddr),
    ConnectionClosed(ConnectionId),
}
