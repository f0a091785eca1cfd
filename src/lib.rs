//! # Mill-Frame
//! A single-threaded, readiness-driven connection engine for length-prefixed
//! message protocols, built on top of [`mio`].
//!
//! One thread blocks in the OS poller, accepts connections, reads whatever
//! bytes are available, decodes them into messages with resumable decoders and
//! hands each message to a [`DispatchPolicy`](net::tcp::DispatchPolicy). The
//! policy decides who receives what; the engine takes care of buffering,
//! back-pressure and readiness interest.
//! ## Features
//! - **Resumable decoders**: frames may arrive split across any number of reads
//! - **Composable codecs**: integers, length-prefixed strings, tuples and custom
//!   messages via [`Then`](codec::Then) and [`Map`](codec::Map)
//! - **Bounded memory**: declared lengths are checked before allocating, buffers
//!   have a fixed capacity
//! - **Whole-frame back-pressure**: outbound frames wait in a queue until they
//!   fit the write buffer
//! - **Cross-thread control**: send, broadcast, close and shutdown through a
//!   [`ServerHandle`](net::tcp::ServerHandle)
//! ## Architecture Overview
//! ```text
//! ┌─────────────┐    ┌──────────────┐    ┌─────────────┐
//! │ TcpServer   │───▶│   Reactor    │───▶│ PollHandle  │
//! └─────────────┘    └──────────────┘    └─────────────┘
//!        │                    │ Readiness
//!        ▼                    ▼
//! ┌─────────────┐    ┌──────────────┐    ┌─────────────┐
//! │ Connections │───▶│   Decoder    │───▶│   Policy    │
//! └─────────────┘    └──────────────┘    └─────────────┘
//!        ▲                                      │
//!        └──────────── enqueue replies ◀────────┘
//! ```
//! ## Quick Start
//!
//! ```rust,no_run
//! use mill_frame::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::builder()
//!         .address("127.0.0.1:7777".parse()?)
//!         .build();
//!
//!     // Every chat message is relayed to all other connections.
//!     let mut server = TcpServer::bind(config, Broadcast::<Message>::new(false))?;
//!     println!("Server listening on {}", server.local_addr());
//!
//!     // Blocks until a handle shuts the server down.
//!     server.run()?;
//!     Ok(())
//! }
//! ```
//!
//! Writing a policy only takes the message types and a routing function:
//!
//! ```rust
//! use mill_frame::prelude::*;
//!
//! struct Upper;
//!
//! impl DispatchPolicy for Upper {
//!     type Inbound = String;
//!     type Outbound = String;
//!
//!     fn on_message(
//!         &mut self,
//!         source: ConnectionId,
//!         message: String,
//!         _peers: Peers<'_>,
//!     ) -> Vec<(ConnectionId, String)> {
//!         vec![(source, message.to_uppercase())]
//!     }
//! }
//! ```
//!
//! - [`buffer`]: fixed-capacity byte buffer with a borrowed readable mode
//! - [`codec`]: decoders, encoders and the wire types
//! - [`reactor`]: the event loop and its shutdown handle
//! - [`poll`]: the OS poller and waker
//! - [`net`]: TCP server, client, connection context and policies
//! - [`error`]: error types and result handling

pub mod buffer;
pub mod cli;
pub mod codec;
pub mod error;
pub mod event;
pub mod handler;
pub mod net;
pub mod poll;
pub mod reactor;

pub use handler::EventHandler;

/// A convenient prelude module that re-exports commonly used types and traits.
///
/// ```rust
/// use mill_frame::prelude::*;
/// ```
///
/// This brings into scope:
/// - [`TcpServer`](crate::net::tcp::TcpServer), [`TcpClient`](crate::net::tcp::client::TcpClient)
///   and their configs and handles
/// - [`DispatchPolicy`](crate::net::tcp::DispatchPolicy) and the stock policies
/// - the codec traits and [`Message`](crate::codec::Message)
pub mod prelude {
    pub use crate::buffer::FrameBuffer;
    pub use crate::codec::{
        DecodeStatus, Decoder, Encode, FrameLimits, Framed, Message,
    };
    pub use crate::error::{NetworkError, Result};
    pub use crate::handler::EventHandler;
    pub use crate::net::errors::NetworkEvent;
    pub use crate::net::tcp::client::{ClientHandle, TcpClient};
    pub use crate::net::tcp::config::{ClientConfig, ServerConfig, ServerSettings};
    pub use crate::net::tcp::policy::{Broadcast, Echo, Sum};
    pub use crate::net::tcp::{
        ConnectionId, DispatchPolicy, LogLevel, Logger, Peers, ServerHandle, TcpServer,
    };
    pub use crate::reactor::{self, Reactor, ShutdownHandle};
}
