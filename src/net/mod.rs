//! Network layer for the Mill-Frame reactor.
//!
//! This module turns the bare [`Reactor`](crate::reactor::Reactor) into a
//! message server: sockets are accepted and serviced by a TCP server that
//! owns every connection, decodes frames and routes them through a
//! [`DispatchPolicy`](tcp::DispatchPolicy). No async/await and no worker
//! threads are involved.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      User Application                       │
//! │  ┌──────────────┐          ┌─────────────────┐              │
//! │  │ TcpServer/   │────────▶│ Your Policy      │              │
//! │  │ TcpClient    │          │ (DispatchPolicy)│              │
//! │  └──────────────┘          └─────────────────┘              │
//! └────────────┬──────────────────────┬─────────────────────────┘
//!              │                      │ on_message / on_event
//!              │ Register             │
//!              ▼                      │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Reactor (one thread)                   │
//! │  ┌──────────┐       ┌─────────────┐      ┌──────────────┐   │
//! │  │ Poll     │─────▶│ Connection  │────▶│ Decoder /    │   │
//! │  │ + Waker  │       │ table       │      │ outbound Q   │   │
//! │  └──────────┘       └─────────────┘      └──────────────┘   │
//! └────────────┬────────────────────────────────────────────────┘
//!              │ OS Events
//!              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Operating System (epoll/kqueue/IOCP)           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The reactor polls for readiness, performs the I/O on the ready
//! connection, and calls the policy for every complete message. Replies are
//! queued on their target connections and written as those sockets become
//! writable.
//!
//! # Example
//!
//! ```rust,no_run
//! use mill_frame::net::tcp::{config::ServerConfig, policy::Sum, TcpServer};
//!
//! # fn main() -> mill_frame::error::Result<()> {
//! let config = ServerConfig::builder()
//!     .address("127.0.0.1:7777".parse().unwrap())
//!     .buffer_size(1024)
//!     .build();
//!
//! // Replies to every [i32][i32] request with their sum.
//! let mut server = TcpServer::bind(config, Sum)?;
//! server.run()?;
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod tcp;
