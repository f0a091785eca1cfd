//! Single-threaded TCP server and client built on the [`Reactor`].
//!
//! The server owns the listening socket and a table of [`Connection`]s keyed
//! by [`ConnectionId`]. Every socket is non-blocking and driven by readiness
//! events on one thread; the only thing that differs between server variants
//! is the [`DispatchPolicy`].
//!
//! ```text
//! Connection Storage:
//!   HashMap<ConnectionId, Connection>          (reactor thread only)
//!        │
//!        ├──> ConnId(1) ──> Connection { stream, inbound, outbound, decoder, queue }
//!        ├──> ConnId(2) ──> Connection { ... }
//!        └──> ConnId(N) ──> Connection { ... }
//!
//!   Roster: LockfreeMap<u64, PeerInfo>        (written by the reactor, read anywhere)
//! ```
//!
//! ## Event Handling Pipeline
//!
//! ```text
//! 1. Listener readable:
//!    accept() until WouldBlock
//!        - max_connections check, TCP_NODELAY
//!        - assign ConnectionId, register READABLE
//!        - Roster insert, NetworkEvent::ConnectionEstablished
//!
//! 2. Connection ready:
//!    one on_readable() ──> decoded messages ──> policy.on_message()
//!        ──> enqueue() on each target ──> sync_interest() on each target
//!    on_writable()
//!    sync_interest() on the source; no interest left means close
//!
//! 3. Waker:
//!    drain ServerHandle commands (send, broadcast, close)
//!
//! 4. Every tick:
//!    one more read on connections whose last read filled the buffer
//!    close connections idle for longer than idle_timeout
//! ```
//!
//! A connection gets at most one read per loop iteration, so a peer that
//! never stops sending cannot hold the reactor away from the others.
//!
//! A failure on one connection closes that connection and is logged; it never
//! reaches other peers. Failures of the poller or the listener end
//! [`TcpServer::run`] with an error.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mill_frame::codec::Message;
//! use mill_frame::net::tcp::{config::ServerConfig, policy::Broadcast, TcpServer};
//!
//! # fn main() -> mill_frame::error::Result<()> {
//! let config = ServerConfig::builder()
//!     .address("127.0.0.1:7777".parse().unwrap())
//!     .max_connections(100)
//!     .build();
//!
//! let mut server = TcpServer::bind(config, Broadcast::<Message>::new(false))?;
//! let handle = server.handle();
//! std::thread::spawn(move || {
//!     handle.broadcast(Message::new("server", "welcome")).ok();
//! });
//! server.run()?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod policy;
pub mod roster;
pub mod traits;

pub use traits::{ConnectionId, DispatchPolicy, LogLevel, Logger, NoOpLogger, Peers, TracingLogger};

use std::collections::{BTreeSet, HashMap};
use std::io;
use std::mem;
use std::net::SocketAddr;
use std::sync::{
    mpsc::{self, Receiver, Sender},
    Arc,
};
use std::time::Instant;

use mio::net::{TcpListener, TcpStream};
use mio::{Interest, Registry, Token};

use crate::codec::FrameLimits;
use crate::error::Result;
use crate::event::Readiness;
use crate::handler::EventHandler;
use crate::net::errors::{NetworkError, NetworkEvent};
use crate::reactor::{Reactor, ShutdownHandle};
use config::ServerConfig;
use connection::Connection;
use roster::{Roster, RosterHandle};

const LISTENER: Token = Token(0);

enum Command<M> {
    Send { to: ConnectionId, message: M },
    Broadcast(M),
    Close(ConnectionId),
}

/// Cross-thread access to a running [`TcpServer`].
///
/// Commands are queued on a channel and the reactor is woken to apply them,
/// so no other thread ever touches a connection's buffers.
pub struct ServerHandle<M> {
    commands: Sender<Command<M>>,
    shutdown: ShutdownHandle,
}

impl<M> Clone for ServerHandle<M> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<M> ServerHandle<M> {
    fn submit(&self, command: Command<M>) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| NetworkError::EventLoopGone)?;
        self.shutdown.wake()?;
        Ok(())
    }

    /// Send data to a specific connection
    pub fn send(&self, to: ConnectionId, message: M) -> Result<()> {
        self.submit(Command::Send { to, message })
    }

    /// Broadcast data to all connections
    pub fn broadcast(&self, message: M) -> Result<()> {
        self.submit(Command::Broadcast(message))
    }

    /// Stop reading from a connection and close it once its output is flushed
    pub fn close(&self, id: ConnectionId) -> Result<()> {
        self.submit(Command::Close(id))
    }

    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }
}

/// TCP server running one [`DispatchPolicy`] over length-prefixed frames.
pub struct TcpServer<P: DispatchPolicy> {
    reactor: Reactor,
    state: ServerState<P>,
    commands: Sender<Command<P::Outbound>>,
    local_addr: SocketAddr,
}

impl<P: DispatchPolicy> TcpServer<P> {
    /// Binds the listening socket. Nothing is accepted until [`run`](Self::run).
    pub fn bind(config: ServerConfig, policy: P) -> Result<Self> {
        config.validate_for::<P::Outbound>()?;
        let reactor = Reactor::new(config.events_capacity, config.poll_timeout)?;

        let mut listener = TcpListener::bind(config.address).map_err(|source| NetworkError::Bind {
            addr: config.address,
            source,
        })?;
        reactor
            .registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        let local_addr = listener.local_addr()?;

        let (commands, receiver) = mpsc::channel();
        let mut state = ServerState {
            listener,
            connections: HashMap::new(),
            policy,
            limits: config.limits(),
            logger: config.logger.clone(),
            config,
            next_conn_id: 1,
            roster: Roster::new(),
            commands: receiver,
            inbox: Vec::new(),
            peers: Vec::new(),
            pending_reads: BTreeSet::new(),
        };
        state
            .logger
            .log(LogLevel::Info, &format!("Listening on {}", local_addr));
        state.policy.on_event(&NetworkEvent::Listening(local_addr));

        Ok(Self {
            reactor,
            state,
            commands,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> ServerHandle<P::Outbound> {
        ServerHandle {
            commands: self.commands.clone(),
            shutdown: self.reactor.shutdown_handle(),
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.reactor.shutdown_handle()
    }

    pub fn roster(&self) -> RosterHandle {
        self.state.roster.handle()
    }

    /// Get active connection count
    pub fn connection_count(&self) -> usize {
        self.state.connections.len()
    }

    pub fn policy(&self) -> &P {
        &self.state.policy
    }

    /// Serves until shut down through a handle or until the poller or
    /// listener fails. Open connections are closed on the way out.
    pub fn run(&mut self) -> Result<()> {
        let outcome = self.reactor.run(&mut self.state);
        self.state.close_all(self.reactor.registry());
        outcome
    }
}

struct ServerState<P: DispatchPolicy> {
    listener: TcpListener,
    connections: HashMap<ConnectionId, Connection<TcpStream, P::Inbound, P::Outbound>>,
    policy: P,
    config: ServerConfig,
    limits: FrameLimits,
    next_conn_id: u64,
    roster: Roster,
    commands: Receiver<Command<P::Outbound>>,
    logger: Arc<dyn Logger>,
    inbox: Vec<P::Inbound>,
    peers: Vec<ConnectionId>,
    pending_reads: BTreeSet<ConnectionId>,
}

impl<P: DispatchPolicy> EventHandler for ServerState<P> {
    fn handle_event(&mut self, registry: &Registry, event: Readiness) -> Result<()> {
        match event.token() {
            LISTENER => self.accept(registry),
            token => {
                self.service(registry, ConnectionId::from_token(token), event);
                Ok(())
            }
        }
    }

    fn handle_wake(&mut self, registry: &Registry) -> Result<()> {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::Send { to, message } => self.deliver(registry, to, message),
                Command::Broadcast(message) => {
                    let mut ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
                    ids.sort_unstable();
                    for id in ids {
                        self.deliver(registry, id, message.clone());
                    }
                }
                Command::Close(id) => {
                    if let Some(conn) = self.connections.get_mut(&id) {
                        conn.close_read();
                    }
                    self.refresh(registry, id);
                }
            }
        }
        Ok(())
    }

    fn has_pending(&self) -> bool {
        !self.pending_reads.is_empty()
    }

    fn handle_tick(&mut self, registry: &Registry, now: Instant) -> Result<()> {
        for id in mem::take(&mut self.pending_reads) {
            self.service(registry, id, Readiness::readable(id.token()));
        }

        let Some(timeout) = self.config.idle_timeout else {
            return Ok(());
        };
        let idle: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|(_, conn)| conn.is_idle(now, timeout))
            .map(|(id, _)| *id)
            .collect();
        for id in idle {
            self.close(registry, id, LogLevel::Info, "idle timeout");
        }
        Ok(())
    }
}

impl<P: DispatchPolicy> ServerState<P> {
    fn accept(&mut self, registry: &Registry) -> Result<()> {
        loop {
            match self.listener.accept() {
                Ok((stream, peer_addr)) => self.admit(registry, stream, peer_addr),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::Interrupted | io::ErrorKind::ConnectionAborted
                    ) =>
                {
                    continue
                }
                Err(e) => {
                    self.logger
                        .log(LogLevel::Error, &format!("Accept error: {}", e));
                    return Err(NetworkError::Accept(e));
                }
            }
        }
    }

    fn admit(&mut self, registry: &Registry, stream: TcpStream, peer_addr: SocketAddr) {
        if let Some(max) = self.config.max_connections {
            if self.connections.len() >= max {
                self.logger.log(
                    LogLevel::Warn,
                    &NetworkError::MaxConnectionsReached(peer_addr).to_string(),
                );
                return;
            }
        }

        if let Err(e) = stream.set_nodelay(self.config.no_delay) {
            self.logger
                .log(LogLevel::Error, &format!("Failed to set TCP_NODELAY: {}", e));
        }

        let conn_id = ConnectionId::new(self.next_conn_id);
        self.next_conn_id += 1;

        let mut conn = Connection::new(
            conn_id,
            stream,
            peer_addr,
            self.config.buffer_size,
            &self.limits,
        );
        if let Err(e) = conn.sync_interest(registry) {
            self.logger.log(
                LogLevel::Error,
                &format!("Failed to register connection: {}", e),
            );
            return;
        }

        self.connections.insert(conn_id, conn);
        self.roster.insert(conn_id, peer_addr);
        self.logger.log(
            LogLevel::Info,
            &format!("New connection: {} (id: {:?})", peer_addr, conn_id),
        );
        self.policy
            .on_event(&NetworkEvent::ConnectionEstablished(conn_id, peer_addr));
    }

    fn service(&mut self, registry: &Registry, id: ConnectionId, event: Readiness) {
        let Some(conn) = self.connections.get_mut(&id) else {
            return;
        };

        let mut inbox = mem::take(&mut self.inbox);
        let mut outcome = Ok(());
        if event.is_readable() || event.is_error() {
            outcome = conn.on_readable(&mut inbox);
        }
        if outcome.is_ok() && event.is_writable() {
            outcome = conn.on_writable();
        }
        if outcome.is_ok() && conn.read_pending() {
            self.pending_reads.insert(id);
        }

        if let Err(e) = outcome {
            let level = match e {
                NetworkError::Protocol(_) => LogLevel::Warn,
                _ => LogLevel::Info,
            };
            self.close(registry, id, level, &e.to_string());
        }

        // Frames decoded before a failure are still dispatched.
        for message in inbox.drain(..) {
            self.dispatch(registry, id, message);
        }
        self.inbox = inbox;

        self.refresh(registry, id);
    }

    fn dispatch(&mut self, registry: &Registry, source: ConnectionId, message: P::Inbound) {
        self.peers.clear();
        self.peers.extend(self.connections.keys().copied());
        self.peers.sort_unstable();

        let deliveries = self
            .policy
            .on_message(source, message, Peers::new(&self.peers));
        for (target, reply) in deliveries {
            self.deliver(registry, target, reply);
        }
    }

    fn deliver(&mut self, registry: &Registry, target: ConnectionId, message: P::Outbound) {
        let Some(conn) = self.connections.get_mut(&target) else {
            self.logger.log(
                LogLevel::Debug,
                &format!(
                    "Dropping message: {}",
                    NetworkError::UnknownConnection(target)
                ),
            );
            return;
        };
        if let Err(e) = conn.enqueue(message) {
            self.logger
                .log(LogLevel::Warn, &format!("Dropping message for {:?}: {}", target, e));
            return;
        }
        self.refresh(registry, target);
    }

    /// Re-syncs the poller registration, closing the connection when it has
    /// nothing left to do.
    fn refresh(&mut self, registry: &Registry, id: ConnectionId) {
        let Some(conn) = self.connections.get_mut(&id) else {
            return;
        };
        match conn.sync_interest(registry) {
            Ok(true) => {}
            Ok(false) => self.close(registry, id, LogLevel::Info, "peer closed"),
            Err(e) => self.close(registry, id, LogLevel::Error, &e.to_string()),
        }
    }

    fn close(&mut self, registry: &Registry, id: ConnectionId, level: LogLevel, reason: &str) {
        let Some(mut conn) = self.connections.remove(&id) else {
            return;
        };
        self.pending_reads.remove(&id);
        if let Err(e) = conn.deregister(registry) {
            self.logger.log(
                LogLevel::Debug,
                &format!("Failed to deregister {:?}: {}", id, e),
            );
        }
        self.roster.remove(id);
        self.logger.log(
            level,
            &format!("Connection {} (id: {:?}) closed: {}", conn.peer_addr(), id, reason),
        );
        self.policy.on_event(&NetworkEvent::ConnectionClosed(id));
    }

    fn close_all(&mut self, registry: &Registry) {
        let ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
        for id in ids {
            self.close(registry, id, LogLevel::Debug, "server shutting down");
        }
    }
}
