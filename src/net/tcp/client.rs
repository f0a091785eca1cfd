//! Non-blocking client for a single server connection.
//!
//! The client runs its own [`Reactor`] and reuses [`Connection`], so framing,
//! back-pressure and interest handling are identical to the server side. The
//! connect itself is non-blocking: the socket is registered for writability
//! and the handshake result is checked when it first becomes ready.
//!
//! Other threads (a console reader, typically) talk to the client through a
//! [`ClientHandle`].

use std::io;
use std::mem;
use std::sync::{
    mpsc::{self, Receiver, Sender},
    Arc,
};
use std::time::Instant;

use mio::net::TcpStream;
use mio::Registry;

use crate::codec::{Encode, Framed};
use crate::error::Result;
use crate::event::Readiness;
use crate::handler::EventHandler;
use crate::net::errors::NetworkError;
use crate::net::tcp::config::ClientConfig;
use crate::net::tcp::connection::Connection;
use crate::net::tcp::traits::{ConnectionId, LogLevel, Logger};
use crate::reactor::{Reactor, ShutdownHandle};

const CLIENT_EVENTS_CAPACITY: usize = 64;

enum ClientCommand<M> {
    Send(M),
    Close,
}

/// Cross-thread access to a running [`TcpClient`].
pub struct ClientHandle<M> {
    commands: Sender<ClientCommand<M>>,
    shutdown: ShutdownHandle,
}

impl<M> Clone for ClientHandle<M> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<M> ClientHandle<M> {
    fn submit(&self, command: ClientCommand<M>) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| NetworkError::EventLoopGone)?;
        self.shutdown.wake()?;
        Ok(())
    }

    pub fn send(&self, message: M) -> Result<()> {
        self.submit(ClientCommand::Send(message))
    }

    /// Flushes queued output, then closes the connection.
    pub fn close(&self) -> Result<()> {
        self.submit(ClientCommand::Close)
    }

    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }
}

/// High-level TCP client
pub struct TcpClient<In: Framed + Clone, Out: Encode> {
    reactor: Reactor,
    state: ClientState<In, Out>,
    commands: Sender<ClientCommand<Out>>,
}

impl<In, Out> TcpClient<In, Out>
where
    In: Framed + Clone,
    Out: Encode,
{
    /// Starts connecting to `config.address`. Every decoded inbound message
    /// is passed to `on_message` on the reactor thread.
    pub fn connect<F>(config: ClientConfig, on_message: F) -> Result<Self>
    where
        F: FnMut(In) + Send + 'static,
    {
        config.validate_for::<Out>()?;
        let reactor = Reactor::new(CLIENT_EVENTS_CAPACITY, config.poll_timeout)?;
        let stream = TcpStream::connect(config.address).map_err(NetworkError::Connect)?;

        let mut conn = Connection::new(
            ConnectionId::new(1),
            stream,
            config.address,
            config.buffer_size,
            &config.limits(),
        );
        conn.set_connecting(true);
        conn.sync_interest(reactor.registry())?;

        let (commands, receiver) = mpsc::channel();
        Ok(Self {
            state: ClientState {
                connection: Some(conn),
                on_message: Box::new(on_message),
                commands: receiver,
                logger: config.logger.clone(),
                shutdown: reactor.shutdown_handle(),
                inbox: Vec::new(),
            },
            reactor,
            commands,
        })
    }

    pub fn handle(&self) -> ClientHandle<Out> {
        ClientHandle {
            commands: self.commands.clone(),
            shutdown: self.reactor.shutdown_handle(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state
            .connection
            .as_ref()
            .is_some_and(|conn| !conn.is_connecting())
    }

    /// Runs until the connection is closed by either side or a handle shuts
    /// the client down. A failed connect is returned as
    /// [`NetworkError::Connect`].
    pub fn run(&mut self) -> Result<()> {
        let outcome = self.reactor.run(&mut self.state);
        if let Some(mut conn) = self.state.connection.take() {
            let _ = conn.deregister(self.reactor.registry());
        }
        outcome
    }
}

struct ClientState<In: Framed, Out> {
    connection: Option<Connection<TcpStream, In, Out>>,
    on_message: Box<dyn FnMut(In) + Send>,
    commands: Receiver<ClientCommand<Out>>,
    logger: Arc<dyn Logger>,
    shutdown: ShutdownHandle,
    inbox: Vec<In>,
}

impl<In, Out> EventHandler for ClientState<In, Out>
where
    In: Framed + Clone,
    Out: Encode,
{
    fn handle_event(&mut self, registry: &Registry, event: Readiness) -> Result<()> {
        let Some(conn) = self.connection.as_mut() else {
            return Ok(());
        };

        if conn.is_connecting() {
            if !finish_connect(conn.stream()).map_err(NetworkError::Connect)? {
                return Ok(());
            }
            conn.set_connecting(false);
            self.logger.log(
                LogLevel::Info,
                &format!("Connected to {}", conn.peer_addr()),
            );
        }

        self.exchange(registry, event.is_writable())
    }

    fn has_pending(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|conn| conn.read_pending())
    }

    fn handle_tick(&mut self, registry: &Registry, _now: Instant) -> Result<()> {
        if self.has_pending() {
            self.exchange(registry, false)?;
        }
        Ok(())
    }

    fn handle_wake(&mut self, registry: &Registry) -> Result<()> {
        while let Ok(command) = self.commands.try_recv() {
            let Some(conn) = self.connection.as_mut() else {
                continue;
            };
            match command {
                ClientCommand::Send(message) => {
                    if let Err(e) = conn.enqueue(message) {
                        self.logger
                            .log(LogLevel::Warn, &format!("Dropping message: {}", e));
                    }
                }
                ClientCommand::Close => conn.close_read(),
            }
        }
        self.refresh(registry)
    }
}

impl<In, Out> ClientState<In, Out>
where
    In: Framed + Clone,
    Out: Encode,
{
    /// One read, then a write when the socket is writable or output is
    /// waiting.
    fn exchange(&mut self, registry: &Registry, writable: bool) -> Result<()> {
        let Some(conn) = self.connection.as_mut() else {
            return Ok(());
        };
        let mut inbox = mem::take(&mut self.inbox);
        let mut outcome = conn.on_readable(&mut inbox);
        if outcome.is_ok() && (writable || conn.unflushed() > 0) {
            outcome = conn.on_writable();
        }
        for message in inbox.drain(..) {
            (self.on_message)(message);
        }
        self.inbox = inbox;

        match outcome {
            Ok(()) => self.refresh(registry),
            Err(e) => {
                self.disconnect(registry, LogLevel::Warn, &e.to_string());
                Ok(())
            }
        }
    }

    fn refresh(&mut self, registry: &Registry) -> Result<()> {
        let Some(conn) = self.connection.as_mut() else {
            return Ok(());
        };
        match conn.sync_interest(registry) {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.disconnect(registry, LogLevel::Info, "connection finished");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn disconnect(&mut self, registry: &Registry, level: LogLevel, reason: &str) {
        if let Some(mut conn) = self.connection.take() {
            let _ = conn.deregister(registry);
            self.logger.log(
                level,
                &format!("Disconnected from {}: {}", conn.peer_addr(), reason),
            );
        }
        self.shutdown.shutdown();
    }
}

/// Resolves a pending non-blocking connect: `Ok(true)` once established,
/// `Ok(false)` while still in progress.
fn finish_connect(stream: &TcpStream) -> io::Result<bool> {
    if let Some(e) = stream.take_error()? {
        return Err(e);
    }
    match stream.peer_addr() {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(false),
        Err(e) => Err(e),
    }
}
