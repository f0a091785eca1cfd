//! Stock dispatch policies: echo, broadcast (chat) and sum.

use std::marker::PhantomData;

use crate::codec::Framed;
use crate::net::errors::NetworkEvent;
use crate::net::tcp::traits::{ConnectionId, DispatchPolicy, Peers};

/// Sends every message back to the connection it came from.
pub struct Echo<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Echo<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for Echo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Framed + Clone + 'static> DispatchPolicy for Echo<T> {
    type Inbound = T;
    type Outbound = T;

    fn on_message(
        &mut self,
        source: ConnectionId,
        message: T,
        _peers: Peers<'_>,
    ) -> Vec<(ConnectionId, T)> {
        vec![(source, message)]
    }
}

/// Relays every message to all live connections.
///
/// The sender receives its own message only when `include_source` is set.
pub struct Broadcast<T> {
    include_source: bool,
    connected: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Broadcast<T> {
    pub fn new(include_source: bool) -> Self {
        Self {
            include_source,
            connected: 0,
            _marker: PhantomData,
        }
    }

    pub fn includes_source(&self) -> bool {
        self.include_source
    }

    /// Connections seen through lifecycle events.
    pub fn connected(&self) -> usize {
        self.connected
    }
}

impl<T: Framed + Clone + 'static> DispatchPolicy for Broadcast<T> {
    type Inbound = T;
    type Outbound = T;

    fn on_message(
        &mut self,
        source: ConnectionId,
        message: T,
        peers: Peers<'_>,
    ) -> Vec<(ConnectionId, T)> {
        peers
            .iter()
            .filter(|&id| self.include_source || id != source)
            .map(|id| (id, message.clone()))
            .collect()
    }

    fn on_event(&mut self, event: &NetworkEvent) {
        match event {
            NetworkEvent::ConnectionEstablished(..) => self.connected += 1,
            NetworkEvent::ConnectionClosed(_) => {
                self.connected = self.connected.saturating_sub(1)
            }
            NetworkEvent::Listening(_) => {}
        }
    }
}

/// Replies to each `[i32][i32]` request with their wrapping sum.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sum;

impl DispatchPolicy for Sum {
    type Inbound = (i32, i32);
    type Outbound = i32;

    fn on_message(
        &mut self,
        source: ConnectionId,
        (a, b): (i32, i32),
        _peers: Peers<'_>,
    ) -> Vec<(ConnectionId, i32)> {
        vec![(source, a.wrapping_add(b))]
    }
}
