//! Per-socket state: buffers, decoder, outbound queue and registered interest.
//!
//! ```text
//!   socket ──read──▶ inbound ──decoder──▶ inbox (to the policy)
//!   socket ◀─write── outbound ◀──encode── queue (from the policy)
//! ```
//!
//! Both buffers have the same fixed capacity. The queue holds messages that
//! did not fit whole into the outbound buffer yet; they are serialised as the
//! socket drains it, so a frame is never split across the queue and the
//! buffer.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use mio::{event::Source, Interest, Registry};

use crate::buffer::FrameBuffer;
use crate::codec::{DecodeStatus, Decoder, Encode, FrameLimits, Framed};
use crate::error::Result;
use crate::net::errors::NetworkError;
use crate::net::tcp::traits::ConnectionId;

pub struct Connection<S, In: Framed, Out> {
    id: ConnectionId,
    stream: S,
    peer_addr: SocketAddr,
    inbound: FrameBuffer,
    outbound: FrameBuffer,
    decoder: In::Decoder,
    queue: VecDeque<Out>,
    scratch: Vec<u8>,
    closing: bool,
    connecting: bool,
    read_pending: bool,
    last_activity: Instant,
    registered: Option<Interest>,
}

impl<S, In, Out> Connection<S, In, Out>
where
    S: Read + Write,
    In: Framed + Clone,
    Out: Encode,
{
    pub fn new(
        id: ConnectionId,
        stream: S,
        peer_addr: SocketAddr,
        buffer_size: usize,
        limits: &FrameLimits,
    ) -> Self {
        Self {
            id,
            stream,
            peer_addr,
            inbound: FrameBuffer::with_capacity(buffer_size),
            outbound: FrameBuffer::with_capacity(buffer_size),
            decoder: In::decoder(limits),
            queue: VecDeque::new(),
            scratch: Vec::with_capacity(buffer_size),
            closing: false,
            connecting: false,
            read_pending: false,
            last_activity: Instant::now(),
            registered: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }

    /// Stops reading. Queued output is still flushed.
    pub fn close_read(&mut self) {
        self.closing = true;
    }

    pub fn is_connecting(&self) -> bool {
        self.connecting
    }

    /// Marks an outgoing connect as in flight; the socket then waits for
    /// writability before any I/O is attempted.
    pub fn set_connecting(&mut self, connecting: bool) {
        self.connecting = connecting;
    }

    /// Messages waiting for room in the outbound buffer.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Serialised bytes not yet accepted by the socket.
    pub fn unflushed(&self) -> usize {
        self.outbound.len()
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) >= timeout
    }

    /// Performs one read and decodes every complete frame into `inbox`.
    ///
    /// A read that fills all free inbound space may have left bytes in the
    /// socket; [`read_pending`](Self::read_pending) reports that case so the
    /// caller can come back without waiting for a new readiness edge.
    ///
    /// End-of-stream marks the connection as closing. A malformed frame fails
    /// with [`NetworkError::Protocol`]; the stream cannot be resynchronised
    /// after that.
    pub fn on_readable(&mut self, inbox: &mut Vec<In>) -> Result<()> {
        self.read_pending = false;
        if self.connecting || self.closing || !self.inbound.has_remaining() {
            return Ok(());
        }
        let space = self.inbound.remaining();
        loop {
            match self.inbound.read_from(&mut self.stream) {
                Ok(0) => {
                    // peer closed its write half
                    self.closing = true;
                    return Ok(());
                }
                Ok(n) => {
                    self.last_activity = Instant::now();
                    self.read_pending = n == space;
                    return self.decode_inbound(inbox);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// True when the last read stopped on buffer space rather than on an
    /// empty socket.
    pub fn read_pending(&self) -> bool {
        self.read_pending && !self.closing
    }

    fn decode_inbound(&mut self, inbox: &mut Vec<In>) -> Result<()> {
        loop {
            match self.decoder.process(&mut self.inbound)? {
                DecodeStatus::Complete => {
                    inbox.push(self.decoder.value()?.clone());
                    self.decoder.reset();
                }
                DecodeStatus::NeedMoreData => return Ok(()),
                DecodeStatus::Malformed(e) => return Err(NetworkError::Protocol(e)),
            }
        }
    }

    /// Queues `message` and serialises as much of the queue as fits whole.
    ///
    /// A message larger than the outbound buffer could never be written and
    /// is rejected.
    pub fn enqueue(&mut self, message: Out) -> Result<()> {
        let len = message.encoded_len();
        if len > self.outbound.capacity() {
            return Err(NetworkError::FrameTooLarge {
                len,
                capacity: self.outbound.capacity(),
            });
        }
        self.queue.push_back(message);
        self.fill_outbound();
        Ok(())
    }

    fn fill_outbound(&mut self) {
        while let Some(next) = self.queue.front() {
            if next.encoded_len() > self.outbound.remaining() {
                break;
            }
            self.scratch.clear();
            next.encode(&mut self.scratch);
            self.outbound.put_slice(&self.scratch);
            self.queue.pop_front();
        }
    }

    /// Writes until the socket would block or nothing is left to send.
    pub fn on_writable(&mut self) -> Result<()> {
        if self.connecting {
            return Ok(());
        }
        loop {
            self.fill_outbound();
            if self.outbound.is_empty() {
                return Ok(());
            }
            match self.outbound.write_to(&mut self.stream) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero).into()),
                Ok(_) => self.last_activity = Instant::now(),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// The interest this connection needs right now, `None` once it has
    /// nothing left to do.
    pub fn interest(&self) -> Option<Interest> {
        let readable = !self.closing && self.inbound.has_remaining();
        let writable = self.connecting || !self.outbound.is_empty();
        match (readable, writable) {
            (true, true) => Some(Interest::READABLE | Interest::WRITABLE),
            (true, false) => Some(Interest::READABLE),
            (false, true) => Some(Interest::WRITABLE),
            (false, false) => None,
        }
    }

    pub fn registered_interest(&self) -> Option<Interest> {
        self.registered
    }
}

impl<S, In, Out> Connection<S, In, Out>
where
    S: Read + Write + Source,
    In: Framed + Clone,
    Out: Encode,
{
    /// Brings the poller registration in line with [`interest`](Self::interest).
    ///
    /// Returns `false` when the connection is idle and should be closed; the
    /// registration is left untouched in that case.
    pub fn sync_interest(&mut self, registry: &Registry) -> Result<bool> {
        let Some(interest) = self.interest() else {
            return Ok(false);
        };
        match self.registered {
            None => registry.register(&mut self.stream, self.id.token(), interest)?,
            Some(current) if current != interest => {
                registry.reregister(&mut self.stream, self.id.token(), interest)?
            }
            Some(_) => {}
        }
        self.registered = Some(interest);
        Ok(true)
    }

    pub fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        if self.registered.take().is_some() {
            registry.deregister(&mut self.stream)?;
        }
        Ok(())
    }
}
