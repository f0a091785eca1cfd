use std::{io, sync::Arc, time::Duration};

use mio::{Events, Poll, Registry, Token, Waker};

/// Token reserved for the waker. Never handed out to sockets.
pub const WAKE_TOKEN: Token = Token(usize::MAX);

/// Owns the OS readiness multiplexer and its waker.
pub struct PollHandle {
    poller: Poll,
    waker: Arc<Waker>,
}

impl PollHandle {
    pub fn new() -> io::Result<Self> {
        let poller = Poll::new()?;
        let waker = Waker::new(poller.registry(), WAKE_TOKEN)?;
        Ok(PollHandle {
            poller,
            waker: Arc::new(waker),
        })
    }

    pub fn registry(&self) -> &Registry {
        self.poller.registry()
    }

    /// Blocks until readiness, a wake-up or `timeout`. Returns the event count.
    ///
    /// A signal interrupting the wait is reported as zero events.
    pub fn poll(&mut self, events: &mut Events, timeout: Option<Duration>) -> io::Result<usize> {
        match self.poller.poll(events, timeout) {
            Ok(()) => Ok(events.iter().count()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                events.clear();
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    pub fn waker(&self) -> Arc<Waker> {
        self.waker.clone()
    }

    pub fn wake(&self) -> io::Result<()> {
        self.waker.wake()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_poll_times_out_without_sources() {
        let mut poller = PollHandle::new().unwrap();
        let mut events = Events::with_capacity(16);
        let started = Instant::now();
        let count = poller
            .poll(&mut events, Some(Duration::from_millis(20)))
            .unwrap();
        assert_eq!(count, 0);
        assert!(started.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_wake_interrupts_poll() {
        let mut poller = PollHandle::new().unwrap();
        let mut events = Events::with_capacity(16);
        poller.wake().unwrap();
        poller
            .poll(&mut events, Some(Duration::from_secs(5)))
            .unwrap();
        assert!(events.iter().any(|event| event.token() == WAKE_TOKEN));
    }
}
