use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use crate::{
    error::Result,
    event::Readiness,
    handler::EventHandler,
    poll::{PollHandle, WAKE_TOKEN},
};
use mio::{Events, Registry, Waker};

pub const DEFAULT_EVENTS_CAPACITY: usize = 1024;
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 100;

/// Where the loop currently is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactorState {
    Idle,
    Blocked,
    Dispatching,
    Stopped,
}

/// Cross-thread stop switch for a running [`Reactor`].
///
/// The flag is checked once per iteration, so a stop request lets the
/// current batch of I/O finish before [`Reactor::run`] returns.
#[derive(Clone)]
pub struct ShutdownHandle {
    running: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.waker.wake();
    }

    /// Interrupts the blocking wait without stopping the loop.
    pub fn wake(&self) -> io::Result<()> {
        self.waker.wake()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Single-threaded readiness loop.
///
/// One thread blocks in the poller, then hands each event to an
/// [`EventHandler`]. The handler is the only code that touches socket state.
pub struct Reactor {
    poll_handle: PollHandle,
    events: Events,
    running: Arc<AtomicBool>,
    poll_timeout: Option<Duration>,
    state: ReactorState,
}

impl Reactor {
    pub fn new(events_capacity: usize, poll_timeout: Option<Duration>) -> io::Result<Self> {
        Ok(Self {
            poll_handle: PollHandle::new()?,
            events: Events::with_capacity(events_capacity),
            running: Arc::new(AtomicBool::new(true)),
            poll_timeout,
            state: ReactorState::Idle,
        })
    }

    pub fn registry(&self) -> &Registry {
        self.poll_handle.registry()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            running: self.running.clone(),
            waker: self.poll_handle.waker(),
        }
    }

    pub fn state(&self) -> ReactorState {
        self.state
    }

    /// Runs until a [`ShutdownHandle`] stops the loop or `handler` fails.
    pub fn run<H: EventHandler>(&mut self, handler: &mut H) -> Result<()> {
        let outcome = self.run_loop(handler);
        self.state = ReactorState::Stopped;
        outcome
    }

    fn run_loop<H: EventHandler>(&mut self, handler: &mut H) -> Result<()> {
        while self.running.load(Ordering::SeqCst) {
            let timeout = if handler.has_pending() {
                Some(Duration::ZERO)
            } else {
                self.poll_timeout
            };
            self.state = ReactorState::Blocked;
            self.poll_handle.poll(&mut self.events, timeout)?;

            self.state = ReactorState::Dispatching;
            let registry = self.poll_handle.registry();
            let mut woken = false;
            for event in self.events.iter() {
                if event.token() == WAKE_TOKEN {
                    woken = true;
                    continue;
                }
                handler.handle_event(registry, Readiness::from(event))?;
            }
            if woken {
                handler.handle_wake(registry)?;
            }
            handler.handle_tick(registry, Instant::now())?;
            self.state = ReactorState::Idle;
        }
        Ok(())
    }
}
