use crate::{error::Result, event::Readiness};
use mio::Registry;
use std::time::Instant;

/// Callbacks driven by [`Reactor::run`](crate::reactor::Reactor::run).
///
/// All methods run on the reactor thread. An `Err` from any of them is a
/// reactor-level failure and stops the loop; per-connection problems must be
/// handled inside the implementation.
pub trait EventHandler {
    fn handle_event(&mut self, registry: &Registry, event: Readiness) -> Result<()>;

    /// Called after the poller was woken through a [`Waker`](mio::Waker).
    fn handle_wake(&mut self, registry: &Registry) -> Result<()> {
        let _ = registry;
        Ok(())
    }

    /// While this returns true the next poll does not block, so
    /// [`handle_tick`](Self::handle_tick) can resume deferred work promptly.
    fn has_pending(&self) -> bool {
        false
    }

    /// Called once per loop iteration after events were dispatched, including
    /// iterations that ended on the poll timeout.
    fn handle_tick(&mut self, registry: &Registry, now: Instant) -> Result<()> {
        let _ = (registry, now);
        Ok(())
    }
}
