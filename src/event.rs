use mio::{event::Event, Token};
use std::fmt;

/// Platform-neutral snapshot of a readiness event.
///
/// mio events cannot be built outside of a poll, so handlers receive this
/// plain copy instead; tests construct it directly.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    token: Token,
    is_readable: bool,
    is_writable: bool,
    is_error: bool,
}

impl fmt::Debug for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Readiness")
            .field("token", &self.token)
            .field("is_readable", &self.is_readable)
            .field("is_writable", &self.is_writable)
            .field("is_error", &self.is_error)
            .finish()
    }
}

impl Readiness {
    pub fn new(token: Token, is_readable: bool, is_writable: bool) -> Self {
        Self {
            token,
            is_readable,
            is_writable,
            is_error: false,
        }
    }

    pub fn readable(token: Token) -> Self {
        Self::new(token, true, false)
    }

    pub fn writable(token: Token) -> Self {
        Self::new(token, false, true)
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn is_readable(&self) -> bool {
        self.is_readable
    }

    pub fn is_writable(&self) -> bool {
        self.is_writable
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }
}

impl From<&Event> for Readiness {
    fn from(event: &Event) -> Self {
        Self {
            token: event.token(),
            // A peer hang-up is reported as readable so the next read observes EOF.
            is_readable: event.is_readable() || event.is_read_closed(),
            is_writable: event.is_writable() || event.is_write_closed(),
            is_error: event.is_error(),
        }
    }
}
