//! Hooks the multiplexer calls while it works.
//!
//! The transfer library must not be re-entered from inside its own
//! callbacks, so both hooks only record what was asked for. The engine
//! applies the queued signals as soon as the library call returns.

use curl::MultiError;
use curl::multi::{Multi, Socket, SocketEvents};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;
use tracing::trace;

/// Readiness interest the multiplexer wants for one socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Watch {
    Read,
    Write,
    Both,
    Remove,
}

impl From<&SocketEvents> for Watch {
    fn from(events: &SocketEvents) -> Self {
        if events.remove() {
            Watch::Remove
        } else if events.input_and_output() {
            Watch::Both
        } else if events.output() {
            Watch::Write
        } else {
            Watch::Read
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal {
    /// Readiness-interest hook. `token` is the per-socket slot value, `0`
    /// until the engine assigns one.
    Socket {
        socket: Socket,
        watch: Watch,
        token: usize,
    },
    /// Timer-deadline hook. `None` cancels the timer.
    Timer(Option<Duration>),
}

/// Installs both hooks on `multi` and returns the queue they feed.
pub(crate) fn install(multi: &mut Multi) -> Result<Receiver<Signal>, MultiError> {
    let (transmitter, receiver) = mpsc::channel();

    let sockets = transmitter.clone();
    multi.socket_function(move |socket, events, token| {
        let watch = Watch::from(&events);
        trace!(socket, ?watch, token, "socket hook");
        // The receiver only goes away with the engine itself.
        let _ = sockets.send(Signal::Socket {
            socket,
            watch,
            token,
        });
    })?;

    multi.timer_function(move |deadline| {
        trace!(?deadline, "timer hook");
        let _ = transmitter.send(Signal::Timer(deadline));
        true
    })?;

    Ok(receiver)
}
