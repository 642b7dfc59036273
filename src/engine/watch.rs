use crate::reactor::core::EventLoop;
use crate::reactor::event::Interest;

use curl::multi::Socket;
use std::io;
use tracing::debug;

/// Bookkeeping for one socket the multiplexer asked us to watch.
///
/// Lives in the engine's watch arena; its arena key is both the event-loop
/// registration key and (plus one) the token stored back in the multiplexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SocketWatch {
    pub(crate) socket: Socket,
    pub(crate) interest: Interest,
}

impl SocketWatch {
    pub(crate) fn new(socket: Socket, interest: Interest) -> Self {
        Self { socket, interest }
    }

    pub(crate) fn register(&self, event_loop: &EventLoop, key: usize) -> io::Result<()> {
        debug!(socket = self.socket, key, interest = ?self.interest, "watch registered");
        event_loop.register(self.socket, key, self.interest)
    }

    /// Stops any existing watch, then watches again with `interest`.
    pub(crate) fn rearm(
        &mut self,
        event_loop: &EventLoop,
        key: usize,
        interest: Interest,
    ) -> io::Result<()> {
        self.release(event_loop);
        self.interest = interest;
        self.register(event_loop, key)
    }

    /// Stops watching. The socket itself stays owned by the multiplexer and
    /// may already be closed, so a failed deregistration is not an error.
    pub(crate) fn release(&self, event_loop: &EventLoop) {
        if let Err(err) = event_loop.deregister(self.socket) {
            debug!(socket = self.socket, "deregister skipped: {}", err);
        }
    }
}
