//! The transfer engine.
//!
//! An [`Engine`] couples one curl multi handle with the epoll event loop in
//! [`crate::reactor`]. The multiplexer tells the engine which sockets to watch
//! and when it next wants to be polled; the engine turns socket readiness and
//! timer expiry back into socket actions and reconciles finished transfers.
//!
//! Everything runs on the thread that calls [`Engine::poll`]. Host callbacks
//! are invoked synchronously from inside a poll and must not poll the same
//! engine again.

mod signal;
mod stats;
mod watch;

pub use stats::Stats;

use crate::builder::EngineBuilder;
use crate::connection::completion::{Completion, TransferId};
use crate::connection::handler::Transfer;
use crate::connection::options::StartOptions;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::reactor::core::EventLoop;
use crate::reactor::event::{Interest, Readiness};
use crate::utils::slab::Slab;

use curl::MultiError;
use curl::multi::{Easy2Handle, Events, Multi, Socket};
use signal::{Signal, Watch};
use std::mem;
use std::sync::mpsc::Receiver;
use std::time::Duration;
use tracing::{debug, error, trace, warn};
use watch::SocketWatch;

const WATCH_CAPACITY: usize = 16;
const TRANSFER_CAPACITY: usize = 16;

pub struct Engine {
    multi: Multi,
    event_loop: EventLoop,
    watches: Slab<SocketWatch>,
    transfers: Slab<Easy2Handle<Transfer>>,
    signals: Receiver<Signal>,
    ready: Vec<Readiness>,
    running: u32,
    stats: Stats,
    closed: bool,
}

impl Engine {
    /// Creates an engine with the default configuration.
    ///
    /// See [`EngineBuilder`] for the knobs.
    pub fn new() -> Result<Self> {
        EngineBuilder::new().build()
    }

    pub(crate) fn with_config(max_connections: Option<usize>, pipelining: bool) -> Result<Self> {
        let event_loop = EventLoop::new().map_err(|err| {
            if err.raw_os_error() == Some(libc::ENOMEM) {
                Error::Allocation("event loop")
            } else {
                Error::Io(err)
            }
        })?;

        let mut multi = Multi::new();
        let signals = signal::install(&mut multi)?;

        if let Some(max) = max_connections {
            multi.set_max_connects(max)?;
        }
        multi.pipelining(false, pipelining)?;

        debug!(?max_connections, pipelining, "engine created");

        Ok(Self {
            multi,
            event_loop,
            watches: Slab::new(WATCH_CAPACITY),
            transfers: Slab::new(TRANSFER_CAPACITY),
            signals,
            ready: Vec::new(),
            running: 0,
            stats: Stats::default(),
            closed: false,
        })
    }

    /// A fresh connection for this engine. It stays inert until it is passed
    /// to [`Engine::start`].
    pub fn connection(&self) -> Result<Connection> {
        Connection::new()
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// True when no transfer is attached to the multiplexer.
    pub fn is_idle(&self) -> bool {
        self.transfers.is_empty()
    }

    /// Applies `options` and hands the connection to the multiplexer.
    ///
    /// On error the connection is dropped and its callbacks released; the
    /// failure is counted in `failed_requests` and nothing else changes.
    pub fn start(
        &mut self,
        mut connection: Connection,
        options: &StartOptions,
    ) -> Result<TransferId> {
        let prepared = match connection.apply(options) {
            Ok(()) => connection.into_easy(),
            Err(err) => Err(err),
        };
        let easy = match prepared {
            Ok(easy) => easy,
            Err(err) => {
                self.stats.request_failed();
                warn!("transfer setup failed: {}", err);
                return Err(err);
            }
        };

        let handle = match self.multi.add2(easy) {
            Ok(handle) => handle,
            Err(err) => {
                self.stats.request_failed();
                warn!("multiplexer refused transfer: {}", err);
                return Err(Error::Multiplexer(err));
            }
        };

        let key = self.transfers.insert(handle);
        let tagged = match self.transfers.get_mut(key) {
            Some(handle) => handle.set_token(key),
            None => Ok(()),
        };
        if let Err(err) = tagged {
            if let Some(handle) = self.transfers.remove(key) {
                let _ = self.multi.remove2(handle);
            }
            self.stats.request_failed();
            warn!("transfer token rejected: {}", err);
            return Err(err.into());
        }

        self.stats.request_started();
        debug!(id = %TransferId(key), active = self.stats.active_requests, "transfer started");

        self.process_signals();

        Ok(TransferId(key))
    }

    /// Sets the URL and method, then starts the transfer.
    ///
    /// An unsupported method is rejected before anything is counted.
    pub fn start_request(
        &mut self,
        mut connection: Connection,
        url: &str,
        method: &str,
        options: &StartOptions,
    ) -> Result<TransferId> {
        connection.set_url(url)?;
        connection.set_method(method)?;
        self.start(connection, options)
    }

    /// One non-blocking pass: dispatches every ready socket and, if it is due,
    /// the re-poll timer.
    pub fn poll(&mut self) -> Result<()> {
        self.pump(None)
    }

    /// Like [`Engine::poll`], but may block for at most `max`, or until the
    /// re-poll timer is due if that comes first.
    pub fn poll_wait(&mut self, max: Duration) -> Result<()> {
        self.pump(Some(max))
    }

    /// Polls until every started transfer has completed, waiting at most
    /// `tick` per pass.
    pub fn run_until_idle(&mut self, tick: Duration) -> Result<()> {
        while self.stats.active_requests > 0 {
            self.poll_wait(tick)?;
        }
        Ok(())
    }

    /// Tears the engine down and returns the final counters.
    ///
    /// Transfers still in flight are detached without their done callback
    /// running; their callbacks are released.
    pub fn destroy(mut self) -> Stats {
        self.teardown()
    }

    fn pump(&mut self, wait: Option<Duration>) -> Result<()> {
        self.stats.loop_calls += 1;

        let mut ready = mem::take(&mut self.ready);
        ready.clear();

        if let Err(err) = self.event_loop.turn(wait, &mut ready) {
            self.ready = ready;
            return Err(err.into());
        }

        for readiness in ready.drain(..) {
            self.on_ready(readiness);
        }
        self.ready = ready;

        if self.event_loop.fire_expired_timer() {
            self.on_timeout();
        }

        Ok(())
    }

    fn on_ready(&mut self, readiness: Readiness) {
        // The watch may have been removed, or its key reused, earlier in this pass.
        let current = self
            .watches
            .get(readiness.key)
            .is_some_and(|watch| watch.socket == readiness.socket);
        if !current {
            trace!(socket = readiness.socket, "stale readiness dropped");
            return;
        }

        let mut events = Events::new();
        events
            .input(readiness.readable)
            .output(readiness.writable)
            .error(readiness.error);

        trace!(
            socket = readiness.socket,
            readable = readiness.readable,
            writable = readiness.writable,
            error = readiness.error,
            "socket action"
        );
        let outcome = self.multi.action(readiness.socket, &events);
        self.after_action(outcome);
    }

    fn on_timeout(&mut self) {
        trace!("timeout action");
        let outcome = self.multi.timeout();
        self.after_action(outcome);
    }

    fn after_action(&mut self, outcome: std::result::Result<u32, MultiError>) {
        match outcome {
            Ok(running) => self.running = running,
            Err(err) if err.is_bad_socket() => debug!("socket already gone: {}", err),
            Err(err) => error!("socket action failed: {}", err),
        }

        self.process_signals();
        self.reconcile();

        if self.running == 0 {
            self.event_loop.disarm_timer();
        }
    }

    /// Applies every hook call the multiplexer queued during its last call.
    fn process_signals(&mut self) {
        while let Ok(signal) = self.signals.try_recv() {
            match signal {
                Signal::Socket {
                    socket,
                    watch,
                    token,
                } => self.on_socket(socket, watch, token),
                Signal::Timer(deadline) => self.on_deadline(deadline),
            }
        }
    }

    fn on_deadline(&mut self, deadline: Option<Duration>) {
        match deadline {
            // A zero deadline is due at once: the next pass runs a timeout action.
            Some(after) => {
                trace!(?after, "timer armed");
                self.event_loop.arm_timer(after);
            }
            None => {
                trace!("timer disarmed");
                self.event_loop.disarm_timer();
            }
        }
    }

    fn on_socket(&mut self, socket: Socket, watch: Watch, token: usize) {
        let key = self.watch_key(socket, token);

        let interest = match watch {
            Watch::Read => Interest::READ,
            Watch::Write => Interest::WRITE,
            Watch::Both => Interest::BOTH,
            Watch::Remove => {
                if let Some(watch) = key.and_then(|key| self.watches.remove(key)) {
                    watch.release(&self.event_loop);
                    self.stats.sockets_removed += 1;
                    debug!(socket, "socket watch removed");
                }
                return;
            }
        };

        match key {
            Some(key) => {
                let Some(watch) = self.watches.get_mut(key) else {
                    return;
                };
                if let Err(err) = watch.rearm(&self.event_loop, key, interest) {
                    error!(socket, "socket watch re-arm failed: {}", err);
                }
            }
            None => self.add_watch(socket, interest),
        }
    }

    fn add_watch(&mut self, socket: Socket, interest: Interest) {
        let watch = SocketWatch::new(socket, interest);
        let key = self.watches.insert(watch);

        if let Err(err) = watch.register(&self.event_loop, key) {
            self.watches.remove(key);
            error!(socket, "socket watch registration failed: {}", err);
            return;
        }

        // Without the token later hook calls fall back to a scan.
        if let Err(err) = self.multi.assign(socket, key + 1) {
            warn!(socket, "socket token not stored: {}", err);
        }

        self.stats.sockets_added += 1;
        debug!(socket, key, ?interest, "socket watch added");
    }

    /// Finds the watch for `socket`. `token` is the slot value stored with
    /// [`Multi::assign`]: the watch key plus one, `0` when unset.
    fn watch_key(&self, socket: Socket, token: usize) -> Option<usize> {
        let assigned = token
            .checked_sub(1)
            .filter(|&key| self.watches.get(key).is_some_and(|watch| watch.socket == socket));
        if assigned.is_some() {
            return assigned;
        }

        self.watches
            .iter()
            .find(|(_, watch)| watch.socket == socket)
            .map(|(key, _)| key)
    }

    /// Drains the completion queue until it stays empty. One action can
    /// finish several transfers.
    fn reconcile(&mut self) {
        loop {
            let mut finished = Vec::new();
            self.multi.messages(|message| {
                if let (Ok(token), Some(result)) = (message.token(), message.result()) {
                    finished.push((token, result));
                }
            });

            if finished.is_empty() {
                break;
            }

            for (key, result) in finished {
                self.complete(key, result);
            }

            self.process_signals();
        }
    }

    fn complete(&mut self, key: usize, mut result: std::result::Result<(), curl::Error>) {
        let Some(mut easy) = self.detach(key) else {
            warn!(id = %TransferId(key), "completion for unknown transfer");
            return;
        };

        if let Err(err) = &mut result {
            if let Some(detail) = easy.take_error_buf() {
                err.set_extra(detail);
            }
        }

        let completion = Completion {
            id: TransferId(key),
            result,
            response_code: easy.response_code().unwrap_or(0),
            effective_url: easy.effective_url().ok().flatten().map(str::to_owned),
        };

        if !completion.is_success() {
            self.stats.request_failed();
        }
        self.stats.response(completion.response_code);

        debug!(
            id = %completion.id,
            code = completion.code(),
            status = completion.response_code,
            "transfer complete"
        );

        easy.get_mut().finish(&completion);
    }

    /// Takes a transfer out of the multiplexer and the arena.
    fn detach(&mut self, key: usize) -> Option<curl::easy::Easy2<Transfer>> {
        let handle = self.transfers.remove(key)?;
        self.stats.request_detached();

        match self.multi.remove2(handle) {
            Ok(easy) => Some(easy),
            Err(err) => {
                error!(id = %TransferId(key), "detach failed: {}", err);
                None
            }
        }
    }

    fn teardown(&mut self) -> Stats {
        if self.closed {
            return self.stats;
        }
        self.closed = true;

        let keys: Vec<usize> = self.transfers.iter().map(|(key, _)| key).collect();
        for key in keys {
            // Dropping the handle releases the host callbacks.
            drop(self.detach(key));
        }
        self.process_signals();

        for (_, watch) in self.watches.drain() {
            watch.release(&self.event_loop);
            self.stats.sockets_removed += 1;
        }
        self.event_loop.disarm_timer();

        debug!(stats = %self.stats, "engine torn down");
        self.stats
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("watches", &self.watches.len())
            .field("transfers", &self.transfers.len())
            .field("running", &self.running)
            .field("timer_armed", &self.event_loop.timer_armed())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::callback::{Callbacks, Capability};
    use std::any::Any;
    use std::cell::Cell;
    use std::os::unix::io::AsRawFd;
    use std::os::unix::net::UnixStream;
    use std::rc::Rc;

    #[test]
    fn create_and_destroy() {
        let engine = Engine::new().expect("engine");
        assert!(engine.is_idle());

        let stats = engine.destroy();
        assert_eq!(stats, Stats::default());
    }

    #[test]
    fn teardown_runs_once() {
        let mut engine = Engine::new().expect("engine");
        let (_left, right) = UnixStream::pair().expect("socketpair");
        engine.on_socket(right.as_raw_fd(), Watch::Read, 0);

        let first = engine.teardown();
        let second = engine.teardown();

        assert_eq!(first.sockets_removed, 1);
        assert_eq!(first, second);
    }

    #[test]
    fn poll_counts_loop_calls() {
        let mut engine = Engine::new().expect("engine");
        for _ in 0..3 {
            engine.poll().expect("poll");
        }
        assert_eq!(engine.stats().loop_calls, 3);
    }

    #[test]
    fn zero_deadline_runs_a_timeout_pass_on_next_poll() {
        let mut engine = Engine::new().expect("engine");

        engine.on_deadline(Some(Duration::ZERO));
        assert!(engine.event_loop.timer_armed());

        engine.poll().expect("poll");
        assert!(!engine.event_loop.timer_armed());
    }

    #[test]
    fn zero_deadline_drives_a_pending_transfer() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let url = format!("http://{}/", listener.local_addr().expect("addr"));

        let mut engine = Engine::new().expect("engine");
        let conn = engine.connection().expect("connection");
        engine
            .start_request(conn, &url, "GET", &StartOptions::new())
            .expect("start");

        // Nothing has touched the transfer yet.
        assert_eq!(engine.running, 0);
        assert_eq!(engine.stats().sockets_added, 0);

        engine.on_deadline(Some(Duration::ZERO));
        engine.poll().expect("poll");

        // The timeout action started the transfer: it runs and owns a socket.
        assert_eq!(engine.running, 1);
        assert_eq!(engine.stats().sockets_added, 1);
        assert_eq!(engine.watches.len(), 1);

        let stats = engine.destroy();
        assert_eq!(stats.sockets_added, stats.sockets_removed);
    }

    #[test]
    fn cancelled_deadline_never_fires() {
        let mut engine = Engine::new().expect("engine");

        engine.on_deadline(Some(Duration::from_millis(1)));
        engine.on_deadline(None);
        std::thread::sleep(Duration::from_millis(5));

        assert!(!engine.event_loop.fire_expired_timer());
    }

    #[test]
    fn socket_watch_add_rearm_remove() {
        let mut engine = Engine::new().expect("engine");
        let (_left, right) = UnixStream::pair().expect("socketpair");
        let socket = right.as_raw_fd();

        engine.on_socket(socket, Watch::Read, 0);
        assert_eq!(engine.stats().sockets_added, 1);
        assert_eq!(engine.watches.len(), 1);

        // A second interest change for the same socket re-arms in place.
        engine.on_socket(socket, Watch::Both, 0);
        engine.on_socket(socket, Watch::Write, 1);
        assert_eq!(engine.stats().sockets_added, 1);
        assert_eq!(engine.watches.len(), 1);
        let (_, watch) = engine.watches.iter().next().expect("watch");
        assert_eq!(watch.interest, Interest::WRITE);

        engine.on_socket(socket, Watch::Remove, 1);
        engine.on_socket(socket, Watch::Remove, 1);
        assert_eq!(engine.stats().sockets_removed, 1);
        assert!(engine.watches.is_empty());
    }

    #[test]
    fn stale_token_falls_back_to_the_socket() {
        let mut engine = Engine::new().expect("engine");
        let (_a, b) = UnixStream::pair().expect("socketpair");
        let (_c, d) = UnixStream::pair().expect("socketpair");

        engine.on_socket(b.as_raw_fd(), Watch::Read, 0);
        engine.on_socket(d.as_raw_fd(), Watch::Read, 0);

        // Token 1 names b's watch; it must not be used for d.
        engine.on_socket(d.as_raw_fd(), Watch::Remove, 1);

        assert_eq!(engine.stats().sockets_removed, 1);
        let (_, left) = engine.watches.iter().next().expect("watch");
        assert_eq!(left.socket, b.as_raw_fd());
    }

    #[test]
    fn readiness_for_a_removed_watch_is_ignored() {
        let mut engine = Engine::new().expect("engine");
        let (_left, right) = UnixStream::pair().expect("socketpair");
        let socket = right.as_raw_fd();

        engine.on_socket(socket, Watch::Write, 0);
        engine.on_socket(socket, Watch::Remove, 0);

        engine.on_ready(Readiness {
            socket,
            key: 0,
            readable: false,
            writable: true,
            error: false,
        });
        assert_eq!(engine.running, 0);
        assert_eq!(engine.stats().sockets_removed, 1);
    }

    #[test]
    fn unsupported_method_is_not_counted() {
        let mut engine = Engine::new().expect("engine");
        let conn = engine.connection().expect("connection");

        let err = engine
            .start_request(conn, "http://127.0.0.1:1/", "PATCH", &StartOptions::new())
            .expect_err("PATCH");

        assert!(matches!(err, Error::UnsupportedMethod(_)));
        assert_eq!(engine.stats().total_requests, 0);
        assert_eq!(engine.stats().failed_requests, 0);
    }

    #[test]
    fn destroy_releases_in_flight_callbacks_without_done() {
        let released = Rc::new(Cell::new(0));
        let done_calls = Rc::new(Cell::new(0));

        let mut engine = Engine::new().expect("engine");
        let mut conn = engine.connection().expect("connection");
        let counter = released.clone();
        conn.set_callbacks(Callbacks::new().context(Capability::<dyn Any>::with_release(
            Box::new(()),
            move || counter.set(counter.get() + 1),
        )));
        let calls = done_calls.clone();
        conn.on_done(move |_, _| {
            calls.set(calls.get() + 1);
            Ok(())
        });

        // Nothing listens on port 1; the transfer is never polled anyway.
        engine
            .start_request(conn, "http://127.0.0.1:1/", "GET", &StartOptions::new())
            .expect("start");
        assert_eq!(engine.stats().active_requests, 1);

        let stats = engine.destroy();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.active_requests, 0);
        assert_eq!(released.get(), 1);
        assert_eq!(done_calls.get(), 0);
    }
}
