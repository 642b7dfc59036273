use crate::reactor::event::{Interest, Readiness};
use crate::reactor::poller::Poller;
use crate::timer::Timer;

use std::io;
use std::os::unix::io::RawFd;
use std::time::{Duration, Instant};

/// Readiness-driven event loop: socket registrations plus one re-poll timer.
///
/// The loop itself never calls back into the engine. A turn reports which
/// registered sockets are ready, and the caller asks afterwards whether the
/// timer expired, so dispatch always happens with the loop unborrowed.
pub(crate) struct EventLoop {
    poller: Poller,
    timer: Timer,
}

impl EventLoop {
    pub(crate) fn new() -> io::Result<Self> {
        Ok(Self {
            poller: Poller::new()?,
            timer: Timer::new(),
        })
    }

    pub(crate) fn register(&self, socket: RawFd, key: usize, interest: Interest) -> io::Result<()> {
        self.poller.register(socket, key, interest)
    }

    pub(crate) fn deregister(&self, socket: RawFd) -> io::Result<()> {
        self.poller.deregister(socket)
    }

    pub(crate) fn arm_timer(&mut self, after: Duration) {
        self.timer.arm(after);
    }

    pub(crate) fn disarm_timer(&mut self) {
        self.timer.disarm();
    }

    pub(crate) fn timer_armed(&self) -> bool {
        self.timer.is_armed()
    }

    /// Runs one pass over the readiness primitive.
    ///
    /// With `wait == None` the pass never blocks. Otherwise it blocks for at
    /// most `wait`, cut short by the timer deadline when one is armed.
    pub(crate) fn turn(
        &mut self,
        wait: Option<Duration>,
        ready: &mut Vec<Readiness>,
    ) -> io::Result<usize> {
        let timeout = match (wait, self.timer.remaining(Instant::now())) {
            (None, _) => Duration::ZERO,
            (Some(wait), Some(remaining)) => wait.min(remaining),
            (Some(wait), None) => wait,
        };

        self.poller.poll(ready, timeout)
    }

    /// Disarms and reports the timer if its deadline has passed.
    pub(crate) fn fire_expired_timer(&mut self) -> bool {
        self.timer.fire_expired(Instant::now())
    }
}
