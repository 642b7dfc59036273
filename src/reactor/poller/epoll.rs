use crate::reactor::event::{Event, Interest, Readiness};

use libc::{EINTR, EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, close, epoll_create1, epoll_ctl};
use std::io;
use std::os::unix::io::RawFd;
use std::ptr;
use std::time::Duration;

pub(crate) struct EpollPoller {
    epoll: RawFd,
    events: Vec<Event>,
}

const EVENTS_CAPACITY: usize = 64;

impl EpollPoller {
    pub fn new() -> io::Result<Self> {
        let epoll = unsafe { epoll_create1(EPOLL_CLOEXEC) };
        if epoll < 0 {
            return Err(io::Error::last_os_error());
        }

        let events = (0..EVENTS_CAPACITY).map(|_| Event::EMPTY).collect();

        Ok(EpollPoller { epoll, events })
    }

    pub fn register(&self, fd: RawFd, key: usize, interest: Interest) -> io::Result<()> {
        let mut event = Event::new(fd, key, interest);

        let ret = unsafe { epoll_ctl(self.epoll, EPOLL_CTL_ADD, fd, event.as_raw()) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    pub fn deregister(&self, fd: RawFd) -> io::Result<()> {
        let ret = unsafe { epoll_ctl(self.epoll, EPOLL_CTL_DEL, fd, ptr::null_mut()) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    /// Collects ready descriptors into `ready`. A zero `timeout` returns
    /// immediately; otherwise the call blocks for at most that long.
    pub fn poll(&mut self, ready: &mut Vec<Readiness>, timeout: Duration) -> io::Result<usize> {
        let timeout_ms = timeout_millis(timeout);

        let n = unsafe {
            libc::epoll_wait(
                self.epoll,
                self.events.as_mut_ptr() as *mut libc::epoll_event,
                self.events.len() as i32,
                timeout_ms,
            )
        };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(EINTR) {
                return Ok(0);
            }
            return Err(err);
        }

        let n = n as usize;
        ready.extend(self.events.iter().take(n).map(Event::readiness));

        Ok(n)
    }
}

impl Drop for EpollPoller {
    fn drop(&mut self) {
        unsafe { close(self.epoll) };
    }
}

// Rounds up so a sub-millisecond wait does not turn into a busy spin.
fn timeout_millis(timeout: Duration) -> i32 {
    if timeout.is_zero() {
        return 0;
    }

    let ms = timeout.as_nanos().div_ceil(1_000_000);
    ms.min(i32::MAX as u128) as i32
}
