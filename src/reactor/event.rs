use libc::{EPOLLERR, EPOLLHUP, EPOLLIN, EPOLLOUT, EPOLLRDHUP, epoll_event};
use std::os::unix::io::RawFd;

/// What a watched socket should be polled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest {
    pub read: bool,
    pub write: bool,
}

impl Interest {
    pub const READ: Self = Self {
        read: true,
        write: false,
    };
    pub const WRITE: Self = Self {
        read: false,
        write: true,
    };
    pub const BOTH: Self = Self {
        read: true,
        write: true,
    };

    pub(crate) fn epoll_flags(self) -> u32 {
        let mut flags = 0;
        if self.read {
            flags |= EPOLLIN as u32;
        }
        if self.write {
            flags |= EPOLLOUT as u32;
        }
        flags
    }
}

/// One readiness report for a registered descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Readiness {
    pub(crate) socket: RawFd,
    pub(crate) key: usize,
    pub(crate) readable: bool,
    pub(crate) writable: bool,
    pub(crate) error: bool,
}

#[repr(transparent)]
pub(crate) struct Event(epoll_event);

impl Event {
    pub(crate) const EMPTY: Self = Self(epoll_event { events: 0, u64: 0 });

    /// Packs the descriptor next to the arena key so a report for a socket
    /// whose key was reused in the same pass can be told apart.
    pub(crate) fn new(socket: RawFd, key: usize, interest: Interest) -> Self {
        Self(epoll_event {
            events: interest.epoll_flags(),
            u64: pack(socket, key),
        })
    }

    pub(crate) fn as_raw(&mut self) -> *mut epoll_event {
        &mut self.0
    }

    pub(crate) fn readiness(&self) -> Readiness {
        let flags = self.0.events;
        let (socket, key) = unpack(self.0.u64);

        // Bits are tested independently: write-only readiness stays write-only.
        let readable = flags & (EPOLLIN | EPOLLHUP | EPOLLRDHUP) as u32 != 0;
        let writable = flags & EPOLLOUT as u32 != 0;
        let error = flags & EPOLLERR as u32 != 0;

        Readiness {
            socket,
            key,
            readable,
            writable,
            error,
        }
    }
}

fn pack(socket: RawFd, key: usize) -> u64 {
    ((socket as u32 as u64) << 32) | (key as u32 as u64)
}

fn unpack(data: u64) -> (RawFd, usize) {
    ((data >> 32) as u32 as RawFd, (data & u32::MAX as u64) as usize)
}
