//! Operating-system readiness primitive. Only epoll is implemented.

mod epoll;

pub(crate) use epoll::EpollPoller as Poller;
