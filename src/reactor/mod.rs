//! Event-driven readiness reactor.
//!
//! This module provides the event loop the engine pumps, built on epoll.
//! It includes:
//! - [`core`]: the event loop (registrations plus the re-poll timer)
//! - [`event`]: epoll event wrappers and interest masks
//! - `poller`: the raw readiness primitive

pub(crate) mod core;
pub(crate) mod event;
mod poller;
