//! Asynchronous HTTP transfers on a single-threaded readiness event loop.
//!
//! The crate drives many concurrent HTTP requests through one libcurl multi
//! handle, without a thread per request. The host creates an [`Engine`],
//! starts [`Connection`]s on it and pumps it with [`Engine::poll`] (or one of
//! its blocking variants) until the transfers it cares about are done.
//!
//! # Architecture
//!
//! - **Engine**: owns the multiplexer, the event loop, the watches and the stats
//! - **SocketWatch**: event-loop registration for one socket the multiplexer uses
//! - **EventLoop**: epoll registrations plus a single re-poll timer
//! - **Connection**: one request: protocol handle, header list, host callbacks
//! - **Stats**: counters read by the host at any time
//! - **EngineBuilder**: fluent configuration for engine instantiation
//!
//! # Example
//! ```ignore
//! let mut engine = Engine::new()?;
//! let mut conn = engine.connection()?;
//! conn.on_write(|chunk, _| Ok(chunk.len()));
//! engine.start_request(conn, "http://127.0.0.1:8080/", "GET", &StartOptions::new())?;
//! engine.run_until_idle(Duration::from_millis(50))?;
//! println!("{}", engine.stats());
//! ```

mod builder;
mod connection;
mod engine;
mod error;
mod reactor;
mod timer;
mod utils;

pub use builder::{DEFAULT_MAX_CONNECTIONS, EngineBuilder};
pub use connection::callback::{Callbacks, Capability, DoneFn, ReadFn, WriteFn};
pub use connection::completion::{Completion, Outcome, TransferId};
pub use connection::options::StartOptions;
pub use connection::{Connection, Method};
pub use engine::{Engine, Stats};
pub use error::{CallbackError, Error, Result};

/// Versions of this crate and of the libcurl it is linked against.
pub fn version() -> String {
    format!(
        "curl-reactor: {}, curl: {}",
        env!("CARGO_PKG_VERSION"),
        curl::Version::get().version()
    )
}
