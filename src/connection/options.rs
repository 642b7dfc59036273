//! Per-request transfer options.
//!
//! Every option is unset by default and only reaches the protocol handle when
//! explicitly given. An explicit zero is a real value: `read_timeout(ZERO)`
//! disables the library's timeout rather than leaving its default alone.

use std::time::Duration;

/// Options applied by [`Engine::start`](crate::Engine::start).
///
/// # Example
/// ```ignore
/// let options = StartOptions::new()
///     .keepalive(Duration::from_secs(120), Duration::from_secs(60))
///     .read_timeout(Duration::from_secs(2));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOptions {
    pub(crate) max_connections: Option<u32>,
    pub(crate) keepalive_idle: Option<Duration>,
    pub(crate) keepalive_interval: Option<Duration>,
    pub(crate) read_timeout: Option<Duration>,
    pub(crate) connect_timeout: Option<Duration>,
    pub(crate) dns_cache_timeout: Option<Duration>,
    pub(crate) low_speed_limit: Option<u32>,
    pub(crate) low_speed_time: Option<Duration>,
    pub(crate) verbose: bool,
}

impl StartOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size of the protocol handle's own connection cache.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = Some(max);
        self
    }

    /// TCP keep-alive probing. Only takes effect when both values are
    /// non-zero; otherwise the request asks the server to close the connection.
    pub fn keepalive(mut self, idle: Duration, interval: Duration) -> Self {
        self.keepalive_idle = Some(idle);
        self.keepalive_interval = Some(interval);
        self
    }

    pub fn keepalive_idle(mut self, idle: Duration) -> Self {
        self.keepalive_idle = Some(idle);
        self
    }

    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = Some(interval);
        self
    }

    /// Upper bound on the whole transfer.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Upper bound on the connect phase only.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn dns_cache_timeout(mut self, timeout: Duration) -> Self {
        self.dns_cache_timeout = Some(timeout);
        self
    }

    /// Abort when fewer than `bytes_per_sec` flow for the low-speed time.
    pub fn low_speed_limit(mut self, bytes_per_sec: u32) -> Self {
        self.low_speed_limit = Some(bytes_per_sec);
        self
    }

    pub fn low_speed_time(mut self, time: Duration) -> Self {
        self.low_speed_time = Some(time);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// `(idle, interval)` for keep-alive probing, present only when both are
    /// set and non-zero.
    pub(crate) fn keepalive_policy(&self) -> Option<(Duration, Duration)> {
        match (self.keepalive_idle, self.keepalive_interval) {
            (Some(idle), Some(interval)) if !idle.is_zero() && !interval.is_zero() => {
                Some((idle, interval))
            }
            _ => None,
        }
    }
}
