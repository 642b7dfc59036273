//! Fluent builder for [`Engine`] construction.

use crate::engine::Engine;
use crate::error::Result;

/// Connection-cache size used when none is given.
pub const DEFAULT_MAX_CONNECTIONS: usize = 5;

/// Builder for constructing [`Engine`] instances.
///
/// # Example
/// ```ignore
/// let engine = EngineBuilder::new()
///     .max_connections(16)
///     .pipelining(true)
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    max_connections: Option<usize>,
    pipelining: bool,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            max_connections: Some(DEFAULT_MAX_CONNECTIONS),
            pipelining: false,
        }
    }

    /// Upper bound on connections the multiplexer keeps open in its cache.
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = Some(max);
        self
    }

    /// Leaves the connection-cache size to the transfer library.
    pub fn library_max_connections(mut self) -> Self {
        self.max_connections = None;
        self
    }

    /// Lets transfers to the same host share one connection.
    pub fn pipelining(mut self, enabled: bool) -> Self {
        self.pipelining = enabled;
        self
    }

    /// Creates the event loop and the multiplexer and wires them together.
    ///
    /// Fails with [`Error::Allocation`](crate::Error::Allocation) when either
    /// cannot be allocated.
    pub fn build(self) -> Result<Engine> {
        Engine::with_config(self.max_connections, self.pipelining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let builder = EngineBuilder::new();
        assert_eq!(builder.max_connections, Some(DEFAULT_MAX_CONNECTIONS));
        assert!(!builder.pipelining);
    }

    #[test]
    fn builds_with_custom_settings() {
        let engine = EngineBuilder::new()
            .max_connections(1)
            .pipelining(true)
            .build()
            .expect("engine");
        assert!(engine.is_idle());

        let engine = EngineBuilder::new()
            .library_max_connections()
            .build()
            .expect("engine");
        assert_eq!(engine.destroy().loop_calls, 0);
    }
}
