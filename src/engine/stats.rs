//! Aggregate engine counters.
//!
//! Mutated only from the engine's own thread (socket hooks, start path and
//! completion reconciliation), so they are plain integers. Callers get copies.

use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Transfers successfully handed to the multiplexer.
    pub total_requests: u64,
    /// Transfers currently attached to the multiplexer.
    pub active_requests: u64,
    pub sockets_added: u64,
    pub sockets_removed: u64,
    pub http_200_responses: u64,
    /// Every completion whose status was not 200, including failed ones.
    pub http_other_responses: u64,
    /// Setup failures plus transfers that completed with a protocol error.
    pub failed_requests: u64,
    pub loop_calls: u64,
}

impl Stats {
    pub(crate) fn request_started(&mut self) {
        self.total_requests += 1;
        self.active_requests += 1;
    }

    pub(crate) fn request_detached(&mut self) {
        self.active_requests = self.active_requests.saturating_sub(1);
    }

    pub(crate) fn request_failed(&mut self) {
        self.failed_requests += 1;
    }

    pub(crate) fn response(&mut self, status: u32) {
        if status == 200 {
            self.http_200_responses += 1;
        } else {
            self.http_other_responses += 1;
        }
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "active_requests = {}, sockets_added = {}, sockets_removed = {}, \
             loop_calls = {}, total_requests = {}, failed_requests = {}, \
             http_200_responses = {}, http_other_responses = {}",
            self.active_requests,
            self.sockets_added,
            self.sockets_removed,
            self.loop_calls,
            self.total_requests,
            self.failed_requests,
            self.http_200_responses,
            self.http_other_responses,
        )
    }
}
