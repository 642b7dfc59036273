use std::fmt;

/// Key of an in-flight transfer, returned by [`Engine::start`](crate::Engine::start).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferId(pub(crate) usize);

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Final state of a transfer, handed to the done callback.
#[derive(Debug, Clone)]
pub struct Completion {
    pub id: TransferId,
    /// Protocol result as reported by the transfer library.
    pub result: Result<(), curl::Error>,
    /// HTTP status of the last response, `0` when none was received.
    pub response_code: u32,
    pub effective_url: Option<String>,
}

/// What the done callback receives in the status-or-error position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Status(u32),
    Error(String),
}

impl Completion {
    /// The library's result code, `0` on success.
    pub fn code(&self) -> i32 {
        match &self.result {
            Ok(()) => 0,
            Err(err) => err.code() as i32,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn outcome(&self) -> Outcome {
        match &self.result {
            Ok(()) => Outcome::Status(self.response_code),
            Err(err) => Outcome::Error(error_message(err)),
        }
    }
}

// Prefer the handle's error buffer text, it names the host or the timeout.
fn error_message(err: &curl::Error) -> String {
    match err.extra_description() {
        Some(extra) if !extra.is_empty() => format!("{}: {}", err.description(), extra),
        _ => err.description().to_owned(),
    }
}
