use std::io;

/// Errors produced by the transfer engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An owned resource could not be allocated. Engine state is untouched
    /// and the caller may retry later.
    #[error("can't allocate {0}")]
    Allocation(&'static str),

    /// The request method is not one of GET, POST or PUT.
    #[error("method {0:?} is not supported")]
    UnsupportedMethod(String),

    /// The multiplexer refused to take over a transfer.
    #[error("multiplexer error: {0}")]
    Multiplexer(#[from] curl::MultiError),

    /// A transfer option was rejected by the protocol handle.
    #[error("transfer option rejected: {0}")]
    Transfer(curl::Error),

    /// The event loop's readiness primitive failed.
    #[error("event loop error: {0}")]
    Io(#[from] io::Error),
}

impl From<curl::Error> for Error {
    fn from(err: curl::Error) -> Self {
        if err.is_out_of_memory() {
            Error::Allocation("transfer option")
        } else {
            Error::Transfer(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a host callback. The engine logs it and turns it into
/// the benign outcome for the trampoline that invoked the callback.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct CallbackError(pub String);

impl From<&str> for CallbackError {
    fn from(message: &str) -> Self {
        CallbackError(message.to_owned())
    }
}

impl From<String> for CallbackError {
    fn from(message: String) -> Self {
        CallbackError(message)
    }
}
