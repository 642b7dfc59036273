//! Read/write trampolines registered with the transfer library.
//!
//! The library calls into [`Transfer`] whenever it needs request body bytes or
//! has response bytes to hand over. Host callbacks run synchronously from
//! here; their errors and panics stop at this boundary and never unwind into
//! the library.

use crate::connection::callback::Callbacks;
use crate::connection::completion::Completion;

use curl::easy::{Handler, ReadError, WriteError};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{error, trace, warn};

pub(crate) struct Transfer {
    pub(crate) callbacks: Callbacks,
}

impl Transfer {
    pub(crate) fn new() -> Self {
        Self {
            callbacks: Callbacks::new(),
        }
    }

    /// Invokes the done callback, if any. Failures are logged and swallowed
    /// so sibling completions keep being reconciled.
    pub(crate) fn finish(&mut self, completion: &Completion) {
        let Callbacks { done, context, .. } = &mut self.callbacks;
        let Some(done) = done.as_mut() else {
            return;
        };

        let mut unit = ();
        let ctx: &mut dyn Any = match context.as_mut() {
            Some(context) => context.target_mut(),
            None => &mut unit,
        };

        match panic::catch_unwind(AssertUnwindSafe(|| (done.target_mut())(completion, ctx))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(id = %completion.id, "done callback failed: {}", err),
            Err(_) => error!(id = %completion.id, "done callback panicked"),
        }
    }
}

impl Handler for Transfer {
    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        trace!(bytes = data.len(), "write trampoline");

        let Callbacks { write, context, .. } = &mut self.callbacks;
        let Some(write) = write.as_mut() else {
            return Ok(data.len());
        };

        let mut unit = ();
        let ctx: &mut dyn Any = match context.as_mut() {
            Some(context) => context.target_mut(),
            None => &mut unit,
        };

        // Any count other than data.len() makes the library abort the transfer.
        match panic::catch_unwind(AssertUnwindSafe(|| (write.target_mut())(data, ctx))) {
            Ok(Ok(consumed)) => Ok(consumed),
            Ok(Err(err)) => {
                warn!("write callback failed: {}", err);
                Ok(0)
            }
            Err(_) => {
                error!("write callback panicked");
                Ok(0)
            }
        }
    }

    fn read(&mut self, data: &mut [u8]) -> Result<usize, ReadError> {
        trace!(requested = data.len(), "read trampoline");

        // Without a callback the offered buffer counts as filled. Bodyless
        // POST and PUT declare a zero size up front and are never asked.
        let Callbacks { read, context, .. } = &mut self.callbacks;
        let Some(read) = read.as_mut() else {
            return Ok(data.len());
        };

        let mut unit = ();
        let ctx: &mut dyn Any = match context.as_mut() {
            Some(context) => context.target_mut(),
            None => &mut unit,
        };

        let requested = data.len();
        match panic::catch_unwind(AssertUnwindSafe(|| (read.target_mut())(requested, ctx))) {
            Ok(Ok(bytes)) => {
                let n = bytes.len().min(requested);
                if n < bytes.len() {
                    warn!(
                        produced = bytes.len(),
                        requested, "read callback overran the buffer, truncating"
                    );
                }
                data[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Ok(Err(err)) => {
                warn!("read callback failed: {}", err);
                Err(ReadError::Abort)
            }
            Err(_) => {
                error!("read callback panicked");
                Err(ReadError::Abort)
            }
        }
    }
}
