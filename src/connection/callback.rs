//! Host callback capabilities.
//!
//! A [`Capability`] is an opaque reference into whatever registry the host
//! keeps its callbacks in. The engine only ever invokes it and, when the
//! owning connection is destroyed, releases it. Release happens exactly once.

use crate::connection::completion::Completion;
use crate::error::CallbackError;

use std::any::Any;
use std::fmt;

/// Produces up to `requested` bytes of request body. An empty buffer ends the body.
pub type ReadFn = dyn FnMut(usize, &mut dyn Any) -> Result<Vec<u8>, CallbackError>;

/// Consumes one chunk of response body and reports how many bytes it accepted.
pub type WriteFn = dyn FnMut(&[u8], &mut dyn Any) -> Result<usize, CallbackError>;

/// Observes the final outcome of a transfer.
pub type DoneFn = dyn FnMut(&Completion, &mut dyn Any) -> Result<(), CallbackError>;

pub struct Capability<T: ?Sized> {
    target: Box<T>,
    release: Option<Box<dyn FnOnce()>>,
}

impl<T: ?Sized> Capability<T> {
    pub fn new(target: Box<T>) -> Self {
        Self {
            target,
            release: None,
        }
    }

    /// Wraps a registry reference whose `release` hook must run when the
    /// engine drops it.
    pub fn with_release(target: Box<T>, release: impl FnOnce() + 'static) -> Self {
        Self {
            target,
            release: Some(Box::new(release)),
        }
    }

    pub(crate) fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }
}

impl<T: ?Sized> Drop for Capability<T> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl<T: ?Sized> fmt::Debug for Capability<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("releasable", &self.release.is_some())
            .finish()
    }
}

/// The read/write/done triple plus the opaque context handed to each of them.
/// Every slot starts out empty.
#[derive(Debug, Default)]
pub struct Callbacks {
    pub(crate) read: Option<Capability<ReadFn>>,
    pub(crate) write: Option<Capability<WriteFn>>,
    pub(crate) done: Option<Capability<DoneFn>>,
    pub(crate) context: Option<Capability<dyn Any>>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(mut self, read: Capability<ReadFn>) -> Self {
        self.read = Some(read);
        self
    }

    pub fn write(mut self, write: Capability<WriteFn>) -> Self {
        self.write = Some(write);
        self
    }

    pub fn done(mut self, done: Capability<DoneFn>) -> Self {
        self.done = Some(done);
        self
    }

    pub fn context(mut self, context: Capability<dyn Any>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn has_read(&self) -> bool {
        self.read.is_some()
    }

    pub fn has_write(&self) -> bool {
        self.write.is_some()
    }

    pub fn has_done(&self) -> bool {
        self.done.is_some()
    }
}
