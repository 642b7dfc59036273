//! Per-request connection objects.
//!
//! A [`Connection`] owns one protocol handle from the transfer library, the
//! request header list and the host callbacks. It is configured freely until
//! it is handed to [`Engine::start`](crate::Engine::start); from then on the
//! engine owns it until the transfer completes or the engine is torn down.

pub mod callback;
pub mod completion;
pub(crate) mod handler;
pub mod options;

use crate::connection::callback::{Callbacks, Capability, DoneFn, ReadFn, WriteFn};
use crate::connection::completion::Completion;
use crate::connection::handler::Transfer;
use crate::connection::options::StartOptions;
use crate::error::{CallbackError, Error, Result};

use curl::easy::{Easy2, HttpVersion, List};
use std::any::Any;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Request methods the engine knows how to set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(method: &str) -> Result<Self> {
        match method {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            other => Err(Error::UnsupportedMethod(other.to_owned())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        })
    }
}

pub struct Connection {
    easy: Easy2<Transfer>,
    headers: List,
    method: Option<Method>,
}

impl Connection {
    pub(crate) fn new() -> Result<Self> {
        let mut easy = Easy2::new(Transfer::new());

        easy.progress(false)?;
        easy.follow_location(true)?;
        easy.ssl_verify_peer(true)?;

        Ok(Self {
            easy,
            headers: List::new(),
            method: None,
        })
    }

    pub fn set_url(&mut self, url: &str) -> Result<()> {
        self.easy.url(url)?;
        Ok(())
    }

    /// Selects the request method. POST and PUT also ask for any content
    /// type. Anything else is rejected before touching the handle.
    pub fn set_method(&mut self, method: &str) -> Result<Method> {
        let method: Method = method.parse()?;

        match method {
            Method::Get => self.easy.get(true)?,
            Method::Post => {
                self.push_header("Accept: */*")?;
                self.easy.post(true)?;
            }
            Method::Put => {
                self.push_header("Accept: */*")?;
                self.easy.upload(true)?;
            }
        }

        self.method = Some(method);
        Ok(method)
    }

    pub fn add_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.push_header(&format!("{name}: {value}"))
    }

    /// Request headers collected so far, in the order they will be sent.
    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.headers
            .iter()
            .filter_map(|header| std::str::from_utf8(header).ok())
    }

    pub fn set_ca_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.easy.capath(path)?;
        Ok(())
    }

    pub fn set_ca_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.easy.cainfo(path)?;
        Ok(())
    }

    /// Streams the request body: called with the number of bytes wanted,
    /// answers with at most that many. An empty answer ends the body.
    pub fn on_read<F>(&mut self, read: F) -> &mut Self
    where
        F: FnMut(usize, &mut dyn Any) -> std::result::Result<Vec<u8>, CallbackError> + 'static,
    {
        self.callbacks_mut().read = Some(Capability::<ReadFn>::new(Box::new(read)));
        self
    }

    /// Receives the response body chunk by chunk. Reporting fewer bytes than
    /// offered aborts the transfer.
    pub fn on_write<F>(&mut self, write: F) -> &mut Self
    where
        F: FnMut(&[u8], &mut dyn Any) -> std::result::Result<usize, CallbackError> + 'static,
    {
        self.callbacks_mut().write = Some(Capability::<WriteFn>::new(Box::new(write)));
        self
    }

    pub fn on_done<F>(&mut self, done: F) -> &mut Self
    where
        F: FnMut(&Completion, &mut dyn Any) -> std::result::Result<(), CallbackError> + 'static,
    {
        self.callbacks_mut().done = Some(Capability::<DoneFn>::new(Box::new(done)));
        self
    }

    pub fn with_context<T: Any>(&mut self, context: T) -> &mut Self {
        self.callbacks_mut().context = Some(Capability::<dyn Any>::new(Box::new(context)));
        self
    }

    /// Replaces every callback slot at once. References held by the previous
    /// set are released.
    pub fn set_callbacks(&mut self, callbacks: Callbacks) -> &mut Self {
        *self.callbacks_mut() = callbacks;
        self
    }

    fn callbacks_mut(&mut self) -> &mut Callbacks {
        &mut self.easy.get_mut().callbacks
    }

    fn push_header(&mut self, line: &str) -> Result<()> {
        self.headers.append(line).map_err(Error::from)
    }

    /// Applies start options: keep-alive policy headers first, then every
    /// option that was explicitly set.
    pub(crate) fn apply(&mut self, options: &StartOptions) -> Result<()> {
        match options.keepalive_policy() {
            Some((idle, interval)) => {
                self.easy.tcp_keepalive(true)?;
                self.easy.tcp_keepidle(idle)?;
                self.easy.tcp_keepintvl(interval)?;

                self.push_header("Connection: Keep-Alive")?;
                self.push_header(&format!("Keep-Alive: timeout={}", idle.as_secs()))?;
            }
            None => self.push_header("Connection: close")?,
        }

        if let Some(max) = options.max_connections {
            self.easy.max_connects(max)?;
        }
        if let Some(timeout) = options.read_timeout {
            self.easy.timeout(timeout)?;
        }
        if let Some(timeout) = options.connect_timeout {
            self.easy.connect_timeout(timeout)?;
        }
        if let Some(timeout) = options.dns_cache_timeout {
            self.easy.dns_cache_timeout(timeout)?;
        }
        if let Some(limit) = options.low_speed_limit {
            self.easy.low_speed_limit(limit)?;
        }
        if let Some(time) = options.low_speed_time {
            self.easy.low_speed_time(time)?;
        }
        if options.verbose {
            self.easy.verbose(true)?;
        }

        self.easy.http_version(HttpVersion::V11)?;

        Ok(())
    }

    /// True for a POST or PUT that has nothing to stream as its body.
    pub(crate) fn sends_empty_body(&self) -> bool {
        matches!(self.method, Some(Method::Post | Method::Put))
            && !self.easy.get_ref().callbacks.has_read()
    }

    /// Hands the header list to the protocol handle and gives the handle up.
    /// Headers must be attached right before the multiplexer takes over.
    pub(crate) fn into_easy(self) -> Result<Easy2<Transfer>> {
        let empty_body = self.sends_empty_body();
        let Connection {
            mut easy,
            headers,
            method,
        } = self;

        // A declared zero size keeps the library from asking for body bytes.
        if empty_body {
            match method {
                Some(Method::Put) => easy.in_filesize(0)?,
                _ => easy.post_field_size(0)?,
            }
        }

        if headers.iter().next().is_some() {
            easy.http_headers(headers)?;
        }

        Ok(easy)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("headers", &self.headers().collect::<Vec<_>>())
            .field("callbacks", &self.easy.get_ref().callbacks)
            .finish()
    }
}
