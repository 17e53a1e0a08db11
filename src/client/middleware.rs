// File: ./src/client/middleware.rs
//! Request middleware chain.
//!
//! Every outbound request walks an ordered list of [`Middleware`]. Each one
//! gets the request by value plus a [`Next`] continuation, may change the
//! request, must call `next.run(req)` exactly once to send it on, and may
//! inspect or replace the response on the way back. The end of the chain is
//! the transport.
use crate::client::error::ApiError;
use crate::client::transport::Transport;
use bytes::Bytes;
use futures::future::BoxFuture;
use http::header::{HeaderName, HeaderValue};
use http::{Request, Response};
use std::fmt;
use std::sync::Arc;

pub type MiddlewareResult = Result<Response<Bytes>, ApiError>;

/// Header that makes ngrok skip its browser interstitial page.
pub const TUNNEL_BYPASS_HEADER: &str = "ngrok-skip-browser-warning";

pub trait Middleware: Send + Sync + fmt::Debug + 'static {
    fn handle(&self, req: Request<String>, next: Next) -> BoxFuture<'static, MiddlewareResult>;
}

/// The rest of the chain after the current middleware.
#[derive(Clone)]
pub struct Next {
    chain: Arc<[Arc<dyn Middleware>]>,
    index: usize,
    transport: Arc<dyn Transport>,
}

impl Next {
    pub(crate) fn new(chain: Arc<[Arc<dyn Middleware>]>, transport: Arc<dyn Transport>) -> Self {
        Self {
            chain,
            index: 0,
            transport,
        }
    }

    pub fn run(self, req: Request<String>) -> BoxFuture<'static, MiddlewareResult> {
        match self.chain.get(self.index).cloned() {
            Some(middleware) => {
                let next = Next {
                    index: self.index + 1,
                    ..self
                };
                middleware.handle(req, next)
            }
            None => self.transport.send(req),
        }
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.chain.len().saturating_sub(self.index))
            .finish()
    }
}

/// Sets a fixed list of headers on every request, replacing earlier values.
#[derive(Clone, Debug, Default)]
pub struct StaticHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl StaticHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// `ngrok-skip-browser-warning` with an empty value.
    pub fn tunnel_bypass() -> Self {
        Self::new().with_static(TUNNEL_BYPASS_HEADER, "")
    }

    pub fn with_static(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ));
        self
    }

    pub fn with(mut self, name: &str, value: &str) -> Result<Self, ApiError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ApiError::InvalidHeader(format!("{}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ApiError::InvalidHeader(format!("{}: {}", name, e)))?;
        self.headers.push((name, value));
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl Middleware for StaticHeaders {
    fn handle(&self, mut req: Request<String>, next: Next) -> BoxFuture<'static, MiddlewareResult> {
        for (name, value) in &self.headers {
            req.headers_mut().insert(name.clone(), value.clone());
        }
        next.run(req)
    }
}

/// Returns responses untouched. Sits at the end of the default chain as the
/// place where response normalization goes.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResponsePassThrough;

impl Middleware for ResponsePassThrough {
    fn handle(&self, req: Request<String>, next: Next) -> BoxFuture<'static, MiddlewareResult> {
        Box::pin(async move {
            let response = next.run(req).await?;
            log::debug!("Response {}", response.status());
            Ok(response)
        })
    }
}
