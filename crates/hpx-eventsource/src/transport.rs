//! The HTTP seam between the event source and the network.
//!
//! An [`EventSource`](crate::EventSource) only needs "send this GET, give
//! me the status, headers and a byte stream". [`Connector`] captures that
//! contract; [`HyperConnector`] is the default plain HTTP/1.1
//! implementation. Plug in your own connector for TLS, proxies or tests.

use std::{fmt, pin::Pin, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt, TryStreamExt};
use http_body_util::{BodyExt, Empty};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};

use crate::error::BoxError;

/// Response body as a stream of byte chunks.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send>>;

/// Issues one streaming request per connection attempt.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Send `request` and resolve once response headers are available.
    ///
    /// Errors are treated as transient: the event source schedules a
    /// reconnect.
    async fn connect(&self, request: http::Request<()>)
    -> Result<http::Response<BodyStream>, BoxError>;
}

/// Default [`Connector`] built on the `hyper-util` legacy client.
///
/// Speaks plain HTTP/1.1 only; `https` URLs need a custom connector.
#[derive(Clone)]
pub struct HyperConnector {
    client: Client<HttpConnector, Empty<Bytes>>,
}

impl HyperConnector {
    /// Create a connector without a TCP connect timeout.
    pub fn new() -> Self {
        Self::with_connect_timeout(None)
    }

    /// Create a connector whose TCP connect is bounded by `timeout`.
    pub fn with_connect_timeout(timeout: Option<Duration>) -> Self {
        let mut http = HttpConnector::new();
        http.set_connect_timeout(timeout);
        http.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new()).build(http);
        Self { client }
    }
}

impl Default for HyperConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HyperConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperConnector").finish_non_exhaustive()
    }
}

#[async_trait]
impl Connector for HyperConnector {
    async fn connect(
        &self,
        request: http::Request<()>,
    ) -> Result<http::Response<BodyStream>, BoxError> {
        let response = self.client.request(request.map(|()| Empty::new())).await?;
        Ok(response.map(|body| {
            body.into_data_stream()
                .map_err(BoxError::from)
                .boxed()
        }))
    }
}
