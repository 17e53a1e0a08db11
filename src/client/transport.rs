// File: ./src/client/transport.rs
//! The bottom of the request chain: something that turns a request into a
//! fully read response.
use crate::client::error::ApiError;
use crate::client::redirect::FollowRedirectLayer;
use bytes::Bytes;
use futures::future::BoxFuture;
use http::header::{HeaderValue, USER_AGENT};
use http::{Request, Response};
use http_body_util::BodyExt;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::set_header::SetRequestHeaderLayer;
use tower_service::Service;

pub const DEFAULT_USER_AGENT: &str = concat!("appshell/", env!("CARGO_PKG_VERSION"));

pub trait Transport: Send + Sync {
    fn send(&self, req: Request<String>) -> BoxFuture<'static, Result<Response<Bytes>, ApiError>>;
}

/// Adapts any cloneable tower service into a [`Transport`]. Each send works
/// on its own clone of the service.
#[derive(Clone, Debug)]
pub struct ServiceTransport<S> {
    service: S,
}

impl<S> ServiceTransport<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

impl<S> Transport for ServiceTransport<S>
where
    S: Service<Request<String>, Response = Response<Bytes>, Error = ApiError>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
{
    fn send(&self, req: Request<String>) -> BoxFuture<'static, Result<Response<Bytes>, ApiError>> {
        Box::pin(self.service.clone().oneshot(req))
    }
}

#[derive(Clone, Debug)]
pub struct TransportOptions {
    pub max_redirects: usize,
    pub user_agent: String,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            max_redirects: 20,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

fn tls_config() -> rustls::ClientConfig {
    let mut root_store = rustls::RootCertStore::empty();

    #[cfg(not(target_os = "android"))]
    {
        let result = rustls_native_certs::load_native_certs();
        for e in &result.errors {
            log::warn!("Skipping unreadable system certificate: {}", e);
        }
        root_store.add_parsable_certificates(result.certs);
    }

    #[cfg(target_os = "android")]
    {
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    // Plain http (local development, tunnels) still works without roots.
    if root_store.is_empty() {
        log::warn!("No trusted root certificates found; https requests will fail");
    }

    rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

/// hyper client over rustls, following redirects, with a default
/// `User-Agent`. Response bodies are read completely before returning.
pub fn https_transport(options: &TransportOptions) -> Result<Arc<dyn Transport>, ApiError> {
    let user_agent = HeaderValue::from_str(&options.user_agent)
        .map_err(|e| ApiError::InvalidHeader(format!("user-agent: {}", e)))?;

    let https_connector = HttpsConnectorBuilder::new()
        .with_tls_config(tls_config())
        .https_or_http()
        .enable_http1()
        .build();
    let http_client: Client<_, String> = Client::builder(TokioExecutor::new()).build(https_connector);

    let fetch = tower::service_fn(move |req: Request<String>| {
        let client = http_client.clone();
        async move {
            let response = client.request(req).await?;
            let (parts, body) = response.into_parts();
            let bytes = body.collect().await?.to_bytes();
            Ok::<_, ApiError>(Response::from_parts(parts, bytes))
        }
    });

    let service = ServiceBuilder::new()
        .layer(FollowRedirectLayer::new(options.max_redirects))
        .layer(SetRequestHeaderLayer::if_not_present(USER_AGENT, user_agent))
        .service(fetch);

    Ok(Arc::new(ServiceTransport::new(service)))
}
