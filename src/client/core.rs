// File: src/client/core.rs
use crate::client::auth::BearerAuth;
use crate::client::error::ApiError;
use crate::client::middleware::{Middleware, Next, ResponsePassThrough, StaticHeaders};
use crate::client::transport::{Transport, TransportOptions, https_transport};
use crate::config::AppConfig;
use crate::secure_store::CredentialStore;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use http::{Method, Request, Response, StatusCode, Uri};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

/// A fully read response.
#[derive(Clone, Debug)]
pub struct ApiResponse {
    inner: Response<Bytes>,
}

impl ApiResponse {
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn is_success(&self) -> bool {
        self.inner.status().is_success()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn body(&self) -> &Bytes {
        self.inner.body()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(self.inner.body()).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(self.inner.body()).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub fn into_http(self) -> Response<Bytes> {
        self.inner
    }
}

impl From<Response<Bytes>> for ApiResponse {
    fn from(inner: Response<Bytes>) -> Self {
        Self { inner }
    }
}

/// The API client every screen shares.
///
/// Requests go through the middleware chain in order, then the transport.
/// Cloning is cheap and clones share the chain and the transport.
#[derive(Clone)]
pub struct ApiClient {
    base_url: Uri,
    chain: Arc<[Arc<dyn Middleware>]>,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.to_string())
            .field("chain", &self.chain)
            .finish()
    }
}

fn parse_base_url(url: &str) -> Result<Uri, ApiError> {
    let uri: Uri = url.trim().parse()?;
    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(ApiError::InvalidUrl(format!(
            "'{}' must be absolute, e.g. http://localhost:8000",
            url
        )));
    }
    Ok(uri)
}

impl ApiClient {
    pub fn builder(base_url: &str) -> ApiClientBuilder {
        ApiClientBuilder {
            base_url: base_url.to_string(),
            middleware: Vec::new(),
            transport: None,
            transport_options: TransportOptions::default(),
        }
    }

    /// The standard client: bearer token from `store`, the tunnel bypass
    /// header plus `extra_headers`, and the response pass-through, over the
    /// hyper transport.
    pub fn from_config(config: &AppConfig, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        let mut headers = StaticHeaders::tunnel_bypass();
        for (name, value) in &config.extra_headers {
            headers = headers.with(name, value)?;
        }

        Self::builder(&config.api_url)
            .max_redirects(config.max_redirects)
            .with_middleware(BearerAuth::new(store, config.token_key.clone()))
            .with_middleware(headers)
            .with_middleware(ResponsePassThrough)
            .build()
    }

    pub fn base_url(&self) -> &Uri {
        &self.base_url
    }

    /// Joins `path` onto the base URL. Absolute URLs are returned unchanged.
    pub fn url(&self, path: &str) -> Result<Uri, ApiError> {
        if let Ok(uri) = path.parse::<Uri>()
            && uri.scheme().is_some()
        {
            return Ok(uri);
        }
        let base = self.base_url.to_string();
        let joined = format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Ok(joined.parse()?)
    }

    pub fn request(&self, method: Method, path: &str, body: String) -> Result<Request<String>, ApiError> {
        Ok(Request::builder()
            .method(method)
            .uri(self.url(path)?)
            .body(body)?)
    }

    /// Sends `req` through the chain. Relative request URIs are resolved
    /// against the base URL. Error statuses are returned as responses.
    pub async fn send(&self, mut req: Request<String>) -> Result<ApiResponse, ApiError> {
        if req.uri().scheme().is_none() {
            let path = req
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_default();
            *req.uri_mut() = self.url(&path)?;
        }

        log::debug!("{} {}", req.method(), req.uri());
        let response = Next::new(self.chain.clone(), self.transport.clone())
            .run(req)
            .await?;
        Ok(ApiResponse::from(response))
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.send(self.request(Method::GET, path, String::new())?).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.send(self.request(Method::DELETE, path, String::new())?)
            .await
    }

    pub async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<ApiResponse, ApiError> {
        self.send(self.json_request(Method::POST, path, body)?).await
    }

    pub async fn put_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<ApiResponse, ApiError> {
        self.send(self.json_request(Method::PUT, path, body)?).await
    }

    fn json_request<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &T,
    ) -> Result<Request<String>, ApiError> {
        let body = serde_json::to_string(body).map_err(|e| ApiError::Serialize(e.to_string()))?;
        let mut req = self.request(method, path, body)?;
        req.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(req)
    }
}

pub struct ApiClientBuilder {
    base_url: String,
    middleware: Vec<Arc<dyn Middleware>>,
    transport: Option<Arc<dyn Transport>>,
    transport_options: TransportOptions,
}

impl ApiClientBuilder {
    /// Appends `middleware`; earlier middleware runs first on the way out.
    pub fn with_middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Replaces the default hyper transport.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn max_redirects(mut self, max: usize) -> Self {
        self.transport_options.max_redirects = max;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.transport_options.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> Result<ApiClient, ApiError> {
        let base_url = parse_base_url(&self.base_url)?;
        let transport = match self.transport {
            Some(t) => t,
            None => https_transport(&self.transport_options)?,
        };
        Ok(ApiClient {
            base_url,
            chain: Arc::from(self.middleware),
            transport,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::transport::ServiceTransport;
    use std::sync::Mutex;

    fn echo_transport(seen: Arc<Mutex<Vec<Request<String>>>>) -> Arc<dyn Transport> {
        Arc::new(ServiceTransport::new(tower::service_fn(
            move |req: Request<String>| {
                let seen = seen.clone();
                async move {
                    let body = Bytes::from(req.body().clone());
                    seen.lock().unwrap().push(req);
                    Ok::<_, ApiError>(Response::new(body))
                }
            },
        )))
    }

    fn client(base: &str) -> (ApiClient, Arc<Mutex<Vec<Request<String>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let client = ApiClient::builder(base)
            .with_transport(echo_transport(seen.clone()))
            .build()
            .unwrap();
        (client, seen)
    }

    #[test]
    fn base_url_must_be_absolute() {
        assert!(matches!(
            ApiClient::builder("localhost:8000/api").build(),
            Err(ApiError::InvalidUrl(_))
        ));
        assert!(matches!(
            ApiClient::builder("/api").build(),
            Err(ApiError::InvalidUrl(_))
        ));
    }

    #[test]
    fn url_joins_with_exactly_one_slash() {
        let (client, _) = client("http://localhost:8000/api/");
        assert_eq!(
            client.url("/items?page=2").unwrap().to_string(),
            "http://localhost:8000/api/items?page=2"
        );
        assert_eq!(
            client.url("items").unwrap().to_string(),
            "http://localhost:8000/api/items"
        );
    }

    #[test]
    fn absolute_urls_bypass_the_base() {
        let (client, _) = client("http://localhost:8000");
        assert_eq!(
            client.url("https://cdn.example.com/a.png").unwrap().to_string(),
            "https://cdn.example.com/a.png"
        );
    }

    #[tokio::test]
    async fn post_json_sets_body_and_content_type() {
        let (client, seen) = client("http://localhost:8000");
        let resp = client
            .post_json("/login", &serde_json::json!({"user": "ada"}))
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].method(), Method::POST);
        assert_eq!(seen[0].headers().get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(seen[0].body(), r#"{"user":"ada"}"#);
        let echoed: serde_json::Value = resp.json().unwrap();
        assert_eq!(echoed["user"], "ada");
    }

    #[tokio::test]
    async fn relative_request_uri_is_resolved_against_base() {
        let (client, seen) = client("http://localhost:8000/api");
        let req = Request::builder()
            .method(Method::PATCH)
            .uri("/items/1")
            .body(String::new())
            .unwrap();
        client.send(req).await.unwrap();
        assert_eq!(
            seen.lock().unwrap()[0].uri().to_string(),
            "http://localhost:8000/api/items/1"
        );
    }

    #[tokio::test]
    async fn decode_error_is_reported() {
        let (client, _) = client("http://localhost:8000");
        let resp = client.get("/").await.unwrap();
        let decoded: Result<serde_json::Value, _> = resp.json();
        assert!(matches!(decoded, Err(ApiError::Decode(_))));
    }
}
