// Bearer token authentication for outbound API requests.
use crate::client::middleware::{Middleware, MiddlewareResult, Next};
use crate::secure_store::CredentialStore;
use futures::future::BoxFuture;
use http::header::{AUTHORIZATION, HeaderValue};
use http::Request;
use std::sync::Arc;

/// Reads the access token from secure storage on every request and sends it
/// as `Authorization: Bearer <token>`.
///
/// Nothing is cached: concurrent requests each do their own read. When the
/// read fails or finds nothing the request goes out unauthenticated and the
/// server's answer is left to the caller.
#[derive(Clone, Debug)]
pub struct BearerAuth {
    store: Arc<dyn CredentialStore>,
    key: String,
}

impl BearerAuth {
    pub fn new(store: Arc<dyn CredentialStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    async fn token(store: &dyn CredentialStore, key: &str) -> Option<HeaderValue> {
        let token = match store.read(key).await {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => {
                log::debug!("No '{}' in secure storage, sending unauthenticated", key);
                return None;
            }
            Err(e) => {
                log::warn!("Could not read '{}', sending unauthenticated: {}", key, e);
                return None;
            }
        };

        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                Some(value)
            }
            Err(_) => {
                log::warn!("Stored '{}' is not a valid header value, ignoring it", key);
                None
            }
        }
    }
}

impl Middleware for BearerAuth {
    fn handle(&self, mut req: Request<String>, next: Next) -> BoxFuture<'static, MiddlewareResult> {
        let store = self.store.clone();
        let key = self.key.clone();
        Box::pin(async move {
            if let Some(value) = Self::token(store.as_ref(), &key).await {
                req.headers_mut().insert(AUTHORIZATION, value);
            }
            next.run(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::error::ApiError;
    use crate::client::transport::{ServiceTransport, Transport};
    use crate::secure_store::{MemoryStore, StoreError};
    use bytes::Bytes;
    use http::Response;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct LockedKeychain {
        reads: AtomicUsize,
    }

    impl CredentialStore for LockedKeychain {
        fn read<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<Option<String>, StoreError>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Err(StoreError::Backend("keychain locked".to_string())) })
        }
    }

    /// Hands back an empty string instead of `None`, as some host stores do.
    #[derive(Debug)]
    struct BlankStore;

    impl CredentialStore for BlankStore {
        fn read<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<Option<String>, StoreError>> {
            Box::pin(async { Ok(Some(String::new())) })
        }
    }

    async fn send_through(auth: BearerAuth) -> Request<String> {
        let seen = Arc::new(Mutex::new(None));
        let s = seen.clone();
        let transport: Arc<dyn Transport> =
            Arc::new(ServiceTransport::new(tower::service_fn(move |req: Request<String>| {
                let s = s.clone();
                async move {
                    *s.lock().unwrap() = Some(req);
                    Ok::<_, ApiError>(Response::new(Bytes::new()))
                }
            })));
        let chain: Arc<[Arc<dyn Middleware>]> =
            Arc::from(vec![Arc::new(auth) as Arc<dyn Middleware>]);
        Next::new(chain, transport)
            .run(Request::new(String::new()))
            .await
            .unwrap();
        let req = seen.lock().unwrap().take().unwrap();
        req
    }

    #[tokio::test]
    async fn stored_token_becomes_bearer_header() {
        let store = Arc::new(MemoryStore::with("access_token", "abc123"));
        let req = send_through(BearerAuth::new(store, "access_token")).await;
        let value = req.headers().get(AUTHORIZATION).unwrap();
        assert_eq!(value, "Bearer abc123");
        assert!(value.is_sensitive());
    }

    #[tokio::test]
    async fn missing_token_sends_no_header() {
        let store = Arc::new(MemoryStore::new());
        let req = send_through(BearerAuth::new(store, "access_token")).await;
        assert!(req.headers().get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn empty_token_sends_no_header() {
        let req = send_through(BearerAuth::new(Arc::new(BlankStore), "access_token")).await;
        assert!(req.headers().get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn storage_failure_is_swallowed() {
        let store = Arc::new(LockedKeychain::default());
        let req = send_through(BearerAuth::new(store.clone(), "access_token")).await;
        assert!(req.headers().get(AUTHORIZATION).is_none());
        assert_eq!(store.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn token_with_control_characters_is_ignored() {
        let store = Arc::new(MemoryStore::with("access_token", "abc\n123"));
        let req = send_through(BearerAuth::new(store, "access_token")).await;
        assert!(req.headers().get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn token_is_read_fresh_for_every_request() {
        let store = Arc::new(MemoryStore::with("access_token", "first"));
        let auth = BearerAuth::new(store.clone(), "access_token");

        let req = send_through(auth.clone()).await;
        assert_eq!(req.headers().get(AUTHORIZATION).unwrap(), "Bearer first");

        store.insert("access_token", "second");
        let req = send_through(auth).await;
        assert_eq!(req.headers().get(AUTHORIZATION).unwrap(), "Bearer second");
    }
}
