// File: ./src/client/redirect.rs
//! Redirect following with browser `fetch` semantics: 303 (and 301/302 after
//! a POST) turn into a body-less GET, 307/308 replay the request unchanged,
//! and credentials are not forwarded to another origin.
use http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, LOCATION};
use http::{Method, Request, Response, StatusCode, Uri};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

#[derive(Clone, Debug)]
pub struct FollowRedirectLayer {
    max_redirects: usize,
}

impl FollowRedirectLayer {
    pub fn new(max_redirects: usize) -> Self {
        Self { max_redirects }
    }
}

impl<S> Layer<S> for FollowRedirectLayer {
    type Service = FollowRedirectService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        FollowRedirectService {
            inner,
            max_redirects: self.max_redirects,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FollowRedirectService<S> {
    inner: S,
    max_redirects: usize,
}

/// Resolves a `Location` value against the URI that produced it, following
/// RFC 3986 section 5.2: network-path (`//host/x`), absolute-path (`/x`),
/// relative-path (`x`, `../x`) and query-only (`?q`) references all inherit
/// from `current`. Fragments are dropped.
pub fn resolve_location(current: &Uri, location: &str) -> Option<Uri> {
    let location = location.trim();
    let location = location.split('#').next().unwrap_or_default();

    if has_scheme(location) {
        let uri: Uri = location.parse().ok()?;
        return (uri.scheme().is_some() && uri.authority().is_some()).then_some(uri);
    }

    let scheme = current.scheme()?.clone();
    if location.starts_with("//") {
        return format!("{}:{}", scheme, location).parse().ok();
    }
    let authority = current.authority()?.clone();

    let (ref_path, ref_query) = match location.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (location, None),
    };

    let path = if ref_path.is_empty() {
        current.path().to_string()
    } else if ref_path.starts_with('/') {
        remove_dot_segments(ref_path)
    } else {
        let base = current.path();
        let dir = &base[..base.rfind('/').map_or(0, |i| i + 1)];
        let dir = if dir.is_empty() { "/" } else { dir };
        remove_dot_segments(&format!("{}{}", dir, ref_path))
    };

    let query = match (ref_path.is_empty(), ref_query) {
        (_, Some(q)) => Some(q),
        (true, None) => current.query(),
        (false, None) => None,
    };
    let path_and_query = match query {
        Some(q) => format!("{}?{}", path, q),
        None => path,
    };

    Uri::builder()
        .scheme(scheme)
        .authority(authority)
        .path_and_query(path_and_query)
        .build()
        .ok()
}

fn has_scheme(reference: &str) -> bool {
    let Some((head, _)) = reference.split_once(':') else {
        return false;
    };
    let mut chars = head.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Collapses `.` and `..` segments of an absolute path.
fn remove_dot_segments(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.len() - 1;
    let mut out: Vec<&str> = Vec::with_capacity(segments.len());

    for (i, segment) in segments.into_iter().enumerate() {
        match segment {
            "." => {}
            ".." => {
                // out[0] is the empty segment before the leading slash.
                if out.len() > 1 {
                    out.pop();
                }
            }
            s => out.push(s),
        }
        if i == last && matches!(segment, "." | "..") {
            out.push("");
        }
    }

    let joined = out.join("/");
    if joined.starts_with('/') {
        joined
    } else {
        format!("/{}", joined)
    }
}

fn same_origin(a: &Uri, b: &Uri) -> bool {
    a.scheme() == b.scheme() && a.authority() == b.authority()
}

fn switches_to_get(status: StatusCode, method: &Method) -> bool {
    match status {
        StatusCode::SEE_OTHER => *method != Method::HEAD,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => *method == Method::POST,
        _ => false,
    }
}

/// Builds the follow-up request for a redirect `status` pointing at `target`.
fn redirected<B: Default>(mut req: Request<B>, status: StatusCode, target: Uri) -> Request<B> {
    if switches_to_get(status, req.method()) {
        *req.method_mut() = Method::GET;
        *req.body_mut() = B::default();
        req.headers_mut().remove(CONTENT_TYPE);
        req.headers_mut().remove(CONTENT_LENGTH);
    }
    if !same_origin(req.uri(), &target) {
        req.headers_mut().remove(AUTHORIZATION);
        req.headers_mut().remove(COOKIE);
    }
    *req.uri_mut() = target;
    req
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for FollowRedirectService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
    ReqBody: Clone + Default + Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        // The clone is ready-checked below before each extra call; the
        // original `self.inner` was made ready by the caller.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let max_redirects = self.max_redirects;

        Box::pin(async move {
            let mut current = req;
            let mut hops = 0;

            loop {
                let retry = current.clone();
                let response = inner.call(current).await?;

                if !response.status().is_redirection() || hops >= max_redirects {
                    return Ok(response);
                }
                let Some(target) = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|l| l.to_str().ok())
                    .and_then(|l| resolve_location(retry.uri(), l))
                else {
                    return Ok(response);
                };

                log::debug!("Following {} redirect to {}", response.status(), target);
                current = redirected(retry, response.status(), target);
                hops += 1;
                std::future::poll_fn(|cx| inner.poll_ready(cx)).await?;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use std::convert::Infallible;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    #[test]
    fn relative_location_inherits_origin() {
        let current: Uri = "https://api.example.com/v1/items?page=2".parse().unwrap();
        let target = resolve_location(&current, "/v2/items").unwrap();
        assert_eq!(target.to_string(), "https://api.example.com/v2/items");
    }

    #[test]
    fn absolute_location_is_used_as_is() {
        let current: Uri = "https://api.example.com/v1".parse().unwrap();
        let target = resolve_location(&current, "http://other.test:8080/x?y=1").unwrap();
        assert_eq!(target.to_string(), "http://other.test:8080/x?y=1");
    }

    #[test]
    fn bare_segment_replaces_last_path_segment() {
        let current: Uri = "https://api.example.com/v1/items".parse().unwrap();
        let target = resolve_location(&current, "next").unwrap();
        assert_eq!(target.to_string(), "https://api.example.com/v1/next");
        assert!(same_origin(&current, &target));
    }

    #[test]
    fn dot_segments_are_collapsed() {
        let current: Uri = "https://api.example.com/v1/items/42".parse().unwrap();
        assert_eq!(
            resolve_location(&current, "../x").unwrap().to_string(),
            "https://api.example.com/v1/x"
        );
        assert_eq!(
            resolve_location(&current, "./y?z=1").unwrap().to_string(),
            "https://api.example.com/v1/items/y?z=1"
        );
        assert_eq!(
            resolve_location(&current, "../../../../top").unwrap().to_string(),
            "https://api.example.com/top"
        );
    }

    #[test]
    fn query_only_location_keeps_path() {
        let current: Uri = "https://api.example.com/v1/items?page=1".parse().unwrap();
        assert_eq!(
            resolve_location(&current, "?page=2").unwrap().to_string(),
            "https://api.example.com/v1/items?page=2"
        );
    }

    #[test]
    fn network_path_location_keeps_scheme_only() {
        let current: Uri = "https://api.example.com/v1".parse().unwrap();
        assert_eq!(
            resolve_location(&current, "//cdn.example.com/a.png").unwrap().to_string(),
            "https://cdn.example.com/a.png"
        );
    }

    #[test]
    fn fragment_is_dropped() {
        let current: Uri = "https://api.example.com/v1".parse().unwrap();
        assert_eq!(
            resolve_location(&current, "/docs#intro").unwrap().to_string(),
            "https://api.example.com/docs"
        );
    }

    #[test]
    fn see_other_turns_post_into_bodyless_get() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("https://a.test/form")
            .header(CONTENT_TYPE, "application/json")
            .body("{\"a\":1}".to_string())
            .unwrap();
        let next = redirected(req, StatusCode::SEE_OTHER, "https://a.test/done".parse().unwrap());
        assert_eq!(next.method(), Method::GET);
        assert!(next.body().is_empty());
        assert!(next.headers().get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn temporary_redirect_keeps_method_and_body() {
        let req = Request::builder()
            .method(Method::PUT)
            .uri("https://a.test/x")
            .body("payload".to_string())
            .unwrap();
        let next = redirected(
            req,
            StatusCode::TEMPORARY_REDIRECT,
            "https://a.test/y".parse().unwrap(),
        );
        assert_eq!(next.method(), Method::PUT);
        assert_eq!(next.body(), "payload");
    }

    #[test]
    fn authorization_is_dropped_across_origins_only() {
        let make = || {
            Request::builder()
                .uri("https://a.test/x")
                .header(AUTHORIZATION, "Bearer t")
                .body(String::new())
                .unwrap()
        };
        let same = redirected(make(), StatusCode::FOUND, "https://a.test/y".parse().unwrap());
        assert!(same.headers().get(AUTHORIZATION).is_some());

        let other = redirected(make(), StatusCode::FOUND, "https://b.test/y".parse().unwrap());
        assert!(other.headers().get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn follows_until_a_non_redirect_response() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let c = calls.clone();
        let svc = tower::service_fn(move |req: Request<String>| {
            let c = c.clone();
            async move {
                let path = req.uri().path().to_string();
                c.lock().unwrap().push(path.clone());
                let mut resp = Response::new(String::new());
                if path != "/final" {
                    *resp.status_mut() = StatusCode::FOUND;
                    let next = if path == "/start" { "/middle" } else { "/final" };
                    resp.headers_mut().insert(LOCATION, HeaderValue::from_static(next));
                }
                Ok::<_, Infallible>(resp)
            }
        });

        let resp = FollowRedirectLayer::new(5)
            .layer(svc)
            .oneshot(
                Request::builder()
                    .uri("http://a.test/start")
                    .body(String::new())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(*calls.lock().unwrap(), vec!["/start", "/middle", "/final"]);
    }

    #[tokio::test]
    async fn stops_after_max_redirects() {
        let svc = tower::service_fn(|_req: Request<String>| async {
            let mut resp = Response::new(String::new());
            *resp.status_mut() = StatusCode::FOUND;
            resp.headers_mut()
                .insert(LOCATION, HeaderValue::from_static("/loop"));
            Ok::<_, Infallible>(resp)
        });

        let resp = FollowRedirectLayer::new(3)
            .layer(svc)
            .oneshot(
                Request::builder()
                    .uri("http://a.test/loop")
                    .body(String::new())
                    .unwrap(),
            )
            .await;

        assert_eq!(resp.unwrap().status(), StatusCode::FOUND);
    }
}
