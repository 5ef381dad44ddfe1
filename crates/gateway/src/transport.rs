//! The network seam.
//!
//! [`Gateway`](crate::Gateway) never talks to `reqwest` directly; it hands a
//! [`Request`] to a [`Transport`] and inspects the [`Response`]. Status codes
//! are *not* errors at this layer: only failing to get any response at all is.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// One GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub query: Vec<(String, String)>,
    /// Sent verbatim as the `Authorization` header when present.
    pub token: Option<String>,
}
impl Request {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            token: None,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Value of a query parameter, if set.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// Status, headers and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    /// Header names are lowercased.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}
impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// A response with a JSON body.
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self::new(status, body.to_string()).with_header("content-type", "application/json")
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl ToString) -> Self {
        self.headers.insert(name.as_ref().to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `retry-after` in seconds. The HTTP-date form is ignored.
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("retry-after")?.trim().parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform a GET request.
    ///
    /// Must only fail with [`Connection`](ErrorKind::Connection) when no
    /// response could be obtained; any HTTP status is a successful return.
    async fn get(&self, request: &Request) -> Result<Response>;
}

/// Production transport backed by a shared [`reqwest::Client`].
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}
impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("decant/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ErrorKind::Configuration(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, request: &Request) -> Result<Response> {
        let mut builder = self.client.get(&request.url).query(&request.query);
        if let Some(token) = &request.token {
            builder = builder.header(reqwest::header::AUTHORIZATION, token);
        }
        let response = builder.send().await.map_err(|e| ErrorKind::Connection(e.to_string()))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| Some((name.as_str().to_ascii_lowercase(), value.to_str().ok()?.to_string())))
            .collect();
        // A body cut off mid-stream is as good as no response.
        let body = response.bytes().await.map_err(|e| ErrorKind::Connection(e.to_string()))?.to_vec();
        Ok(Response { status, headers, body })
    }
}

#[cfg(any(test, feature = "mock"))]
pub use self::scripted::ScriptedTransport;

#[cfg(any(test, feature = "mock"))]
mod scripted {
    use super::{Request, Response, Transport};
    use crate::error::{ErrorKind, Result};
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Mutex, PoisonError};

    #[derive(Debug, Clone)]
    enum Scripted {
        Reply(Response),
        Disconnect(String),
    }

    #[derive(Default)]
    struct Route {
        queue: VecDeque<Scripted>,
        fallback: Option<Scripted>,
    }

    /// Replays canned responses and records every request.
    ///
    /// Responses are scripted per *route*: the part of the URL after
    /// `/spaces/<id>/` (e.g. `stories` or `stories/42`), or the full URL for
    /// anything else such as asset downloads. Queued responses are consumed
    /// in order; once a route's queue is empty its `always` response (if any)
    /// repeats. Unscripted routes answer `404`.
    ///
    /// ```ignore
    /// use decant_gateway::{Response, ScriptedTransport};
    ///
    /// let transport = ScriptedTransport::default()
    ///     .respond("stories", Response::new(429, ""))
    ///     .respond("stories", Response::json(200, &serde_json::json!({ "stories": [] })));
    /// ```
    #[derive(Default)]
    pub struct ScriptedTransport {
        routes: Mutex<HashMap<String, Route>>,
        requests: Mutex<Vec<Request>>,
    }
    impl ScriptedTransport {
        fn push(self, route: &str, scripted: Scripted) -> Self {
            self.routes
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(route.to_string())
                .or_default()
                .queue
                .push_back(scripted);
            self
        }

        /// Queue a response for a route.
        pub fn respond(self, route: &str, response: Response) -> Self {
            self.push(route, Scripted::Reply(response))
        }

        /// Queue a connection failure for a route.
        pub fn disconnect(self, route: &str, message: &str) -> Self {
            self.push(route, Scripted::Disconnect(message.to_string()))
        }

        /// Answer a route with this response whenever its queue is empty.
        pub fn always(self, route: &str, response: Response) -> Self {
            self.routes
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(route.to_string())
                .or_default()
                .fallback = Some(Scripted::Reply(response));
            self
        }

        /// All requests seen so far, oldest first.
        pub fn requests(&self) -> Vec<Request> {
            self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap_or_else(PoisonError::into_inner).len()
        }

        /// Requests that hit a specific route.
        pub fn requests_to(&self, route: &str) -> Vec<Request> {
            self.requests().into_iter().filter(|r| Self::route_of(&r.url) == route).collect()
        }

        fn route_of(url: &str) -> &str {
            url.split_once("/spaces/")
                .map(|(_, rest)| rest.split_once('/').map_or("", |(_, endpoint)| endpoint))
                .unwrap_or(url)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(&self, request: &Request) -> Result<Response> {
            self.requests.lock().unwrap_or_else(PoisonError::into_inner).push(request.clone());
            let route = Self::route_of(&request.url);
            let scripted = {
                let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
                routes.get_mut(route).and_then(|r| r.queue.pop_front().or_else(|| r.fallback.clone()))
            };
            match scripted {
                Some(Scripted::Reply(response)) => Ok(response),
                Some(Scripted::Disconnect(message)) => exn::bail!(ErrorKind::Connection(message)),
                None => Ok(Response::new(404, format!("no scripted response for `{route}`"))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_headers_case_insensitive() {
        let response = Response::new(200, "").with_header("Per-Page", 100).with_header("TOTAL", 3);
        assert_eq!(response.header("per_page"), None);
        assert_eq!(response.header("per-page"), Some("100"));
        assert_eq!(response.header("Total"), Some("3"));
    }

    #[test]
    fn test_retry_after() {
        assert_eq!(Response::new(429, "").with_header("retry-after", "2").retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(
            Response::new(429, "").with_header("retry-after", "Wed, 21 Oct 2015 07:28:00 GMT").retry_after(),
            None
        );
        assert_eq!(Response::new(429, "").retry_after(), None);
    }

    #[test]
    fn test_request_params() {
        let request = Request::new("https://mapi.example/v1/spaces/1/stories").with_query("page", 2).with_token("secret");
        assert_eq!(request.param("page"), Some("2"));
        assert_eq!(request.param("per_page"), None);
        assert_eq!(request.token.as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn test_scripted_routes() {
        let transport = ScriptedTransport::default()
            .respond("stories", Response::new(429, ""))
            .always("stories", Response::new(200, "ok"))
            .disconnect("stories/42", "reset");
        let base = "https://mapi.example/v1/spaces/1";
        assert_eq!(transport.get(&Request::new(format!("{base}/stories"))).await.unwrap().status, 429);
        assert_eq!(transport.get(&Request::new(format!("{base}/stories"))).await.unwrap().status, 200);
        assert_eq!(transport.get(&Request::new(format!("{base}/stories"))).await.unwrap().status, 200);
        let err = transport.get(&Request::new(format!("{base}/stories/42"))).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Connection(_)));
        assert_eq!(transport.get(&Request::new("https://cdn.example/a.png")).await.unwrap().status, 404);
        assert_eq!(transport.request_count(), 5);
        assert_eq!(transport.requests_to("stories").len(), 3);
    }
}
