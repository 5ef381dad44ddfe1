use crate::error::{ErrorKind, Result};
use crate::models::{Asset, Component, Datasource, DatasourceEntry, Space, SpaceEnvelope, Story, StoryEnvelope};
use crate::transport::{HttpTransport, Request, Response, Transport};
use exn::ResultExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::instrument;

pub const DEFAULT_BASE_URL: &str = "https://mapi.storyblok.com/v1";
/// Page size assumed when the remote omits the `per_page` header.
pub const FALLBACK_PER_PAGE: u32 = 25;

/// Remote credentials. Both values are required.
#[derive(Clone)]
pub struct Credentials {
    pub token: String,
    pub space_id: String,
}
impl Credentials {
    pub fn new(token: impl Into<String>, space_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            space_id: space_id.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            exn::bail!(ErrorKind::Configuration("missing API token".to_string()));
        }
        if self.space_id.trim().is_empty() {
            exn::bail!(ErrorKind::Configuration("missing space id".to_string()));
        }
        Ok(())
    }
}
// Keep the token out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("token", &"***").field("space_id", &self.space_id).finish()
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total requests per call, including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    /// Upper bound on any single wait, `retry-after` included.
    pub max_delay: Duration,
}
impl RetryPolicy {
    /// Wait before retry number `retry` (0-based): the server's
    /// `retry-after` when given, otherwise `initial_delay * 2^retry`, never
    /// more than `max_delay`.
    pub fn delay(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let delay = retry_after.unwrap_or_else(|| self.initial_delay.saturating_mul(2u32.saturating_pow(retry)));
        delay.min(self.max_delay)
    }
}
impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub base_url: String,
    /// Requested page size for list endpoints.
    pub per_page: u32,
    pub retry: RetryPolicy,
    /// Per-request timeout of the HTTP transport.
    pub timeout: Duration,
}
impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            per_page: 100,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// One page of a list endpoint.
///
/// `total` and `per_page` come from response headers, not the body.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub data: T,
    pub total: u64,
    pub per_page: u32,
}
impl Page<Value> {
    /// Pull the record array out of the envelope (`{"stories": [...]}`).
    pub fn extract<T: DeserializeOwned>(self, key: &str) -> Result<Page<Vec<T>>> {
        let Value::Object(mut body) = self.data else {
            exn::bail!(ErrorKind::Validation(format!("expected an object wrapping `{key}`")));
        };
        let items = body.remove(key).ok_or_else(|| ErrorKind::Validation(format!("missing `{key}` array")))?;
        let data = serde_json::from_value(items).or_raise(|| ErrorKind::Validation(format!("malformed `{key}`")))?;
        Ok(Page {
            data,
            total: self.total,
            per_page: self.per_page,
        })
    }
}
impl<T> Page<Vec<T>> {
    /// Number of pages `total` spans at this page size.
    pub fn page_count(&self) -> u64 {
        self.total.div_ceil(u64::from(self.per_page.max(1)))
    }

    /// Whether another page may follow page number `page`.
    ///
    /// Without a `total` header only an empty page ends the listing.
    pub fn has_more(&self, page: u32) -> bool {
        if self.data.is_empty() {
            return false;
        }
        self.total == 0 || u64::from(page) < self.page_count()
    }
}

/// Which slice of a list endpoint to fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// 1-based page number.
    pub page: u32,
    /// Only records updated after this instant (`updated_at_gt`).
    pub updated_since: Option<OffsetDateTime>,
}
impl ListQuery {
    pub fn page(page: u32) -> Self {
        Self {
            page,
            updated_since: None,
        }
    }

    pub fn updated_since(mut self, since: Option<OffsetDateTime>) -> Self {
        self.updated_since = since;
        self
    }
}

/// Authenticated client for one space of the management API.
///
/// ```no_run
/// use decant_gateway::{Credentials, Gateway, GatewayOptions, ListQuery};
///
/// # async fn example() -> decant_gateway::error::Result<()> {
/// let gateway = Gateway::http(Credentials::new("token", "12345"), GatewayOptions::default())?;
/// let page = gateway.stories_page(ListQuery::page(1)).await?;
/// println!("{} of {} stories", page.data.len(), page.total);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Gateway {
    credentials: Credentials,
    options: GatewayOptions,
    transport: Arc<dyn Transport>,
}
// The transport is an opaque handle.
impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("credentials", &self.credentials)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
impl Gateway {
    /// Fails with [`Configuration`](ErrorKind::Configuration) on blank
    /// credentials, before anything touches the network.
    pub fn new(credentials: Credentials, options: GatewayOptions, transport: Arc<dyn Transport>) -> Result<Self> {
        credentials.validate()?;
        if options.retry.max_attempts == 0 {
            exn::bail!(ErrorKind::Configuration("max_attempts must be at least 1".to_string()));
        }
        Ok(Self {
            credentials,
            options,
            transport,
        })
    }

    /// Gateway over the production [`HttpTransport`].
    pub fn http(credentials: Credentials, options: GatewayOptions) -> Result<Self> {
        credentials.validate()?;
        let transport = HttpTransport::new(options.timeout)?;
        Self::new(credentials, options, Arc::new(transport))
    }

    pub fn options(&self) -> &GatewayOptions {
        &self.options
    }

    fn url(&self, endpoint: &str) -> String {
        let base = self.options.base_url.trim_end_matches('/');
        match endpoint.trim_matches('/') {
            "" => format!("{base}/spaces/{}", self.credentials.space_id),
            endpoint => format!("{base}/spaces/{}/{endpoint}", self.credentials.space_id),
        }
    }

    fn request(&self, endpoint: &str) -> Request {
        Request::new(self.url(endpoint)).with_token(&self.credentials.token)
    }

    /// Run a request through the retry loop.
    ///
    /// 429s and connection failures are retried; anything else non-2xx is
    /// returned as [`Http`](ErrorKind::Http) straight away. No request is
    /// issued beyond `max_attempts`.
    async fn execute(&self, request: &Request) -> Result<Response> {
        let policy = self.options.retry;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let (retry_after, err) = match self.transport.get(request).await {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) if response.status == 429 => (response.retry_after(), exn::Exn::from(ErrorKind::RateLimited)),
                Ok(response) => exn::bail!(ErrorKind::Http {
                    status: response.status,
                    url: request.url.clone(),
                }),
                Err(err) => (None, err),
            };
            if attempt >= policy.max_attempts {
                tracing::warn!(url = %request.url, attempts = attempt, "giving up: {err}");
                return Err(err).or_raise(|| ErrorKind::RetryExhausted { attempts: attempt });
            }
            let delay = policy.delay(attempt - 1, retry_after);
            tracing::warn!(url = %request.url, attempt, ?delay, "transient failure, backing off: {err}");
            tokio::time::sleep(delay).await;
        }
    }

    fn parse<T: DeserializeOwned>(response: &Response, what: &str) -> Result<T> {
        serde_json::from_slice(&response.body).or_raise(|| ErrorKind::Validation(format!("{what}: body does not match")))
    }

    /// One authenticated GET of a list endpoint, body left as raw JSON.
    #[instrument(level = "debug", skip(self, params))]
    pub async fn fetch_page(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Page<Value>> {
        let mut request = self.request(endpoint);
        for (key, value) in params {
            request = request.with_query(*key, value);
        }
        let response = self.execute(&request).await?;
        let total = response.header("total").and_then(|v| v.trim().parse().ok()).unwrap_or(0);
        let per_page = response.header("per_page").and_then(|v| v.trim().parse().ok()).unwrap_or(FALLBACK_PER_PAGE);
        tracing::debug!(total, per_page, bytes = response.body.len(), "fetched page");
        Ok(Page {
            data: Self::parse(&response, endpoint)?,
            total,
            per_page,
        })
    }

    /// One authenticated GET, body deserialized into `T`.
    ///
    /// A body that doesn't fit `T` is a [`Validation`](ErrorKind::Validation)
    /// error, never coerced.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_single<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let response = self.execute(&self.request(endpoint)).await?;
        Self::parse(&response, endpoint)
    }

    /// Unauthenticated GET of an asset binary, same retry policy.
    #[instrument(level = "debug", skip(self))]
    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        Ok(self.execute(&Request::new(url)).await?.body)
    }

    fn list_params(&self, query: ListQuery) -> Result<Vec<(&'static str, String)>> {
        let mut params = vec![("page", query.page.max(1).to_string()), ("per_page", self.options.per_page.to_string())];
        if let Some(since) = query.updated_since {
            let since = since.format(&Rfc3339).or_raise(|| ErrorKind::Validation("unformattable timestamp".into()))?;
            params.push(("updated_at_gt", since));
        }
        Ok(params)
    }

    async fn list<T: DeserializeOwned>(&self, endpoint: &str, key: &str, params: &[(&str, String)]) -> Result<Page<Vec<T>>> {
        self.fetch_page(endpoint, params).await?.extract(key)
    }

    pub async fn space(&self) -> Result<Space> {
        Ok(self.fetch_single::<SpaceEnvelope>("").await?.space)
    }

    pub async fn story(&self, id: u64) -> Result<Story> {
        Ok(self.fetch_single::<StoryEnvelope>(&format!("stories/{id}")).await?.story)
    }

    pub async fn stories_page(&self, query: ListQuery) -> Result<Page<Vec<Story>>> {
        self.list("stories", "stories", &self.list_params(query)?).await
    }

    pub async fn components_page(&self, query: ListQuery) -> Result<Page<Vec<Component>>> {
        self.list("components", "components", &self.list_params(query)?).await
    }

    pub async fn assets_page(&self, query: ListQuery) -> Result<Page<Vec<Asset>>> {
        self.list("assets", "assets", &self.list_params(query)?).await
    }

    pub async fn datasources_page(&self, query: ListQuery) -> Result<Page<Vec<Datasource>>> {
        self.list("datasources", "datasources", &self.list_params(query)?).await
    }

    pub async fn datasource_entries_page(&self, datasource_id: u64, page: u32) -> Result<Page<Vec<DatasourceEntry>>> {
        let mut params = self.list_params(ListQuery::page(page))?;
        params.push(("datasource_id", datasource_id.to_string()));
        self.list("datasource_entries", "datasource_entries", &params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ScriptedTransport;
    use rstest::rstest;
    use serde_json::json;

    fn gateway(transport: &Arc<ScriptedTransport>, max_attempts: u32) -> Gateway {
        let options = GatewayOptions {
            base_url: "https://mapi.example/v1/".to_string(),
            retry: RetryPolicy {
                max_attempts,
                initial_delay: Duration::from_millis(100),
                max_delay: Duration::from_secs(5),
            },
            ..GatewayOptions::default()
        };
        Gateway::new(Credentials::new("secret", "12345"), options, transport.clone()).unwrap()
    }

    fn stories(ids: &[u64]) -> Value {
        json!({ "stories": ids.iter().map(|id| json!({"id": id, "slug": format!("s-{id}")})).collect::<Vec<_>>() })
    }

    #[rstest]
    #[case::blank_token("", "12345")]
    #[case::whitespace_token("   ", "12345")]
    #[case::blank_space("secret", "")]
    fn test_missing_credentials(#[case] token: &str, #[case] space: &str) {
        let transport = Arc::new(ScriptedTransport::default());
        let err = Gateway::new(Credentials::new(token, space), GatewayOptions::default(), transport.clone()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Configuration(_)));
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn test_credentials_debug_hides_token() {
        let debug = format!("{:?}", Credentials::new("super-secret", "12345"));
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("12345"));
    }

    #[rstest]
    #[case(0, None, 100)]
    #[case(1, None, 200)]
    #[case(3, None, 800)]
    #[case(3, Some(Duration::from_secs(2)), 2000)]
    #[case::retry_after_clamped(0, Some(Duration::from_secs(86_400)), 5000)]
    #[case::backoff_clamped(20, None, 5000)]
    fn test_delay(#[case] retry: u32, #[case] retry_after: Option<Duration>, #[case] expected_ms: u64) {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        };
        assert_eq!(policy.delay(retry, retry_after), Duration::from_millis(expected_ms));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_through_rate_limiting() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .respond("stories", Response::new(429, "").with_header("retry-after", "1"))
                .respond("stories", Response::new(429, ""))
                .respond("stories", Response::json(200, &stories(&[1, 2])).with_header("total", 2)),
        );
        let page = gateway(&transport, 5).stories_page(ListQuery::page(1)).await.unwrap();
        assert_eq!(page.data.len(), 2);
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_retry_after_is_capped() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .respond("stories", Response::new(429, "").with_header("retry-after", "86400"))
                .respond("stories", Response::json(200, &stories(&[1])).with_header("total", 1)),
        );
        let started = tokio::time::Instant::now();
        let page = gateway(&transport, 5).stories_page(ListQuery::page(1)).await.unwrap();
        assert_eq!(page.data.len(), 1);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(5) && waited < Duration::from_secs(6), "waited {waited:?}");
    }

    #[test]
    fn test_gateway_debug_hides_token() {
        let transport = Arc::new(ScriptedTransport::default());
        let debug = format!("{:?}", gateway(&transport, 1));
        assert!(!debug.contains("secret"));
        assert!(debug.contains("12345"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausted_stops_at_cap() {
        let transport = Arc::new(ScriptedTransport::default().always("stories", Response::new(429, "")));
        let err = gateway(&transport, 4).stories_page(ListQuery::page(1)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::RetryExhausted { attempts: 4 }));
        assert_eq!(transport.request_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_failures_are_retried() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .disconnect("stories/42", "connection reset")
                .respond("stories/42", Response::json(200, &json!({"story": {"id": 42, "slug": "jane-doe"}}))),
        );
        let story = gateway(&transport, 3).story(42).await.unwrap();
        assert_eq!(story.slug, "jane-doe");
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_other_status_fails_immediately() {
        let transport = Arc::new(ScriptedTransport::default().always("stories", Response::new(500, "boom")));
        let err = gateway(&transport, 5).stories_page(ListQuery::page(1)).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_pagination_headers_default() {
        let transport = Arc::new(ScriptedTransport::default().respond("stories", Response::json(200, &stories(&[1]))));
        let page = gateway(&transport, 1).stories_page(ListQuery::page(1)).await.unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(page.per_page, FALLBACK_PER_PAGE);
        assert!(page.has_more(1));
        assert!(page.has_more(50));
    }

    #[rstest]
    #[case::headerless_non_empty(1, 0, 25, true)]
    #[case::headerless_empty(0, 0, 25, false)]
    #[case::first_of_three(1, 250, 100, true)]
    #[case::last_of_three(3, 250, 100, false)]
    #[case::past_the_end(4, 250, 100, false)]
    fn test_has_more(#[case] page: u32, #[case] total: u64, #[case] per_page: u32, #[case] expected: bool) {
        let data = if total == 0 && !expected { Vec::new() } else { vec![1] };
        assert_eq!(Page { data, total, per_page }.has_more(page), expected);
    }

    #[tokio::test]
    async fn test_pagination_headers() {
        let transport = Arc::new(ScriptedTransport::default().respond(
            "stories",
            Response::json(200, &stories(&[1, 2])).with_header("Total", 250).with_header("Per_Page", 100),
        ));
        let page = gateway(&transport, 1).stories_page(ListQuery::page(1)).await.unwrap();
        assert_eq!(page.total, 250);
        assert_eq!(page.per_page, 100);
        assert_eq!(page.page_count(), 3);
    }

    #[tokio::test]
    async fn test_request_shape() {
        let since = time::macros::datetime!(2024-03-01 10:00 UTC);
        let transport = Arc::new(ScriptedTransport::default().respond("stories", Response::json(200, &stories(&[]))));
        gateway(&transport, 1).stories_page(ListQuery::page(2).updated_since(Some(since))).await.unwrap();
        let request = transport.requests().pop().unwrap();
        assert_eq!(request.url, "https://mapi.example/v1/spaces/12345/stories");
        assert_eq!(request.token.as_deref(), Some("secret"));
        assert_eq!(request.param("page"), Some("2"));
        assert_eq!(request.param("per_page"), Some("100"));
        assert_eq!(request.param("updated_at_gt"), Some("2024-03-01T10:00:00Z"));
    }

    #[tokio::test]
    async fn test_fetch_single_validation() {
        let transport = Arc::new(ScriptedTransport::default().respond("", Response::json(200, &json!({"space": {"id": "nope"}}))));
        let err = gateway(&transport, 1).space().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Validation(_)));
    }

    #[tokio::test]
    async fn test_space() {
        let transport = Arc::new(ScriptedTransport::default().respond(
            "",
            Response::json(200, &json!({"space": {"id": 12345, "name": "Website", "plan": "business"}})),
        ));
        let space = gateway(&transport, 1).space().await.unwrap();
        assert_eq!(space.name, "Website");
        assert_eq!(transport.requests()[0].url, "https://mapi.example/v1/spaces/12345");
    }

    #[tokio::test]
    async fn test_extract_missing_key() {
        let transport = Arc::new(ScriptedTransport::default().respond("assets", Response::json(200, &json!({"files": []}))));
        let err = gateway(&transport, 1).assets_page(ListQuery::page(1)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Validation(_)));
    }

    #[tokio::test]
    async fn test_download_is_unauthenticated() {
        let url = "https://a.example.com/f/1/logo.png";
        let transport = Arc::new(ScriptedTransport::default().respond(url, Response::new(200, b"PNG".to_vec())));
        let bytes = gateway(&transport, 1).download(url).await.unwrap();
        assert_eq!(bytes, b"PNG");
        assert_eq!(transport.requests()[0].token, None);
    }

    #[tokio::test]
    async fn test_datasource_entries_params() {
        let transport = Arc::new(ScriptedTransport::default().respond(
            "datasource_entries",
            Response::json(200, &json!({"datasource_entries": [{"id": 1, "name": "de", "value": "German"}]})),
        ));
        let page = gateway(&transport, 1).datasource_entries_page(9, 1).await.unwrap();
        assert_eq!(page.data[0].value, "German");
        assert_eq!(transport.requests()[0].param("datasource_id"), Some("9"));
    }
}
