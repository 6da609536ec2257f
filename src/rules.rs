//! HTTP Rule Engine
//!
//! TigerStyle: in-process HTTP fake. No socket is ever opened; requests and
//! responses are plain values.
//!
//! Rules are kept in insertion order and scanned newest first, so a rule
//! registered later overrides an earlier one for the requests both match:
//!
//! ```text
//! rules:    [R1 (GET /a), R2 (POST /a), R3 (GET /a)]
//! scan:      R3 → R2 → R1
//! GET /a  →  R3 wins
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use http::{Method, StatusCode};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::constants::{
    CONTENT_TYPE_JSON, CONTENT_TYPE_TEXT, HTTP_FACTORY_ERROR_PREFIX, HTTP_NO_MATCH_BODY,
};
use crate::error::FakeResult;
use crate::fault::FaultPolicy;
use crate::matching::eq_ignore_case;
use crate::store::AppendLog;

// =============================================================================
// Request / Response
// =============================================================================

/// An HTTP request as seen by the fake
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Request method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Request headers
    pub headers: HeaderMap,
    /// Request body
    pub body: Bytes,
}

impl HttpRequest {
    /// Create a request with no headers and an empty body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// GET `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// POST `body` to `url`.
    pub fn post(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self::new(Method::POST, url).with_body(body)
    }

    /// Replace the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: http::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Body decoded as UTF-8 (lossy).
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// An HTTP response produced by a rule or synthesized by the engine
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Bytes,
}

impl HttpResponse {
    /// Create a response without headers.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// JSON response; `json` is echoed verbatim, never parsed.
    pub fn json(status: StatusCode, json: impl Into<String>) -> Self {
        Self::with_content_type(status, json.into(), CONTENT_TYPE_JSON)
    }

    /// Plain-text response.
    pub fn text(status: StatusCode, text: impl Into<String>) -> Self {
        Self::with_content_type(status, text.into(), CONTENT_TYPE_TEXT)
    }

    fn with_content_type(status: StatusCode, body: String, content_type: &'static str) -> Self {
        let mut response = Self::new(status, body);
        response
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        response
    }

    /// Value of the `content-type` header, if present and printable.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// Body decoded as UTF-8 (lossy).
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// =============================================================================
// Rules
// =============================================================================

/// Decides whether a rule applies to a request.
pub type Predicate = Arc<dyn Fn(&HttpRequest) -> bool + Send + Sync>;

/// Builds the response of a matched rule; an `Err` becomes a 500 response.
pub type ResponseFactory = Arc<dyn Fn(&HttpRequest) -> anyhow::Result<HttpResponse> + Send + Sync>;

/// A predicate paired with the factory that answers the requests it accepts
#[derive(Clone)]
pub struct HttpRule {
    predicate: Predicate,
    response_factory: ResponseFactory,
}

impl HttpRule {
    /// Pair `predicate` with `response_factory`.
    pub fn new(
        predicate: impl Fn(&HttpRequest) -> bool + Send + Sync + 'static,
        response_factory: impl Fn(&HttpRequest) -> anyhow::Result<HttpResponse> + Send + Sync + 'static,
    ) -> Self {
        Self {
            predicate: Arc::new(predicate),
            response_factory: Arc::new(response_factory),
        }
    }

    /// Whether this rule governs `request`.
    pub fn matches(&self, request: &HttpRequest) -> bool {
        (self.predicate)(request)
    }

    /// Build the response for `request`.
    ///
    /// # Errors
    /// Whatever the response factory returns.
    pub fn respond(&self, request: &HttpRequest) -> anyhow::Result<HttpResponse> {
        (self.response_factory)(request)
    }
}

impl fmt::Debug for HttpRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRule").finish_non_exhaustive()
    }
}

// =============================================================================
// HttpHandler Trait
// =============================================================================

/// Contract of an outbound HTTP integration.
#[async_trait]
pub trait HttpHandler: Send + Sync {
    /// Send `request` and return the response.
    async fn dispatch(&self, request: HttpRequest, cancel: &CancellationToken) -> FakeResult<HttpResponse>;
}

// =============================================================================
// SimHttp
// =============================================================================

/// In-process HTTP fake driven by last-match-wins rules.
#[derive(Debug)]
pub struct SimHttp {
    rules: RwLock<Vec<Arc<HttpRule>>>,
    requests: AppendLog<HttpRequest>,
    fault: FaultPolicy,
}

impl SimHttp {
    /// Create an engine with no rules that runs `fault` before each dispatch.
    pub fn new(fault: FaultPolicy) -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
            requests: AppendLog::new(),
            fault,
        }
    }

    /// Register a rule; it takes precedence over every rule added before it.
    pub fn when(
        &self,
        predicate: impl Fn(&HttpRequest) -> bool + Send + Sync + 'static,
        response_factory: impl Fn(&HttpRequest) -> anyhow::Result<HttpResponse> + Send + Sync + 'static,
    ) -> &Self {
        self.add_rule(HttpRule::new(predicate, response_factory))
    }

    /// Register a prepared rule.
    pub fn add_rule(&self, rule: HttpRule) -> &Self {
        self.rules.write().push(Arc::new(rule));
        self
    }

    /// Match any method on `url` (exact, ignoring case).
    pub fn when_url(
        &self,
        url: impl Into<String>,
        response_factory: impl Fn(&HttpRequest) -> anyhow::Result<HttpResponse> + Send + Sync + 'static,
    ) -> &Self {
        let url = url.into();
        self.when(move |request| eq_ignore_case(&request.url, &url), response_factory)
    }

    /// Match `method` on `url` (exact, ignoring case).
    pub fn when_method(
        &self,
        method: Method,
        url: impl Into<String>,
        response_factory: impl Fn(&HttpRequest) -> anyhow::Result<HttpResponse> + Send + Sync + 'static,
    ) -> &Self {
        let url = url.into();
        self.when(
            move |request| request.method == method && eq_ignore_case(&request.url, &url),
            response_factory,
        )
    }

    /// Answer GET `url` with `json` and status 200.
    pub fn when_get(&self, url: impl Into<String>, json: impl Into<String>) -> &Self {
        self.when_get_with_status(url, json, StatusCode::OK)
    }

    /// Answer GET `url` with `json` and `status`.
    pub fn when_get_with_status(
        &self,
        url: impl Into<String>,
        json: impl Into<String>,
        status: StatusCode,
    ) -> &Self {
        self.when_json(Method::GET, url.into(), json.into(), status)
    }

    /// Answer POST `url` with `json` and status 200.
    pub fn when_post(&self, url: impl Into<String>, json: impl Into<String>) -> &Self {
        self.when_post_with_status(url, json, StatusCode::OK)
    }

    /// Answer POST `url` with `json` and `status`.
    pub fn when_post_with_status(
        &self,
        url: impl Into<String>,
        json: impl Into<String>,
        status: StatusCode,
    ) -> &Self {
        self.when_json(Method::POST, url.into(), json.into(), status)
    }

    fn when_json(&self, method: Method, url: String, json: String, status: StatusCode) -> &Self {
        self.when_method(method, url, move |_| Ok(HttpResponse::json(status, json.clone())))
    }

    /// Number of registered rules.
    pub fn rule_count(&self) -> usize {
        self.rules.read().len()
    }

    /// Remove every rule.
    pub fn clear_rules(&self) {
        self.rules.write().clear();
    }

    /// Dispose of the engine's configuration: every rule is removed.
    pub fn close(&self) {
        self.clear_rules();
        tracing::trace!("http fake closed");
    }

    /// Requests that passed the fault policy and were answered, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.snapshot()
    }

    /// Number of answered requests.
    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    /// Forget recorded requests; rules are kept.
    pub fn clear_requests(&self) {
        self.requests.clear();
    }

    /// Dispatch a body-less `method` request for `url`.
    ///
    /// # Errors
    /// Same as [`HttpHandler::dispatch`].
    pub async fn send(
        &self,
        method: Method,
        url: impl Into<String>,
        cancel: &CancellationToken,
    ) -> FakeResult<HttpResponse> {
        self.dispatch(HttpRequest::new(method, url), cancel).await
    }

    /// Dispatch a GET for `url`.
    ///
    /// # Errors
    /// Same as [`HttpHandler::dispatch`].
    pub async fn get(&self, url: impl Into<String>, cancel: &CancellationToken) -> FakeResult<HttpResponse> {
        self.dispatch(HttpRequest::get(url), cancel).await
    }

    /// Dispatch a POST of `body` to `url`.
    ///
    /// # Errors
    /// Same as [`HttpHandler::dispatch`].
    pub async fn post(
        &self,
        url: impl Into<String>,
        body: impl Into<Bytes>,
        cancel: &CancellationToken,
    ) -> FakeResult<HttpResponse> {
        self.dispatch(HttpRequest::post(url, body), cancel).await
    }

    fn respond(&self, request: &HttpRequest) -> HttpResponse {
        // Snapshot so factories may register rules without deadlocking.
        let rules = self.rules.read().clone();

        let Some((index, rule)) = rules
            .iter()
            .enumerate()
            .rev()
            .find(|(_, rule)| rule.matches(request))
        else {
            tracing::trace!(method = %request.method, url = %request.url, "no rule matched");
            return HttpResponse::text(StatusCode::NOT_FOUND, HTTP_NO_MATCH_BODY);
        };

        match rule.respond(request) {
            Ok(response) => {
                tracing::trace!(
                    method = %request.method,
                    url = %request.url,
                    rule_index = index,
                    status = response.status.as_u16(),
                    "rule matched"
                );
                response
            }
            Err(err) => {
                tracing::debug!(
                    method = %request.method,
                    url = %request.url,
                    rule_index = index,
                    error = %err,
                    "response factory failed"
                );
                HttpResponse::text(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("{HTTP_FACTORY_ERROR_PREFIX}{err:#}"),
                )
            }
        }
    }
}

impl Default for SimHttp {
    fn default() -> Self {
        Self::new(FaultPolicy::none())
    }
}

#[async_trait]
impl HttpHandler for SimHttp {
    async fn dispatch(&self, request: HttpRequest, cancel: &CancellationToken) -> FakeResult<HttpResponse> {
        self.fault.apply(cancel).await?;

        let response = self.respond(&request);
        self.requests.append(request);
        Ok(response)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FakeError;
    use std::time::Duration;

    fn text(
        body: &'static str,
    ) -> impl Fn(&HttpRequest) -> anyhow::Result<HttpResponse> + Send + Sync + 'static {
        move |_| Ok(HttpResponse::text(StatusCode::OK, body))
    }

    #[tokio::test]
    async fn test_last_registered_match_wins() {
        let http = SimHttp::default();
        http.when(|r| r.url.ends_with("/users"), text("R1"))
            .when(|r| r.method == Method::DELETE, text("R2"))
            .when(|r| r.url.contains("example"), text("R3"));

        let response = http
            .get("https://example.com/users", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.body_string(), "R3");
        assert_eq!(http.rule_count(), 3);
    }

    #[tokio::test]
    async fn test_earlier_rule_still_serves_other_requests() {
        let http = SimHttp::default();
        http.when_url("https://api.test/a", text("a"))
            .when_url("https://api.test/b", text("b"));
        let cancel = CancellationToken::new();

        assert_eq!(http.get("https://api.test/a", &cancel).await.unwrap().body_string(), "a");
        assert_eq!(http.get("https://api.test/b", &cancel).await.unwrap().body_string(), "b");
    }

    #[tokio::test]
    async fn test_url_match_ignores_case_and_is_exact() {
        let http = SimHttp::default();
        http.when_url("https://API.test/Items", text("items"));
        let cancel = CancellationToken::new();

        let hit = http.get("https://api.test/items", &cancel).await.unwrap();
        assert_eq!(hit.status, StatusCode::OK);

        let miss = http.get("https://api.test/items/1", &cancel).await.unwrap();
        assert_eq!(miss.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_method_rule() {
        let http = SimHttp::default();
        http.when_method(Method::PUT, "https://api.test/x", text("put"));
        let cancel = CancellationToken::new();

        let put = http.send(Method::PUT, "https://api.test/x", &cancel).await.unwrap();
        assert_eq!(put.body_string(), "put");

        let get = http.get("https://api.test/x", &cancel).await.unwrap();
        assert_eq!(get.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_json_rules_echo_body_verbatim() {
        let http = SimHttp::default();
        http.when_get("https://api.test/user", r#"{"name": "Ana" }"#)
            .when_post_with_status("https://api.test/user", "not even json", StatusCode::CREATED);
        let cancel = CancellationToken::new();

        let get = http.get("https://api.test/user", &cancel).await.unwrap();
        assert_eq!(get.status, StatusCode::OK);
        assert_eq!(get.content_type(), Some("application/json"));
        assert_eq!(get.body_string(), r#"{"name": "Ana" }"#);

        let post = http.post("https://api.test/user", "{}", &cancel).await.unwrap();
        assert_eq!(post.status, StatusCode::CREATED);
        assert_eq!(post.body_string(), "not even json");
    }

    #[tokio::test]
    async fn test_no_match_is_404() {
        let http = SimHttp::default();

        let response = http
            .get("https://nowhere.test", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.body_string(), HTTP_NO_MATCH_BODY);
        assert_eq!(response.content_type(), Some(CONTENT_TYPE_TEXT));
    }

    #[tokio::test]
    async fn test_factory_error_becomes_500() {
        let http = SimHttp::default();
        http.when(|_| true, |_| anyhow::bail!("upstream exploded"));

        let response = http
            .get("https://api.test", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.body_string().contains("upstream exploded"));
    }

    #[tokio::test]
    async fn test_factory_sees_request() {
        let http = SimHttp::default();
        http.when(
            |r| r.method == Method::POST,
            |r| Ok(HttpResponse::text(StatusCode::OK, format!("echo:{}", r.body_string()))),
        );

        let response = http
            .post("https://api.test/echo", "ping", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.body_string(), "echo:ping");
    }

    #[tokio::test]
    async fn test_fault_propagates_unchanged() {
        let http = SimHttp::new(FaultPolicy::always_fail_with(|| anyhow::anyhow!("dns failure")));
        http.when(|_| true, text("never"));

        let err = http
            .get("https://api.test", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, FakeError::Injected(_)));
        assert_eq!(err.to_string(), "dns failure");
        assert_eq!(http.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_propagates() {
        let http = SimHttp::new(FaultPolicy::with_latency(Duration::from_secs(30)));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let err = http.get("https://slow.test", &cancel).await.unwrap_err();

        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_clear_and_close() {
        let http = SimHttp::default();
        http.when_get("https://a.test", "{}").when_get("https://b.test", "{}");
        assert_eq!(http.rule_count(), 2);

        http.clear_rules();
        assert_eq!(http.rule_count(), 0);

        http.when_get("https://a.test", "{}");
        http.close();
        assert_eq!(http.rule_count(), 0);
    }

    #[tokio::test]
    async fn test_requests_are_recorded() {
        let http = SimHttp::default();
        let cancel = CancellationToken::new();

        http.get("https://a.test/1", &cancel).await.unwrap();
        http.post("https://a.test/2", "x", &cancel).await.unwrap();

        let urls: Vec<_> = http.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(urls, vec!["https://a.test/1", "https://a.test/2"]);

        http.clear_requests();
        assert_eq!(http.request_count(), 0);
    }

    #[tokio::test]
    async fn test_factory_may_register_rules() {
        let http = Arc::new(SimHttp::default());
        let inner = Arc::downgrade(&http);
        http.when_url("https://api.test/arm", move |_| {
            let http = inner
                .upgrade()
                .ok_or_else(|| anyhow::anyhow!("engine dropped"))?;
            http.when_get("https://api.test/armed", "true");
            Ok(HttpResponse::new(StatusCode::NO_CONTENT, Bytes::new()))
        });
        let cancel = CancellationToken::new();

        http.get("https://api.test/arm", &cancel).await.unwrap();
        let armed = http.get("https://api.test/armed", &cancel).await.unwrap();

        assert_eq!(armed.body_string(), "true");

        let weak = Arc::downgrade(&http);
        drop(http);
        assert!(weak.upgrade().is_none());
    }
}
