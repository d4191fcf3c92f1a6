//! Request builder, response parser and blocking client for the poll API.
//!
//! # Design
//! Every operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`.
//! Both halves are pure. The method named after the operation runs
//! build, `Transport::execute` and parse in sequence; `login` additionally
//! stores the returned token.
//!
//! The token is the only mutable state. Changing it takes `&mut self`, so a
//! client shared across threads needs an outer lock; one instance per
//! session is the expected use.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::{ClientConfig, DEFAULT_BASE_URL};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
use crate::types::{CreatePoll, Poll, PollResults, TokenResponse, Vote, VoteRequest};

/// Offset used by `list_polls`.
pub const DEFAULT_SKIP: u64 = 0;
/// Page size used by `list_polls`.
pub const DEFAULT_LIMIT: u64 = 10;

const CONTENT_TYPE_JSON: &str = "application/json";
const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

/// Client for the poll API, generic over how requests reach the network.
#[derive(Clone)]
pub struct PollyClient<T = UreqTransport> {
    base_url: String,
    token: Option<String>,
    transport: T,
}

impl PollyClient<UreqTransport> {
    /// Client for `base_url` using a blocking `ureq` transport with no timeout.
    pub fn new(base_url: &str) -> Self {
        Self::with_transport(base_url, UreqTransport::default())
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::with_transport(&config.base_url, UreqTransport::new(config.timeout))
    }
}

impl Default for PollyClient<UreqTransport> {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl<T> fmt::Debug for PollyClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollyClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl<T: Transport> PollyClient<T> {
    pub fn with_transport(base_url: &str, transport: T) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Store the bearer token used by authenticated calls. Not validated.
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    // -----------------------------------------------------------------------
    // Blocking operations
    // -----------------------------------------------------------------------

    /// Log in and keep the returned access token for later calls.
    pub fn login(&mut self, username: &str, password: &str) -> Result<TokenResponse, ApiError> {
        let req = self.build_login(username, password);
        let token = self.parse_login(self.send(req)?)?;
        self.set_token(token.access_token.clone());
        tracing::debug!(username, "login succeeded, token stored");
        Ok(token)
    }

    pub fn vote_on_poll(&self, poll_id: i64, option_id: i64) -> Result<Vote, ApiError> {
        let req = self.build_vote_on_poll(poll_id, option_id)?;
        self.parse_vote_on_poll(self.send(req)?)
    }

    /// One page of polls. No bounds are checked on `skip` or `limit`.
    pub fn get_polls(&self, skip: u64, limit: u64) -> Result<Vec<Poll>, ApiError> {
        let req = self.build_get_polls(skip, limit);
        self.parse_get_polls(self.send(req)?)
    }

    /// `get_polls(DEFAULT_SKIP, DEFAULT_LIMIT)`.
    pub fn list_polls(&self) -> Result<Vec<Poll>, ApiError> {
        self.get_polls(DEFAULT_SKIP, DEFAULT_LIMIT)
    }

    pub fn get_poll(&self, poll_id: i64) -> Result<Poll, ApiError> {
        let req = self.build_get_poll(poll_id);
        self.parse_get_poll(self.send(req)?)
    }

    pub fn get_poll_results(&self, poll_id: i64) -> Result<PollResults, ApiError> {
        let req = self.build_get_poll_results(poll_id);
        self.parse_get_poll_results(self.send(req)?)
    }

    pub fn create_poll<S: AsRef<str>>(&self, question: &str, options: &[S]) -> Result<Poll, ApiError> {
        let req = self.build_create_poll(question, options)?;
        self.parse_create_poll(self.send(req)?)
    }

    pub fn delete_poll(&self, poll_id: i64) -> Result<(), ApiError> {
        let req = self.build_delete_poll(poll_id)?;
        self.parse_delete_poll(self.send(req)?)
    }

    fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let method = request.method.as_str();
        let url = request.url.clone();
        tracing::debug!(method, url = %url, "sending request");

        let response = self.transport.execute(request)?;
        if response.is_success() {
            tracing::debug!(method, url = %url, status = response.status, "request succeeded");
        } else {
            tracing::warn!(method, url = %url, status = response.status, "request failed");
        }
        Ok(response)
    }

    // -----------------------------------------------------------------------
    // Request builders
    // -----------------------------------------------------------------------

    pub fn build_login(&self, username: &str, password: &str) -> HttpRequest {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("username", username)
            .append_pair("password", password)
            .finish();
        HttpRequest {
            method: HttpMethod::Post,
            url: format!("{}/login", self.base_url),
            headers: vec![("content-type".to_string(), CONTENT_TYPE_FORM.to_string())],
            body: Some(body),
        }
    }

    pub fn build_vote_on_poll(&self, poll_id: i64, option_id: i64) -> Result<HttpRequest, ApiError> {
        let auth = self.auth_header()?;
        self.json_request(
            HttpMethod::Post,
            format!("{}/polls/{poll_id}/vote", self.base_url),
            auth,
            &VoteRequest { option_id },
        )
    }

    pub fn build_get_polls(&self, skip: u64, limit: u64) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: format!("{}/polls?skip={skip}&limit={limit}", self.base_url),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn build_get_poll(&self, poll_id: i64) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: format!("{}/polls/{poll_id}", self.base_url),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn build_get_poll_results(&self, poll_id: i64) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: format!("{}/polls/{poll_id}/results", self.base_url),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn build_create_poll<S: AsRef<str>>(
        &self,
        question: &str,
        options: &[S],
    ) -> Result<HttpRequest, ApiError> {
        let auth = self.auth_header()?;
        let input = CreatePoll {
            question: question.to_string(),
            options: options.iter().map(|o| o.as_ref().to_string()).collect(),
        };
        self.json_request(HttpMethod::Post, format!("{}/polls", self.base_url), auth, &input)
    }

    pub fn build_delete_poll(&self, poll_id: i64) -> Result<HttpRequest, ApiError> {
        let auth = self.auth_header()?;
        Ok(HttpRequest {
            method: HttpMethod::Delete,
            url: format!("{}/polls/{poll_id}", self.base_url),
            headers: vec![auth],
            body: None,
        })
    }

    /// `authorization` header for the stored token. An empty token counts as unset.
    fn auth_header(&self) -> Result<(String, String), ApiError> {
        match self.token.as_deref() {
            Some(token) if !token.is_empty() => {
                Ok(("authorization".to_string(), format!("Bearer {token}")))
            }
            _ => Err(ApiError::AuthRequired),
        }
    }

    fn json_request<B: Serialize>(
        &self,
        method: HttpMethod,
        url: String,
        auth: (String, String),
        input: &B,
    ) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(input).map_err(ApiError::Serialization)?;
        Ok(HttpRequest {
            method,
            url,
            headers: vec![
                auth,
                ("content-type".to_string(), CONTENT_TYPE_JSON.to_string()),
            ],
            body: Some(body),
        })
    }

    // -----------------------------------------------------------------------
    // Response parsers
    // -----------------------------------------------------------------------

    pub fn parse_login(&self, response: HttpResponse) -> Result<TokenResponse, ApiError> {
        parse_json(response)
    }

    pub fn parse_vote_on_poll(&self, response: HttpResponse) -> Result<Vote, ApiError> {
        parse_json(response)
    }

    pub fn parse_get_polls(&self, response: HttpResponse) -> Result<Vec<Poll>, ApiError> {
        parse_json(response)
    }

    pub fn parse_get_poll(&self, response: HttpResponse) -> Result<Poll, ApiError> {
        parse_json(response)
    }

    pub fn parse_get_poll_results(&self, response: HttpResponse) -> Result<PollResults, ApiError> {
        parse_json(response)
    }

    pub fn parse_create_poll(&self, response: HttpResponse) -> Result<Poll, ApiError> {
        parse_json(response)
    }

    /// Any 2xx succeeds; the body, if any, is ignored.
    pub fn parse_delete_poll(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }
}

/// Map non-2xx responses to `ApiError::Http`.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    Err(ApiError::Http {
        status: response.status,
        body: response.body.clone(),
    })
}

fn parse_json<D: DeserializeOwned>(response: HttpResponse) -> Result<D, ApiError> {
    check_status(&response)?;
    serde_json::from_str(&response.body).map_err(ApiError::Deserialization)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> PollyClient {
        PollyClient::new("http://localhost:8000")
    }

    fn authed() -> PollyClient {
        let mut client = client();
        client.set_token("tok123");
        client
    }

    #[test]
    fn default_client_targets_local_server() {
        let client = PollyClient::default();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert!(client.token().is_none());
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = PollyClient::new("http://localhost:8000/");
        let req = client.build_get_poll(1);
        assert_eq!(req.url, "http://localhost:8000/polls/1");
    }

    #[test]
    fn debug_output_hides_token() {
        let rendered = format!("{:?}", authed());
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("tok123"));
    }

    #[test]
    fn build_login_encodes_form() {
        let req = client().build_login("alice", "s3cret&more");
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:8000/login");
        assert_eq!(
            req.headers,
            vec![(
                "content-type".to_string(),
                "application/x-www-form-urlencoded".to_string()
            )]
        );
        assert_eq!(
            req.body.as_deref(),
            Some("username=alice&password=s3cret%26more")
        );
    }

    #[test]
    fn build_get_polls_produces_query() {
        let req = client().build_get_polls(DEFAULT_SKIP, DEFAULT_LIMIT);
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:8000/polls?skip=0&limit=10");
        assert!(req.headers.is_empty());
        assert!(req.body.is_none());

        let req = client().build_get_polls(20, 5);
        assert_eq!(req.url, "http://localhost:8000/polls?skip=20&limit=5");
    }

    #[test]
    fn build_get_poll_results_produces_correct_request() {
        let req = client().build_get_poll_results(3);
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:8000/polls/3/results");
        assert!(req.body.is_none());
    }

    #[test]
    fn authenticated_builders_require_token() {
        let c = client();
        assert!(matches!(c.build_vote_on_poll(1, 1), Err(ApiError::AuthRequired)));
        assert!(matches!(c.build_create_poll("Q?", &["a", "b"]), Err(ApiError::AuthRequired)));
        assert!(matches!(c.build_delete_poll(1), Err(ApiError::AuthRequired)));
    }

    #[test]
    fn empty_token_counts_as_unset() {
        let mut c = client();
        c.set_token("");
        assert!(matches!(c.build_delete_poll(1), Err(ApiError::AuthRequired)));
    }

    #[test]
    fn build_vote_on_poll_produces_correct_request() {
        let req = authed().build_vote_on_poll(42, 7).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:8000/polls/42/vote");
        assert_eq!(req.header("authorization"), Some("Bearer tok123"));
        assert_eq!(req.header("content-type"), Some("application/json"));
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({"option_id": 7}));
    }

    #[test]
    fn build_create_poll_produces_correct_request() {
        let req = authed()
            .build_create_poll("Best color?", &["Red", "Blue"])
            .unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:8000/polls");
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"question": "Best color?", "options": ["Red", "Blue"]})
        );
    }

    #[test]
    fn build_delete_poll_has_no_body() {
        let req = authed().build_delete_poll(5).unwrap();
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(req.url, "http://localhost:8000/polls/5");
        assert_eq!(req.header("authorization"), Some("Bearer tok123"));
        assert!(req.header("content-type").is_none());
        assert!(req.body.is_none());
    }

    #[test]
    fn parse_login_success() {
        let response = HttpResponse::new(200, r#"{"access_token":"abc","token_type":"bearer"}"#);
        let token = client().parse_login(response).unwrap();
        assert_eq!(token.access_token, "abc");
        assert_eq!(token.token_type, "bearer");
    }

    #[test]
    fn parse_login_rejected_credentials() {
        let response = HttpResponse::new(401, r#"{"detail":"Incorrect username or password"}"#);
        let err = client().parse_login(response).unwrap_err();
        assert!(matches!(err, ApiError::Http { status: 401, ref body } if body.contains("Incorrect")));
    }

    #[test]
    fn parse_get_polls_passes_objects_through() {
        let response = HttpResponse::new(
            200,
            r#"[{"id":1,"question":"Tea?","options":[{"id":1,"text":"Yes"}],"extra":true}]"#,
        );
        let polls = client().parse_get_polls(response).unwrap();
        assert_eq!(polls.len(), 1);
        assert_eq!(polls[0]["question"], "Tea?");
        assert_eq!(polls[0]["extra"], true);
    }

    #[test]
    fn parse_get_poll_not_found() {
        let response = HttpResponse::new(404, r#"{"detail":"Poll not found"}"#);
        let err = client().parse_get_poll(response).unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn parse_create_poll_accepts_201() {
        let response = HttpResponse::new(201, r#"{"id":9,"question":"Q?","options":[]}"#);
        let poll = client().parse_create_poll(response).unwrap();
        assert_eq!(poll["id"], 9);
    }

    #[test]
    fn parse_get_poll_results_server_error() {
        let response = HttpResponse::new(500, "internal error");
        let err = client().parse_get_poll_results(response).unwrap_err();
        assert!(matches!(err, ApiError::Http { status: 500, ref body } if body == "internal error"));
    }

    #[test]
    fn parse_delete_poll_accepts_200_and_204() {
        assert!(client().parse_delete_poll(HttpResponse::new(204, "")).is_ok());
        assert!(client().parse_delete_poll(HttpResponse::new(200, "null")).is_ok());
    }

    #[test]
    fn parse_delete_poll_forbidden() {
        let err = client()
            .parse_delete_poll(HttpResponse::new(403, "not the owner"))
            .unwrap_err();
        assert_eq!(err.status(), Some(403));
    }

    #[test]
    fn parse_vote_bad_json() {
        let err = client()
            .parse_vote_on_poll(HttpResponse::new(200, "not json"))
            .unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }
}
