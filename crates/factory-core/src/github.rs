//! Blocking GitHub REST client for the handful of calls the catalog needs.
//!
//! `reqwest::blocking` spins up its own runtime, so in the server this client
//! must only be created and used inside `spawn_blocking`.

use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::catalog::CatalogRepo;
use crate::error::{FactoryError, Result};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const USER_AGENT: &str = "projects-factory";
const PER_PAGE: u32 = 100;
const MAX_ATTEMPTS: u32 = 5;
const MESSAGE_LIMIT: usize = 200;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Repository object as returned by `GET /user/repos`.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubRepo {
    pub name: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl From<GithubRepo> for CatalogRepo {
    fn from(repo: GithubRepo) -> Self {
        CatalogRepo {
            name: repo.name,
            url: repo.html_url,
            private: repo.private,
            description: repo.description.unwrap_or_default(),
            created_at: repo.created_at.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GithubClient {
    http: Client,
    api_base: String,
    owner: String,
    token: Option<String>,
    backoff: Duration,
    timeout: Duration,
}

impl GithubClient {
    pub fn new(owner: &str, token: Option<&str>) -> Result<Self> {
        Self::with_api_base(DEFAULT_API_BASE, owner, token)
    }

    pub fn with_api_base(api_base: &str, owner: &str, token: Option<&str>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            token: token.map(str::to_string),
            backoff: Duration::from_millis(500),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Total time allowed for each authenticated request, body included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base delay between GET retries; doubles on every attempt.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn authed(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.token.as_deref().ok_or(FactoryError::MissingToken)?;
        Ok(req
            .timeout(self.timeout)
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json"))
    }

    /// GET with retries on 429 and 5xx.
    fn get_with_retry(&self, url: &str, query: &[(&str, String)]) -> Result<Response> {
        let mut attempt = 1;
        loop {
            let resp = self.authed(self.http.get(url).query(query))?.send()?;
            let status = resp.status();
            let retryable =
                status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if !retryable || attempt >= MAX_ATTEMPTS {
                return Ok(resp);
            }
            let delay = self.backoff * 2u32.pow(attempt - 1);
            debug!(%status, attempt, ?delay, "retrying GitHub request");
            thread::sleep(delay);
            attempt += 1;
        }
    }

    /// Every repository owned by the authenticated user, following pages
    /// until an empty one.
    pub fn list_owned_repos(&self) -> Result<Vec<GithubRepo>> {
        let url = self.url("/user/repos");
        let mut all = Vec::new();
        let mut page = 1u32;
        loop {
            let query = [
                ("affiliation", "owner".to_string()),
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ];
            let resp = check(self.get_with_retry(&url, &query)?)?;
            let repos: Vec<GithubRepo> = resp.json()?;
            if repos.is_empty() {
                break;
            }
            all.extend(repos);
            page += 1;
        }
        info!(owner = %self.owner, count = all.len(), "fetched GitHub repositories");
        Ok(all)
    }

    /// Avatar of the owner account. Best effort: any failure is an empty string.
    pub fn avatar_url(&self) -> String {
        #[derive(Deserialize)]
        struct User {
            #[serde(default)]
            avatar_url: String,
        }

        let mut req = self.http.get(self.url(&format!("/users/{}", self.owner)));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        match req.timeout(Duration::from_secs(5)).send() {
            Ok(resp) if resp.status().is_success() => resp
                .json::<User>()
                .map(|u| u.avatar_url)
                .unwrap_or_default(),
            Ok(resp) => {
                debug!(status = %resp.status(), "avatar lookup failed");
                String::new()
            }
            Err(e) => {
                debug!(error = %e, "avatar lookup failed");
                String::new()
            }
        }
    }

    /// `PATCH /repos/{owner}/{old}` with the new name. Returns the new
    /// repository's html URL.
    pub fn rename_repo(&self, old: &str, new: &str) -> Result<String> {
        let url = self.url(&format!("/repos/{}/{}", self.owner, old));
        let resp = self
            .authed(self.http.patch(url))?
            .json(&json!({ "name": new }))
            .send()?;
        let resp = expect_status(resp, StatusCode::OK)?;
        let repo: GithubRepo = resp.json()?;
        info!(%old, %new, "renamed GitHub repository");
        Ok(repo.html_url)
    }

    pub fn delete_repo(&self, name: &str) -> Result<()> {
        let url = self.url(&format!("/repos/{}/{}", self.owner, name));
        let resp = self.authed(self.http.delete(url))?.send()?;
        expect_status(resp, StatusCode::NO_CONTENT)?;
        info!(%name, "deleted GitHub repository");
        Ok(())
    }

    pub fn update_description(&self, name: &str, description: &str) -> Result<()> {
        let url = self.url(&format!("/repos/{}/{}", self.owner, name));
        let resp = self
            .authed(self.http.patch(url))?
            .json(&json!({ "description": description }))
            .send()?;
        expect_status(resp, StatusCode::OK)?;
        Ok(())
    }
}

fn expect_status(resp: Response, expected: StatusCode) -> Result<Response> {
    if resp.status() == expected {
        return Ok(resp);
    }
    Err(api_error(resp))
}

fn check(resp: Response) -> Result<Response> {
    if resp.status().is_client_error() || resp.status().is_server_error() {
        return Err(api_error(resp));
    }
    Ok(resp)
}

/// Map a failed response to an error, surfacing GitHub's `message` field.
fn api_error(resp: Response) -> FactoryError {
    let status = resp.status();
    let remaining = header(&resp, "X-RateLimit-Remaining");
    if status == StatusCode::FORBIDDEN && remaining.as_deref() == Some("0") {
        let reset = header(&resp, "X-RateLimit-Reset").unwrap_or_default();
        warn!(%reset, "GitHub rate limit exceeded");
        return FactoryError::RateLimited(reset);
    }
    let text = resp.text().unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or(text);
    FactoryError::GitHub {
        status: status.as_u16(),
        message: message.chars().take(MESSAGE_LIMIT).collect(),
    }
}

fn header(resp: &Response, name: &str) -> Option<String> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(server: &mockito::Server) -> GithubClient {
        GithubClient::with_api_base(&server.url(), "acme", Some("t0ken"))
            .unwrap()
            .with_backoff(Duration::from_millis(1))
    }

    fn page_matcher(page: u32) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("affiliation".into(), "owner".into()),
            Matcher::UrlEncoded("per_page".into(), "100".into()),
            Matcher::UrlEncoded("page".into(), page.to_string()),
        ])
    }

    #[test]
    fn lists_repos_across_pages() {
        let mut server = mockito::Server::new();
        let p1 = server
            .mock("GET", "/user/repos")
            .match_query(page_matcher(1))
            .match_header("authorization", "Bearer t0ken")
            .with_status(200)
            .with_body(
                r#"[{"name":"foo","html_url":"https://github.com/acme/foo","private":true,"description":null,"created_at":"2024-01-02T03:04:05Z"}]"#,
            )
            .create();
        let p2 = server
            .mock("GET", "/user/repos")
            .match_query(page_matcher(2))
            .with_status(200)
            .with_body("[]")
            .create();

        let repos = client(&server).list_owned_repos().unwrap();
        p1.assert();
        p2.assert();
        assert_eq!(repos.len(), 1);
        let entry = CatalogRepo::from(repos[0].clone());
        assert_eq!(entry.url, "https://github.com/acme/foo");
        assert!(entry.private);
        assert_eq!(entry.description, "");
    }

    #[test]
    fn retries_server_errors() {
        let mut server = mockito::Server::new();
        let failing = server
            .mock("GET", "/user/repos")
            .match_query(page_matcher(1))
            .with_status(502)
            .expect(MAX_ATTEMPTS as usize)
            .create();

        let err = client(&server).list_owned_repos().unwrap_err();
        failing.assert();
        assert!(matches!(err, FactoryError::GitHub { status: 502, .. }));
    }

    #[test]
    fn rate_limit_is_reported() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/user/repos")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_header("X-RateLimit-Remaining", "0")
            .with_header("X-RateLimit-Reset", "1700000000")
            .with_body(r#"{"message":"API rate limit exceeded"}"#)
            .create();

        let err = client(&server).list_owned_repos().unwrap_err();
        match err {
            FactoryError::RateLimited(reset) => assert_eq!(reset, "1700000000"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rename_sends_new_name() {
        let mut server = mockito::Server::new();
        let m = server
            .mock("PATCH", "/repos/acme/old")
            .match_body(Matcher::Json(json!({"name": "new"})))
            .with_status(200)
            .with_body(r#"{"name":"new","html_url":"https://github.com/acme/new"}"#)
            .create();

        let url = client(&server).rename_repo("old", "new").unwrap();
        m.assert();
        assert_eq!(url, "https://github.com/acme/new");
    }

    #[test]
    fn delete_requires_no_content() {
        let mut server = mockito::Server::new();
        server
            .mock("DELETE", "/repos/acme/gone")
            .with_status(204)
            .create();
        server
            .mock("DELETE", "/repos/acme/locked")
            .with_status(403)
            .with_body(r#"{"message":"Must have admin rights to Repository."}"#)
            .create();

        let c = client(&server);
        c.delete_repo("gone").unwrap();
        match c.delete_repo("locked").unwrap_err() {
            FactoryError::GitHub { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "Must have admin rights to Repository.");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn update_description_patches() {
        let mut server = mockito::Server::new();
        let m = server
            .mock("PATCH", "/repos/acme/foo")
            .match_body(Matcher::Json(json!({"description": "hello"})))
            .with_status(200)
            .with_body("{}")
            .create();
        client(&server).update_description("foo", "hello").unwrap();
        m.assert();
    }

    #[test]
    fn slow_listing_hits_the_configured_timeout() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/user/repos")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_secs(2));
                std::io::Write::write_all(w, b"[]")
            })
            .create();
        let err = client(&server)
            .with_timeout(Duration::from_millis(200))
            .list_owned_repos()
            .unwrap_err();
        assert!(matches!(err, FactoryError::Http(_)), "unexpected error: {err}");
    }

    #[test]
    fn missing_token_fails_before_request() {
        let c = GithubClient::with_api_base("http://127.0.0.1:9", "acme", None).unwrap();
        assert!(matches!(c.delete_repo("x"), Err(FactoryError::MissingToken)));
    }

    #[test]
    fn avatar_is_best_effort() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/users/acme")
            .with_status(200)
            .with_body(r#"{"avatar_url":"https://avatars.example/acme.png"}"#)
            .create();
        assert_eq!(client(&server).avatar_url(), "https://avatars.example/acme.png");

        let c = GithubClient::with_api_base("http://127.0.0.1:9", "acme", None).unwrap();
        assert_eq!(c.avatar_url(), "");
    }
}
