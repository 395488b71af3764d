//! Thin REST shim over the Workspace admin APIs
//!
//! One pooled client, one generic JSON request path. The shim classifies
//! HTTP outcomes into the crate error kinds (429/5xx transient, other
//! non-success terminal) and otherwise treats payloads as opaque JSON. It
//! performs no retries itself; the retrier wraps calls at the worker level.

use std::time::Duration;

use reqwest::{Client, ClientBuilder, Method, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// Base URLs for the upstream services, injectable for tests
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub directory: String,
    pub calendar: String,
    pub gmail: String,
    pub drive: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            directory: "https://admin.googleapis.com/admin/directory/v1".to_string(),
            calendar: "https://www.googleapis.com/calendar/v3".to_string(),
            gmail: "https://gmail.googleapis.com/gmail/v1".to_string(),
            drive: "https://www.googleapis.com/drive/v3".to_string(),
        }
    }
}

/// Pooled HTTP client shared by all verb handlers
pub struct RestClient {
    client: Client,
    endpoints: Endpoints,
    access_token: Option<String>,
}

impl RestClient {
    /// Creates a client with connection pooling and keepalive tuned for
    /// sustained batch traffic
    pub fn new(timeout: Duration, access_token: Option<String>) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("gwadm/", env!("CARGO_PKG_VERSION")))
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Transient(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoints: Endpoints::default(),
            access_token,
        })
    }

    /// Overrides the upstream base URLs
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Sends one JSON request and returns the decoded body
    ///
    /// Delete-style endpoints answer 204 with an empty body; those come back
    /// as `Value::Null` and the caller substitutes its composite record.
    pub async fn request_json(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        debug!("{} {}", method, url);

        let mut req = self.client.request(method, url);
        if let Some(token) = &self.access_token {
            req = req.bearer_auth(token);
        }
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(Error::from)?;
        let status = resp.status();
        let text = resp.text().await.map_err(Error::from)?;

        if !status.is_success() {
            return Err(Error::from_status(status.as_u16(), truncate(&text, 512)));
        }
        if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| Error::Upstream {
                status: status.as_u16(),
                message: format!("undecodable response body: {}", e),
            })
    }

    pub async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        self.request_json(Method::GET, url, query, None).await
    }

    pub async fn post(&self, url: &str, body: &Value) -> Result<Value> {
        self.request_json(Method::POST, url, &[], Some(body)).await
    }

    pub async fn put(&self, url: &str, body: &Value) -> Result<Value> {
        self.request_json(Method::PUT, url, &[], Some(body)).await
    }

    pub async fn patch(&self, url: &str, body: &Value) -> Result<Value> {
        self.request_json(Method::PATCH, url, &[], Some(body)).await
    }

    pub async fn delete(&self, url: &str) -> Result<Value> {
        self.request_json(Method::DELETE, url, &[], None).await
    }
}

/// Directory listing surface backing recursive expansion
///
/// Thin pagination shims over the Directory API; the expander owns dedup,
/// nesting, and concurrency.
pub struct DirectoryService {
    rest: std::sync::Arc<RestClient>,
}

impl DirectoryService {
    pub fn new(rest: std::sync::Arc<RestClient>) -> Self {
        Self { rest }
    }

    /// Follows `nextPageToken` pagination, collecting one array field
    async fn collect_pages(
        &self,
        url: &str,
        base_query: &[(&str, String)],
        items_field: &str,
    ) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query: Vec<(&str, String)> = base_query.to_vec();
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }
            let page = self.rest.get(url, &query).await?;

            if let Some(Value::Array(chunk)) = page.get(items_field) {
                items.extend(chunk.iter().cloned());
            }
            page_token = page
                .get("nextPageToken")
                .and_then(Value::as_str)
                .map(str::to_string);
            if page_token.is_none() {
                return Ok(items);
            }
        }
    }
}

#[async_trait::async_trait]
impl crate::recurse::DirectoryLister for DirectoryService {
    async fn users_in_orgunit(&self, org_unit: &str) -> Result<Vec<String>> {
        let url = format!("{}/users", self.rest.endpoints().directory);
        let query = vec![
            ("customer", "my_customer".to_string()),
            ("query", format!("orgUnitPath='{}'", org_unit)),
            ("projection", "basic".to_string()),
        ];
        let users = self.collect_pages(&url, &query, "users").await?;
        Ok(users
            .iter()
            .filter_map(|u| u.get("primaryEmail").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    async fn group_members(&self, group: &str) -> Result<Vec<crate::recurse::Member>> {
        let url = format!("{}/groups/{}/members", self.rest.endpoints().directory, group);
        let members = self.collect_pages(&url, &[], "members").await?;
        Ok(members
            .iter()
            .filter_map(|m| {
                let email = m.get("email").and_then(Value::as_str)?;
                match m.get("type").and_then(Value::as_str) {
                    Some("GROUP") => Some(crate::recurse::Member::group(email)),
                    // CUSTOMER and other kinds have no user expansion
                    Some("USER") | None => Some(crate::recurse::Member::user(email)),
                    _ => None,
                }
            })
            .collect())
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}
