//! Reflect REST client
//!
//! Thin bearer-authenticated wrapper; no retries, no caching.
//!
//! Every endpoint decodes into the caller's choice of type: the structs in
//! [`super::types`] for typed access, or [`serde_json::Value`] to pass the
//! API's JSON through untouched.

use reqwest::{Client, Method, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::types::{DailyNoteAppend, NewLink, NewNote, ReflectUser};
use crate::{Error, Result};

/// Default `user-agent` header
pub const DEFAULT_USER_AGENT: &str = "reflect-mcp-connector";

/// Daily note writes always append to a list
const DAILY_NOTE_TRANSFORM: &str = "list-append";

#[derive(Serialize)]
struct DailyNoteBody<'a> {
    #[serde(flatten)]
    append: &'a DailyNoteAppend,
    transform_type: &'static str,
}

/// Reflect API client
#[derive(Clone)]
pub struct ReflectClient {
    http: Client,
    access_token: String,
    base_url: Url,
    user_agent: String,
}

impl std::fmt::Debug for ReflectClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflectClient")
            .field("base_url", &self.base_url.as_str())
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl ReflectClient {
    /// Create a client for `base_url` (trailing slashes are ignored)
    pub fn new(access_token: impl Into<String>, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| Error::Config(format!("Invalid API base URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "API base URL cannot be used as a base: {base_url}"
            )));
        }

        Ok(Self {
            http: Client::new(),
            access_token: access_token.into(),
            base_url,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        })
    }

    /// Override the `user-agent` header
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// `GET /users/me`
    pub async fn get_me<T: DeserializeOwned>(&self) -> Result<T> {
        self.request_json(Method::GET, &["users", "me"], None).await
    }

    /// `GET /graphs`
    pub async fn list_graphs<T: DeserializeOwned>(&self) -> Result<T> {
        self.request_json(Method::GET, &["graphs"], None).await
    }

    /// `GET /graphs/{graph}/books`
    pub async fn list_books<T: DeserializeOwned>(&self, graph_id: &str) -> Result<T> {
        self.request_json(Method::GET, &["graphs", graph_id, "books"], None)
            .await
    }

    /// `GET /graphs/{graph}/links`
    pub async fn list_links<T: DeserializeOwned>(&self, graph_id: &str) -> Result<T> {
        self.request_json(Method::GET, &["graphs", graph_id, "links"], None)
            .await
    }

    /// `POST /graphs/{graph}/links`
    pub async fn create_link<T: DeserializeOwned>(
        &self,
        graph_id: &str,
        link: &NewLink,
    ) -> Result<T> {
        let body = serde_json::to_value(link)?;
        self.request_json(Method::POST, &["graphs", graph_id, "links"], Some(body))
            .await
    }

    /// `PUT /graphs/{graph}/daily-notes` as a list append
    pub async fn append_daily_note<T: DeserializeOwned>(
        &self,
        graph_id: &str,
        append: &DailyNoteAppend,
    ) -> Result<T> {
        let body = serde_json::to_value(DailyNoteBody {
            append,
            transform_type: DAILY_NOTE_TRANSFORM,
        })?;
        self.request_json(Method::PUT, &["graphs", graph_id, "daily-notes"], Some(body))
            .await
    }

    /// `POST /graphs/{graph}/notes`
    pub async fn create_note<T: DeserializeOwned>(
        &self,
        graph_id: &str,
        note: &NewNote,
    ) -> Result<T> {
        let body = serde_json::to_value(note)?;
        self.request_json(Method::POST, &["graphs", graph_id, "notes"], Some(body))
            .await
    }

    /// Use `explicit` if given, otherwise the user's first graph
    pub async fn resolve_default_graph_id(&self, explicit: Option<&str>) -> Result<String> {
        if let Some(id) = explicit.filter(|id| !id.is_empty()) {
            return Ok(id.to_string());
        }
        let me: ReflectUser = self.get_me().await?;
        me.graph_ids
            .into_iter()
            .next()
            .ok_or(Error::NoGraph)
    }

    /// Base URL joined with percent-encoded path segments
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<Value>,
    ) -> Result<T> {
        let url = self.endpoint(segments);
        debug!(%method, url = %url, "Reflect API request");

        let mut request = self
            .http
            .request(method, url.clone())
            .bearer_auth(&self.access_token)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::USER_AGENT, &self.user_agent);
        if let Some(body) = body {
            request = request.body(serde_json::to_vec(&body)?);
        }

        let response = request.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let raw = response.text().await?;

        if !status.is_success() {
            let message = if raw.is_empty() {
                status.canonical_reason().unwrap_or_default().to_string()
            } else {
                raw
            };
            return Err(Error::Api {
                status: status.as_u16(),
                url: url.to_string(),
                message,
            });
        }

        if raw.is_empty() {
            return Ok(serde_json::from_value(Value::Null)?);
        }
        if content_type.contains("application/json") {
            return Ok(serde_json::from_str(&raw)?);
        }

        Err(Error::Api {
            status: status.as_u16(),
            url: url.to_string(),
            message: format!("Unexpected content-type: {content_type}"),
        })
    }
}
