//! Stateful HTTP client backing the REST steps.
//!
//! Mirrors what a feature sees: default headers and an endpoint configured by
//! earlier steps, and the last response for assertions in later steps.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use indexmap::IndexMap;
use reqwest::{Client, Method};
use serde_json::{Map as JsonMap, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::encoding::value_as_text;

pub const DEFAULT_ACCEPT: &str = "application/json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Last response received by a [`RestClient`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestResponse {
    pub status_code: u16,
    /// Header names are lowercase.
    pub headers: IndexMap<String, String>,
    /// Parsed JSON body; `None` for an empty body.
    pub body: Option<Value>,
    pub text: String,
}

impl RestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// The body, with an empty body as `null`.
    pub fn body_value(&self) -> Value {
        self.body.clone().unwrap_or(Value::Null)
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Text(String),
}

#[derive(Debug)]
struct ClientState {
    headers: IndexMap<String, String>,
    endpoint: String,
    response: Option<RestResponse>,
}

#[derive(Debug)]
pub struct RestClient {
    http: Client,
    state: Mutex<ClientState>,
}

impl RestClient {
    pub fn new() -> Result<Self> {
        Self::with_endpoint("")
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("build http client")?;
        let mut headers = IndexMap::new();
        headers.insert("Accept".to_string(), DEFAULT_ACCEPT.to_string());
        Ok(Self {
            http,
            state: Mutex::new(ClientState {
                headers,
                endpoint: endpoint.into(),
                response: None,
            }),
        })
    }

    /// Sets a default header, replacing any header with the same name
    /// regardless of case.
    pub async fn set_header(&self, name: &str, value: &str) {
        let mut state = self.state.lock().await;
        state.headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
        state.headers.insert(name.to_string(), value.to_string());
    }

    pub async fn set_endpoint(&self, endpoint: &str) {
        self.state.lock().await.endpoint = endpoint.to_string();
    }

    pub async fn endpoint(&self) -> String {
        self.state.lock().await.endpoint.clone()
    }

    pub async fn headers(&self) -> IndexMap<String, String> {
        self.state.lock().await.headers.clone()
    }

    /// The last response, or an error when no request was sent yet.
    pub async fn response(&self) -> Result<RestResponse> {
        self.state
            .lock()
            .await
            .response
            .clone()
            .ok_or_else(|| anyhow!("no request has been sent yet"))
    }

    /// Sends a request and records its response. Returns the requested URL.
    ///
    /// Fails when the response media type is not covered by the `Accept`
    /// header or when a non-empty body is not JSON.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: Option<&JsonMap<String, Value>>,
        body: Option<RequestBody>,
    ) -> Result<String> {
        let (url, headers) = {
            let state = self.state.lock().await;
            (resolve_url(&state.endpoint, path), state.headers.clone())
        };

        let mut builder = self.http.request(method.clone(), &url);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(query) = query.filter(|query| !query.is_empty()) {
            let pairs: Vec<(String, String)> = query
                .iter()
                .map(|(key, value)| (key.clone(), value_as_text(value)))
                .collect();
            builder = builder.query(&pairs);
        }
        builder = match body {
            Some(RequestBody::Json(value)) => builder.json(&value),
            Some(RequestBody::Text(text)) => builder.body(text),
            None => builder,
        };

        debug!(%method, %url, header_count = headers.len(), "sending request");
        let response = builder.send().await.with_context(|| format!("{method} {url} failed"))?;
        let status_code = response.status().as_u16();
        let response_headers: IndexMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|value| (name.as_str().to_string(), value.to_string())))
            .collect();
        let text = response.text().await.context("read response body")?;
        debug!(%url, status_code, body_len = text.len(), "received response");

        let content_type = response_headers.get("content-type").cloned().unwrap_or_default();
        let media_type = content_type.split(';').next().unwrap_or_default().trim();
        if let Some(accept) = header_value(&headers, "accept")
            && !accepts(accept, media_type)
        {
            debug!(%url, body = %text, "response media type rejected");
            bail!("The content-type \"{content_type}\" of the response does not match accepted media-type {accept}");
        }

        let body = if text.trim().is_empty() {
            None
        } else {
            if !is_json_media_type(media_type) {
                debug!(%url, body = %text, "response body is not JSON");
                bail!("The content-type \"{content_type}\" of the response is not JSON!");
            }
            Some(serde_json::from_str(&text).with_context(|| format!("response body of {url} is not valid JSON"))?)
        };

        self.state.lock().await.response = Some(RestResponse {
            status_code,
            headers: response_headers,
            body,
            text,
        });
        Ok(url)
    }
}

/// Absolute URLs are used as-is; anything else is joined onto the endpoint.
pub fn resolve_url(endpoint: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!("{}/{}", endpoint.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn header_value<'a>(headers: &'a IndexMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn accepts(accept: &str, media_type: &str) -> bool {
    accept.contains(media_type) || accept.contains("*/*")
}

/// `application/json` or a structured suffix such as `application/problem+json`.
fn is_json_media_type(media_type: &str) -> bool {
    let Some(subtype) = media_type.strip_prefix("application/") else {
        return false;
    };
    if subtype == "json" {
        return true;
    }
    subtype
        .strip_suffix("+json")
        .is_some_and(|prefix| !prefix.is_empty() && !prefix.contains([' ', '/']))
}
