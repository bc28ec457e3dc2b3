// Shared types and utilities for talking to the filter-graph server

use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::settings::ClientSettings;

/// Error type for filter-graph server calls
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteError {
    /// HTTP request failed
    RequestFailed(String),
    /// Server answered with a non-success status
    ApiError { status: u16, message: String },
    /// Failed to parse response
    ParseError(String),
    /// Missing required field
    MissingField(String),
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::RequestFailed(msg) => write!(f, "Request failed: {}", msg),
            RemoteError::ApiError { status, message } => {
                write!(f, "Graph server error {}: {}", status, message)
            }
            RemoteError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            RemoteError::MissingField(field) => write!(f, "Missing required field: {}", field),
        }
    }
}

impl std::error::Error for RemoteError {}

/// HTTP client for the filter-graph server
#[derive(Clone)]
pub struct FilterGraphClient {
    client: Client,
    base_url: String,
}

impl FilterGraphClient {
    /// Create a client with reqwest defaults
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: trim_base_url(base_url.into()),
        }
    }

    /// Create a client honoring the configured timeout
    pub fn from_settings(settings: &ClientSettings) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| RemoteError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: trim_base_url(settings.server_url.clone()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET a path and parse the body as JSON
    pub async fn get_json(&self, path: &str) -> Result<Value, RemoteError> {
        let url = format!("{}{}", self.base_url, path);

        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RemoteError::RequestFailed(e.to_string()))?;

        read_json(res).await
    }

    /// Send a JSON payload with an arbitrary method and parse the reply
    pub async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
    ) -> Result<Value, RemoteError> {
        let url = format!("{}{}", self.base_url, path);

        let res = self
            .client
            .request(method, &url)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| RemoteError::RequestFailed(e.to_string()))?;

        read_json(res).await
    }
}

async fn read_json(res: reqwest::Response) -> Result<Value, RemoteError> {
    if !res.status().is_success() {
        let status = res.status().as_u16();
        let text = res.text().await.unwrap_or_default();
        return Err(RemoteError::ApiError {
            status,
            message: text,
        });
    }

    let body = res
        .text()
        .await
        .map_err(|e| RemoteError::ParseError(e.to_string()))?;

    // The server writes jsonpickle text, often without a JSON content type
    serde_json::from_str(&body)
        .map_err(|e| RemoteError::ParseError(format!("Failed to parse response: {}", e)))
}

fn trim_base_url(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

/// Pull a `{"parameters": {...}}` envelope apart
pub(crate) fn parameters_envelope(
    json: Value,
) -> Result<serde_json::Map<String, Value>, RemoteError> {
    match json {
        Value::Object(mut map) => match map.remove("parameters") {
            Some(Value::Object(parameters)) => Ok(parameters),
            Some(other) => Err(RemoteError::ParseError(format!(
                "parameters is not an object: {}",
                other
            ))),
            None => Err(RemoteError::MissingField("parameters".to_string())),
        },
        other => Err(RemoteError::ParseError(format!(
            "expected a parameter definition object, got {}",
            other
        ))),
    }
}
