//! HTTP client implementation for the Strava activities endpoint.
//!
//! This module provides a reqwest-based implementation of the [`PageSource`](crate::PageSource) trait.

use crate::config::ClientConfig;
use crate::{PageRequest, PageSource, StravaError};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

const BODY_SNIPPET_CHARS: usize = 256;

/// Client for `GET /athlete/activities` using reqwest.
#[derive(Clone, Debug)]
pub struct ReqwestStravaClient {
    base_url: String,
    client: reqwest::Client,
}

impl ReqwestStravaClient {
    /// Create a client against `base_url` (e.g. "https://www.strava.com/api/v3").
    pub fn new(base_url: &str) -> Result<Self, StravaError> {
        Self::from_config(&ClientConfig {
            base_url: base_url.into(),
            ..ClientConfig::default()
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, StravaError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: builder.build()?,
        })
    }

    pub fn activities_url(&self) -> String {
        format!("{}/athlete/activities", self.base_url)
    }

    /// Build an authenticated GET request.
    fn get_request(&self, url: &str, access_token: &SecretString) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .bearer_auth(access_token.expose_secret())
    }

    /// Extract error information from a failed response.
    async fn error_from_response(&self, resp: reqwest::Response) -> StravaError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        StravaError::Status {
            status,
            body: snippet(&body),
        }
    }
}

#[async_trait]
impl PageSource for ReqwestStravaClient {
    async fn fetch_page(
        &self,
        access_token: &SecretString,
        request: PageRequest,
    ) -> Result<Vec<Value>, StravaError> {
        let url = self.activities_url();
        let resp = self
            .get_request(&url, access_token)
            .query(&request)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(self.error_from_response(resp).await);
        }
        // Read body as text first so a payload of the wrong shape can be
        // reported with a snippet instead of a bare decode error.
        let text = resp.text().await?;
        parse_page(&text)
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_CHARS).collect()
}

/// Interpret a 2xx body: an array is a page, anything else is an error.
fn parse_page(text: &str) -> Result<Vec<Value>, StravaError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(Value::Object(obj)) => Err(StravaError::ErrorPayload(error_message(&obj))),
        Ok(_) => Err(StravaError::ErrorPayload(format!(
            "unexpected payload: {}",
            snippet(text)
        ))),
        Err(e) => Err(StravaError::ErrorPayload(format!(
            "decoding activities page: {} - body: {}",
            e,
            snippet(text)
        ))),
    }
}

/// Summarize a Strava fault object, e.g.
/// `{"message":"Authorization Error","errors":[{"resource":"Athlete","field":"access_token","code":"invalid"}]}`.
fn error_message(obj: &serde_json::Map<String, Value>) -> String {
    let message = obj
        .get("message")
        .or_else(|| obj.get("error"))
        .and_then(Value::as_str);
    let details: Vec<String> = obj
        .get("errors")
        .and_then(Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| {
                    let field = e.get("field").and_then(Value::as_str)?;
                    let code = e.get("code").and_then(Value::as_str).unwrap_or("error");
                    Some(format!("{field}: {code}"))
                })
                .collect()
        })
        .unwrap_or_default();

    match (message, details.is_empty()) {
        (Some(m), true) => m.to_string(),
        (Some(m), false) => format!("{} ({})", m, details.join(", ")),
        (None, false) => details.join(", "),
        (None, true) => snippet(&Value::Object(obj.clone()).to_string()),
    }
}
