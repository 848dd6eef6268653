/// Reflection client: the single point of entry for AI reflection calls.
///
/// `generate` never fails. Any transport error, non-2xx status or malformed
/// body yields the canned fallback reflection instead. One attempt per call;
/// callers re-invoke if they want another try.
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::notes::models::Reflection;

pub mod fallback;
pub mod handlers;

pub use fallback::fallback_reflection;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ReflectionError {
    #[error("Reflection endpoint is not configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Endpoint error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Response is not a reflection: {0}")]
    Malformed(String),
}

#[derive(Debug, Serialize)]
struct ReflectionRequest<'a> {
    transcript: &'a str,
}

#[derive(Clone)]
pub struct ReflectionClient {
    client: Client,
    endpoint: Option<String>,
}

impl ReflectionClient {
    pub fn new(endpoint: Option<String>) -> Result<Self, ReflectionError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.filter(|e| !e.trim().is_empty()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Reflection for `transcript`, or the fallback one.
    pub async fn generate(&self, transcript: &str) -> Reflection {
        if transcript.trim().is_empty() {
            debug!("Empty transcript; using fallback reflection");
            return fallback_reflection();
        }
        match self.call(transcript).await {
            Ok(reflection) => reflection,
            Err(e) => {
                warn!("AI reflection unavailable, using fallback: {e}");
                fallback_reflection()
            }
        }
    }

    /// One POST to the endpoint.
    pub async fn call(&self, transcript: &str) -> Result<Reflection, ReflectionError> {
        let endpoint = self.endpoint.as_deref().ok_or(ReflectionError::NotConfigured)?;

        let response = self
            .client
            .post(endpoint)
            .header("content-type", "application/json")
            .json(&ReflectionRequest { transcript })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ReflectionError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let reflection = parse_reflection(&body)?;
        debug!(
            "Reflection generated: {} key points",
            reflection.key_points.len()
        );
        Ok(reflection)
    }
}

/// Parses an endpoint body. All three lists must be present.
pub fn parse_reflection(body: &str) -> Result<Reflection, ReflectionError> {
    let value: serde_json::Value = serde_json::from_str(strip_json_fences(body))
        .map_err(|e| ReflectionError::Malformed(e.to_string()))?;
    Reflection::from_value(&value)
        .ok_or_else(|| ReflectionError::Malformed("missing keyPoints, questions or suggestions".into()))
}

/// Strips ```json ... ``` or ``` ... ``` code fences around a JSON body.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(stripped) = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
    else {
        return text;
    };
    stripped
        .trim_start()
        .strip_suffix("```")
        .map(|s| s.trim())
        .unwrap_or(stripped.trim_start())
}
