use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::Value;
use std::fmt::Debug;

use crate::error::{Result, WeatherFlowError};

pub const DEFAULT_BASE_URL: &str = "https://swd.weatherflow.com/swd/rest";

/// Issues GET requests against the REST API and hands back the parsed JSON body.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    http: Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {url} ({} query parameters)", query.len());

        let res = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|source| WeatherFlowError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|source| WeatherFlowError::Transport {
            url: url.clone(),
            source,
        })?;

        let parsed = serde_json::from_str::<Value>(&body);

        if !status.is_success() {
            // The API still reports auth and lookup failures through its status object.
            if let Ok(json) = &parsed {
                check_status(json)?;
            }
            return Err(WeatherFlowError::Http {
                url,
                status,
                body: truncate_body(&body),
            });
        }

        parsed.map_err(|err| WeatherFlowError::InvalidResponse {
            endpoint: path.to_string(),
            message: format!("body is not JSON ({err}): {}", truncate_body(&body)),
        })
    }
}

/// Rejects bodies carrying a non-zero `status.status_code` or a legacy `error` field.
pub fn check_status(body: &Value) -> Result<()> {
    if let Some(message) = body.get("error").filter(|e| !e.is_null()) {
        let message = message
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| message.to_string());
        return Err(WeatherFlowError::VendorStatus { code: -1, message });
    }

    if let Some(status) = body.get("status") {
        let code = status.get("status_code").and_then(Value::as_i64).unwrap_or(0);
        if code != 0 {
            let message = status
                .get("status_message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Err(WeatherFlowError::VendorStatus { code, message });
        }
    }

    Ok(())
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
