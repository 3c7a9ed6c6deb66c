//! HTTP client for the birthday backend.
//!
//! Endpoints:
//! - `GET  /api/messages` – list submitted wishes (bare array or `{messages: [...]}`)
//! - `POST /api/messages` – submit `{name, message, emoji}`
//! - `GET  /api/stats`    – visitor and message counters
//! - `POST /api/visit`    – fire-and-forget visit log

use crate::source::WishBackend;
use crate::wish::NewMessage;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default backend address (the Express server listens on 3000).
pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Successful `POST /api/messages` answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SubmitReceipt {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub id: Option<i64>,
    /// Reward code, handed out to some submitters.
    #[serde(default)]
    pub red_packet_code: Option<String>,
}

/// `GET /api/stats` answer. Missing counters read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    #[serde(default)]
    pub total_messages: u64,
    #[serde(default)]
    pub total_visitors: u64,
    #[serde(default)]
    pub unique_messagers: u64,
    #[serde(default)]
    pub today_messages: u64,
    #[serde(default)]
    pub today_visitors: u64,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct VisitBody<'a> {
    page: &'a str,
    timestamp: String,
}

/// Client for one backend instance.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Raw body of `GET /api/messages`. Non-success status is an error.
    pub async fn list_messages_raw(&self) -> Result<String> {
        let response = self.client.get(self.url("/api/messages")).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    /// Submit a wish. HTTP 4xx/5xx answers become [`Error::Rejected`] carrying
    /// the backend's `error` text when it sent one.
    pub async fn post_message(&self, message: &NewMessage) -> Result<SubmitReceipt> {
        let response = self
            .client
            .post(self.url("/api/messages"))
            .json(message)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let reason = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.error)
                .unwrap_or_else(|_| format!("HTTP {}", status.as_u16()));
            return Err(Error::Rejected(reason));
        }
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn stats(&self) -> Result<Stats> {
        let response = self.client.get(self.url("/api/stats")).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Log a page visit. Failures are only traced.
    pub async fn record_visit(&self, page: &str) {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs().to_string())
            .unwrap_or_default();
        let body = VisitBody { page, timestamp };
        let result = self
            .client
            .post(self.url("/api/visit"))
            .json(&body)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(page, "visit recorded");
            }
            Ok(response) => {
                tracing::warn!(page, status = response.status().as_u16(), "visit not recorded");
            }
            Err(e) => tracing::warn!(page, error = %e, "visit not recorded"),
        }
    }
}

impl WishBackend for ApiClient {
    async fn fetch_messages(&self) -> Result<String> {
        self.list_messages_raw().await
    }

    async fn submit_message(&self, message: &NewMessage) -> Result<SubmitReceipt> {
        self.post_message(message).await
    }

    async fn record_visit(&self, page: &str) {
        ApiClient::record_visit(self, page).await
    }
}
