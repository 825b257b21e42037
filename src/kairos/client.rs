//! KairosDB REST API Client
//!
//! HTTP client for the datapoints query endpoint. One client is built per
//! process and shared; reqwest pools connections underneath.

use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use thiserror::Error;

use super::models::{MetricsQuery, MetricsQueryResponse, ValidationError};

/// Path of the datapoints query endpoint
pub const METRICS_QUERY_PATH: &str = "/api/v1/datapoints/query";

/// Anything that can run a [`MetricsQuery`] against a backend
#[async_trait]
pub trait QueryClient: Send + Sync {
    /// Execute a query and return the decoded response
    async fn query_metrics(
        &self,
        query: &MetricsQuery,
    ) -> Result<MetricsQueryResponse, KairosError>;
}

/// Configuration for the KairosDB client
#[derive(Debug, Clone)]
pub struct KairosConfig {
    /// Base URL of the KairosDB server (e.g., "http://localhost:8080")
    pub base_url: String,
    /// Per-request read timeout in milliseconds
    pub read_timeout_ms: u64,
}

impl Default for KairosConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            read_timeout_ms: 30_000,
        }
    }
}

/// KairosDB REST API client
pub struct KairosDbClient {
    client: Client,
    config: KairosConfig,
}

impl KairosDbClient {
    /// Create a new client with the given configuration
    pub fn new(config: KairosConfig) -> Result<Self, KairosError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .build()
            .map_err(KairosError::Request)?;

        Ok(Self { client, config })
    }

    /// Get the current configuration
    pub fn config(&self) -> &KairosConfig {
        &self.config
    }

    fn query_url(&self) -> String {
        format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            METRICS_QUERY_PATH
        )
    }
}

#[async_trait]
impl QueryClient for KairosDbClient {
    async fn query_metrics(
        &self,
        query: &MetricsQuery,
    ) -> Result<MetricsQueryResponse, KairosError> {
        query.validate()?;

        let url = self.query_url();
        let started = Instant::now();

        let response = self
            .client
            .post(&url)
            .json(query)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(KairosError::ApiError {
                status: status.as_u16(),
                message: text,
            });
        }

        let body = response.text().await.map_err(classify)?;
        let decoded: MetricsQueryResponse = serde_json::from_str(&body)
            .map_err(|e| KairosError::Deserialization(e.to_string()))?;

        tracing::debug!(
            metrics = query.metrics.len(),
            queries = decoded.queries.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "KairosDB query completed"
        );

        Ok(decoded)
    }
}

fn classify(e: reqwest::Error) -> KairosError {
    if e.is_timeout() {
        KairosError::Timeout
    } else if e.is_connect() {
        KairosError::Unavailable
    } else {
        KairosError::Request(e)
    }
}

// ============================================
// Errors
// ============================================

/// Errors that can occur when querying KairosDB
#[derive(Error, Debug)]
pub enum KairosError {
    #[error("KairosDB unavailable")]
    Unavailable,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid response body: {0}")]
    Deserialization(String),

    #[error(transparent)]
    InvalidQuery(#[from] ValidationError),
}
