//! # Framework HTTP Client
//!
//! REST client for the document framework hosting the workflow. Implements both
//! [`DocumentStore`] (resource API) and [`RemoteBackend`] (method API).
//!
//! Reads go through `GET /api/resource/{doctype}[/{name}]` and are retried with
//! exponential backoff on server and connection errors. Remote operations go
//! through `POST /api/method/{method}` and are sent exactly once: they start
//! long-running server jobs and a blind resend could duplicate their output.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

use super::error::{ClientError, ClientResult};
use super::operations::{RemoteOperation, RemoteReply};
use super::traits::{DocumentStore, RemoteBackend};
use crate::config::BackendConfig;
use crate::constants::{doctypes, fields};
use crate::logging::log_remote_operation;
use crate::models::{BloodSmearImage, CellDetectionImage, ExtractedCell, MorphologyReport};

const EXTRACTED_CELL_FIELDS: &[&str] = &[
    "name",
    "cell_detection_image",
    "cell_number",
    "primary_classification",
    "validated_classification",
];

/// Read retries back off 1s, 2s, 4s, ... and level off at 32s
const MAX_BACKOFF_EXPONENT: u32 = 5;

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT))
}

#[derive(Clone)]
pub struct FrappeClient {
    client: Client,
    config: BackendConfig,
    base_url: Url,
}

impl std::fmt::Debug for FrappeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrappeClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout_ms", &self.config.timeout_ms)
            .field("max_retries", &self.config.max_retries)
            .field("auth_enabled", &self.config.api_key.is_some())
            .finish()
    }
}

impl FrappeClient {
    /// Create a client, validating the base URL and installing the token header
    /// when API credentials are configured.
    pub fn new(config: BackendConfig) -> ClientResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ClientError::config_error(format!("Invalid base URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::config_error(format!(
                "Base URL cannot carry a path: {}",
                config.base_url
            )));
        }

        let mut default_headers = reqwest::header::HeaderMap::new();
        default_headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        if let (Some(key), Some(secret)) = (&config.api_key, &config.api_secret) {
            default_headers.insert(
                reqwest::header::AUTHORIZATION,
                format!("token {key}:{secret}")
                    .parse()
                    .map_err(|e| ClientError::config_error(format!("Invalid API token: {e}")))?,
            );
            debug!("Configured token authentication");
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(format!("hemoscan-core/{}", env!("CARGO_PKG_VERSION")))
            .default_headers(default_headers)
            .build()
            .map_err(|e| ClientError::config_error(format!("Failed to create HTTP client: {e}")))?;

        info!(
            base_url = %config.base_url,
            timeout_ms = config.timeout_ms,
            auth_enabled = config.api_key.is_some(),
            "Created framework API client"
        );

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::config_error("Base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn read_json(response: Response) -> ClientResult<Value> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<Value>().await?);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(ClientError::api_error(status.as_u16(), server_message(&body)))
    }

    /// GET with retries for recoverable failures, see [`backoff_delay`]
    async fn get_json(&self, url: Url) -> ClientResult<Value> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let result = match self.client.get(url.clone()).send().await {
                Ok(response) => Self::read_json(response).await,
                Err(e) => Err(ClientError::from(e)),
            };

            match result {
                Ok(body) => return Ok(body),
                Err(e) if e.is_recoverable() && attempt < self.config.max_retries => {
                    warn!(
                        url = %url,
                        error = %e,
                        attempt = attempt,
                        max_retries = self.config.max_retries,
                        "Recoverable error reading from framework, will retry"
                    );
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn unwrap_data(mut body: Value) -> ClientResult<Value> {
        body.get_mut("data")
            .map(Value::take)
            .ok_or_else(|| ClientError::invalid_response("data", "missing from resource response"))
    }

    async fn get_doc<T: DeserializeOwned>(&self, doctype: &str, name: &str) -> ClientResult<T> {
        let url = self.endpoint(&["api", "resource", doctype, name])?;
        let body = self.get_json(url).await.map_err(|e| match e {
            ClientError::ApiError { status: 404, .. } => ClientError::not_found(doctype, name),
            other => other,
        })?;
        Ok(serde_json::from_value(Self::unwrap_data(body)?)?)
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        doctype: &str,
        filters: &[(&str, &str)],
        fields: &[&str],
        order_by: Option<&str>,
    ) -> ClientResult<Vec<T>> {
        let mut url = self.endpoint(&["api", "resource", doctype])?;
        let filters: Vec<[&str; 3]> = filters
            .iter()
            .map(|(field, value)| [*field, "=", *value])
            .collect();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("filters", &serde_json::to_string(&filters)?)
                .append_pair("fields", &serde_json::to_string(fields)?)
                .append_pair("limit_page_length", "0");
            if let Some(order_by) = order_by {
                query.append_pair("order_by", order_by);
            }
        }

        let body = self.get_json(url).await?;
        Ok(serde_json::from_value(Self::unwrap_data(body)?)?)
    }

    async fn update_doc<T: DeserializeOwned>(
        &self,
        doctype: &str,
        name: &str,
        changes: &Value,
    ) -> ClientResult<T> {
        let url = self.endpoint(&["api", "resource", doctype, name])?;
        let response = self.client.put(url).json(changes).send().await?;
        let body = Self::read_json(response).await.map_err(|e| match e {
            ClientError::ApiError { status: 404, .. } => ClientError::not_found(doctype, name),
            other => other,
        })?;
        Ok(serde_json::from_value(Self::unwrap_data(body)?)?)
    }

    /// Call a whitelisted method once and unwrap the `message` envelope
    async fn call_method(&self, method: &str, args: &Value) -> ClientResult<Value> {
        let url = self.endpoint(&["api", "method", method])?;
        let response = self.client.post(url).json(args).send().await?;
        let mut body = Self::read_json(response).await?;
        Ok(body.get_mut("message").map(Value::take).unwrap_or(Value::Null))
    }
}

/// Pull the most useful line out of a framework error body
fn server_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["exception", "message", "exc_type"] {
            if let Some(text) = value.get(key).and_then(Value::as_str) {
                return text.to_string();
            }
        }
    }
    body.chars().take(200).collect()
}

#[async_trait]
impl RemoteBackend for FrappeClient {
    async fn execute(&self, operation: &RemoteOperation) -> ClientResult<RemoteReply> {
        let started = Instant::now();
        let result = self.call_method(operation.method(), &operation.args()).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(message) => {
                log_remote_operation(
                    operation.name(),
                    operation.document(),
                    "completed",
                    Some(duration_ms),
                    None,
                );
                RemoteReply::decode(operation, message)
            }
            Err(e) => {
                log_remote_operation(
                    operation.name(),
                    operation.document(),
                    "error",
                    Some(duration_ms),
                    Some(&e.to_string()),
                );
                Err(e)
            }
        }
    }
}

#[async_trait]
impl DocumentStore for FrappeClient {
    async fn get_blood_smear(&self, name: &str) -> ClientResult<BloodSmearImage> {
        self.get_doc(doctypes::BLOOD_SMEAR_IMAGE, name).await
    }

    async fn find_detection_image(
        &self,
        blood_smear: &str,
    ) -> ClientResult<Option<CellDetectionImage>> {
        let images: Vec<CellDetectionImage> = self
            .get_list(
                doctypes::CELL_DETECTION_IMAGE,
                &[(fields::BLOOD_SMEAR_IMAGE, blood_smear)],
                &["*"],
                Some("creation desc"),
            )
            .await?;
        Ok(images.into_iter().next())
    }

    async fn list_extracted_cells(
        &self,
        detection_image: &str,
    ) -> ClientResult<Vec<ExtractedCell>> {
        self.get_list(
            doctypes::EXTRACTED_CELL,
            &[(fields::CELL_DETECTION_IMAGE, detection_image)],
            EXTRACTED_CELL_FIELDS,
            Some("cell_number asc"),
        )
        .await
    }

    async fn find_report(&self, detection_image: &str) -> ClientResult<Option<MorphologyReport>> {
        let reports: Vec<MorphologyReport> = self
            .get_list(
                doctypes::RBC_MORPHOLOGY_ANALYSIS,
                &[(fields::CELL_DETECTION_IMAGE, detection_image)],
                &["*"],
                Some("creation desc"),
            )
            .await?;
        Ok(reports.into_iter().next())
    }

    async fn get_report(&self, name: &str) -> ClientResult<MorphologyReport> {
        self.get_doc(doctypes::RBC_MORPHOLOGY_ANALYSIS, name).await
    }

    async fn save_report(&self, report: &MorphologyReport) -> ClientResult<MorphologyReport> {
        let changes = json!({
            "approved_by": report.approved_by,
            "approval_date": report.approval_date,
        });
        self.update_doc(doctypes::RBC_MORPHOLOGY_ANALYSIS, &report.name, &changes)
            .await
    }
}
