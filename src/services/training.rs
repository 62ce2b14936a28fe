//! FAL AI training client and webhook payload parsing

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use crate::config::FalConfig;
use crate::models::avatar::TrainingOutcome;
use crate::utils::errors::{AishaError, Result, TrainingError};
use crate::utils::logging::log_api_error;

/// What a training run needs from the avatar
#[derive(Debug, Clone, Serialize)]
pub struct TrainingRequest {
    pub images_data_url: String,
    pub trigger_word: String,
    pub steps: i32,
    pub create_masks: bool,
    pub is_style: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueSubmission {
    pub request_id: String,
    #[serde(default)]
    pub status_url: Option<String>,
    #[serde(default)]
    pub response_url: Option<String>,
}

/// Remote model training API
#[async_trait]
pub trait TrainingApi: Send + Sync {
    /// Queue a training run; returns the external request id
    async fn submit_training(&self, request: &TrainingRequest, webhook_url: &str) -> Result<String>;
}

/// FAL AI queue client
#[derive(Clone, Debug)]
pub struct FalClient {
    client: Client,
    config: FalConfig,
}

impl FalClient {
    pub fn new(config: FalConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("Aisha-Bot/1.0")
            .build()?;

        Ok(Self { client, config })
    }

    fn submit_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.queue_url.trim_end_matches('/'),
            self.config.training_model.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl TrainingApi for FalClient {
    async fn submit_training(&self, request: &TrainingRequest, webhook_url: &str) -> Result<String> {
        debug!(model = %self.config.training_model, steps = request.steps, "Submitting training to FAL AI");

        let response = self
            .client
            .post(self.submit_url())
            .query(&[("fal_webhook", webhook_url)])
            .header("Authorization", format!("Key {}", self.config.api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AishaError::Training(TrainingError::Timeout)
                } else {
                    AishaError::Training(TrainingError::RequestFailed(e.to_string()))
                }
            })?;

        let status = response.status();
        if status.is_server_error() {
            log_api_error("fal", &status.to_string(), Some("submit_training"));
            return Err(AishaError::Training(TrainingError::ServiceUnavailable));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log_api_error("fal", &body, Some("submit_training"));
            return Err(AishaError::Training(TrainingError::RequestFailed(format!("{}: {}", status, body))));
        }

        let submission: QueueSubmission = response
            .json()
            .await
            .map_err(|e| AishaError::Training(TrainingError::InvalidResponse(e.to_string())))?;

        info!(request_id = %submission.request_id, "Training queued");
        Ok(submission.request_id)
    }
}

/// Status reported by a training callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookStatus {
    Finished(TrainingOutcome),
    /// Queued or running; nothing to record
    InProgress(String),
    Unknown(String),
}

/// Parsed training callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingWebhook {
    pub request_id: String,
    pub status: WebhookStatus,
}

impl TrainingWebhook {
    /// Parse a callback body; fails only when no request identifier is present
    pub fn parse(body: &Value) -> Result<Self> {
        let request_id = ["request_id", "finetune_id"]
            .iter()
            .filter_map(|field| body.get(*field).and_then(Value::as_str))
            .map(str::trim)
            .find(|id| !id.is_empty())
            .ok_or_else(|| AishaError::InvalidInput("missing request_id or finetune_id".to_string()))?
            .to_string();

        let raw_status = body
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_ascii_uppercase();

        let status = match raw_status.as_str() {
            "OK" | "COMPLETED" | "SUCCESS" | "SUCCEEDED" => WebhookStatus::Finished(TrainingOutcome::Completed {
                diffusers_lora_file_url: file_url(body, "diffusers_lora_file"),
                config_file_url: file_url(body, "config_file"),
            }),
            "ERROR" | "FAILED" | "FAILURE" => WebhookStatus::Finished(TrainingOutcome::Failed {
                error_message: error_message(body),
            }),
            "IN_QUEUE" | "IN_PROGRESS" | "QUEUED" | "PENDING" | "RUNNING" => WebhookStatus::InProgress(raw_status),
            _ => WebhookStatus::Unknown(raw_status),
        };

        Ok(Self { request_id, status })
    }
}

fn file_url(body: &Value, file: &str) -> Option<String> {
    ["payload", "result"]
        .iter()
        .filter_map(|section| body.get(*section))
        .filter_map(|section| section.get(file))
        .filter_map(|f| f.get("url").and_then(Value::as_str))
        .map(str::to_string)
        .next()
}

fn error_message(body: &Value) -> String {
    match body.get("error") {
        Some(Value::String(message)) if !message.is_empty() => message.clone(),
        Some(Value::Null) | None => body
            .pointer("/payload/detail/0/msg")
            .and_then(Value::as_str)
            .unwrap_or("training failed")
            .to_string(),
        Some(other) => other.to_string(),
    }
}
