//! Paid audio transcription
//!
//! The flow charges first and refunds the same amount if any later step
//! fails, so a failed transcription costs the user nothing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, error, info};
use uuid::Uuid;
use crate::config::{OpenAiConfig, Settings, TranscriptionConfig};
use crate::database::DatabaseService;
use crate::models::transcript::{CreateTranscriptRequest, Transcript};
use crate::services::balance::LedgerService;
use crate::services::storage::{Bucket, ObjectStorage, StoragePaths};
use crate::utils::errors::{AishaError, Result};
use crate::utils::helpers::{started_minutes, truncate_text};
use crate::utils::logging::log_api_error;

const PREVIEW_CHARS: usize = 200;

/// Audio received from the user
#[derive(Debug, Clone)]
pub struct AudioInput {
    pub data: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
    pub duration_seconds: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechResult {
    pub text: String,
    pub language: Option<String>,
}

/// Speech recognition backend
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &AudioInput) -> Result<SpeechResult>;
}

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
}

/// OpenAI Whisper over HTTP
#[derive(Clone, Debug)]
pub struct WhisperClient {
    client: Client,
    config: OpenAiConfig,
}

impl WhisperClient {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("Aisha-Bot/1.0")
            .build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl SpeechToText for WhisperClient {
    async fn transcribe(&self, audio: &AudioInput) -> Result<SpeechResult> {
        let file = multipart::Part::bytes(audio.data.clone())
            .file_name(audio.file_name.clone())
            .mime_str(&audio.mime_type)?;
        let form = multipart::Form::new()
            .part("file", file)
            .text("model", self.config.whisper_model.clone())
            .text("response_format", "verbose_json");

        let url = format!("{}/audio/transcriptions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            log_api_error("whisper", &body, Some(status.as_str()));
            return Err(AishaError::Transcription(format!("Whisper API error ({}): {}", status, body)));
        }

        let whisper: WhisperResponse = response.json().await?;
        Ok(SpeechResult {
            text: whisper.text.trim().to_string(),
            language: whisper.language,
        })
    }
}

/// Price of a clip: started minutes times the per-minute rate
pub fn transcription_cost(duration_seconds: u32, cost_per_minute: Decimal) -> Decimal {
    Decimal::from(started_minutes(duration_seconds)) * cost_per_minute
}

/// File extension for a Telegram audio MIME type
pub fn audio_extension(mime_type: &str) -> &'static str {
    match mime_type {
        "audio/ogg" | "audio/opus" => "ogg",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/webm" => "webm",
        _ => "bin",
    }
}

/// A finished transcription
#[derive(Debug, Clone)]
pub struct TranscriptionResult {
    pub transcript: Transcript,
    pub text: String,
    pub balance: Decimal,
}

#[derive(Clone)]
pub struct TranscriptionService {
    db: DatabaseService,
    ledger: LedgerService,
    storage: Arc<dyn ObjectStorage>,
    speech: Arc<dyn SpeechToText>,
    config: TranscriptionConfig,
}

impl TranscriptionService {
    pub fn new(
        db: DatabaseService,
        ledger: LedgerService,
        storage: Arc<dyn ObjectStorage>,
        speech: Arc<dyn SpeechToText>,
        settings: &Settings,
    ) -> Self {
        Self {
            db,
            ledger,
            storage,
            speech,
            config: settings.transcription.clone(),
        }
    }

    pub fn cost_for(&self, duration_seconds: u32) -> Decimal {
        transcription_cost(duration_seconds, self.config.cost_per_minute)
    }

    /// Charge, transcribe and store; refunds the charge if anything after it fails
    pub async fn transcribe_paid(&self, user_id: i64, audio: AudioInput) -> Result<TranscriptionResult> {
        if audio.data.is_empty() {
            return Err(AishaError::InvalidInput("audio is empty".to_string()));
        }
        if audio.duration_seconds > self.config.max_duration_seconds {
            return Err(AishaError::InvalidInput(format!(
                "audio is longer than {} seconds",
                self.config.max_duration_seconds
            )));
        }

        let cost = self.cost_for(audio.duration_seconds);
        let minutes = started_minutes(audio.duration_seconds);
        let balance = self.ledger
            .charge(user_id, cost, &format!("Transcription: {} min", minutes))
            .await?;

        match self.process(user_id, &audio, cost).await {
            Ok((transcript, text)) => {
                info!(user_id = user_id, transcript_id = %transcript.id, cost = %cost, "Transcription completed");
                Ok(TranscriptionResult { transcript, text, balance })
            }
            Err(e) => {
                error!(user_id = user_id, error = %e, "Transcription failed, refunding");
                if let Err(refund_error) = self.ledger.refund(user_id, cost, "transcription failed").await {
                    error!(user_id = user_id, cost = %cost, error = %refund_error, "Refund failed");
                }
                Err(e)
            }
        }
    }

    async fn process(&self, user_id: i64, audio: &AudioInput, cost: Decimal) -> Result<(Transcript, String)> {
        let transcript_id = Uuid::new_v4();
        let audio_key = StoragePaths::transcript_audio(user_id, transcript_id, audio_extension(&audio.mime_type));
        self.storage
            .upload(Bucket::Transcripts, &audio_key, audio.data.clone(), &audio.mime_type)
            .await?;

        let speech = self.speech.transcribe(audio).await?;
        if speech.text.is_empty() {
            return Err(AishaError::Transcription("no speech recognized".to_string()));
        }
        debug!(user_id = user_id, chars = speech.text.len(), "Speech recognized");

        let transcript_key = StoragePaths::transcript_text(user_id, transcript_id);
        self.storage
            .upload(Bucket::Transcripts, &transcript_key, speech.text.clone().into_bytes(), "text/plain; charset=utf-8")
            .await?;

        let transcript = self.db.transcripts.create(CreateTranscriptRequest {
            id: transcript_id,
            user_id,
            audio_key,
            transcript_key,
            duration_seconds: i32::try_from(audio.duration_seconds).unwrap_or(i32::MAX),
            cost,
            language: speech.language,
            preview: truncate_text(&speech.text, PREVIEW_CHARS),
        }).await?;

        Ok((transcript, speech.text))
    }

    /// Newest first
    pub async fn list_transcripts(&self, user_id: i64, limit: i64) -> Result<Vec<Transcript>> {
        self.db.transcripts.list_for_user(user_id, limit.clamp(1, 50)).await
    }

    /// Full text of a stored transcript
    pub async fn get_transcript_text(&self, transcript_id: Uuid) -> Result<String> {
        let transcript = self.db.transcripts.find_by_id(transcript_id).await?
            .ok_or(AishaError::TranscriptNotFound { transcript_id })?;

        let bytes = self.storage.download(Bucket::Transcripts, &transcript.transcript_key).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn audio() -> AudioInput {
        AudioInput {
            data: vec![0x4f, 0x67, 0x67, 0x53],
            file_name: "voice.ogg".to_string(),
            mime_type: "audio/ogg".to_string(),
            duration_seconds: 42,
        }
    }

    fn whisper_config(server: &MockServer) -> OpenAiConfig {
        OpenAiConfig {
            api_key: "sk-test".to_string(),
            base_url: format!("{}/v1", server.uri()),
            whisper_model: "whisper-1".to_string(),
            timeout_seconds: 5,
        }
    }

    #[test]
    fn test_cost_uses_started_minutes() {
        let rate = Decimal::from(5);
        assert_eq!(transcription_cost(180, rate), Decimal::from(15));
        assert_eq!(transcription_cost(181, rate), Decimal::from(20));
        assert_eq!(transcription_cost(0, rate), Decimal::from(5));
    }

    #[test]
    fn test_audio_extension() {
        assert_eq!(audio_extension("audio/ogg"), "ogg");
        assert_eq!(audio_extension("audio/mpeg"), "mp3");
        assert_eq!(audio_extension("application/octet-stream"), "bin");
    }

    #[tokio::test]
    async fn test_whisper_transcribe() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/transcriptions"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "  Привет, мир ",
                "language": "russian",
                "duration": 42.0
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = WhisperClient::new(whisper_config(&server)).unwrap();
        let result = client.transcribe(&audio()).await.unwrap();
        assert_eq!(result.text, "Привет, мир");
        assert_eq!(result.language.as_deref(), Some("russian"));
    }

    #[tokio::test]
    async fn test_whisper_error_is_transcription_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("unsupported format"))
            .mount(&server)
            .await;

        let client = WhisperClient::new(whisper_config(&server)).unwrap();
        let err = client.transcribe(&audio()).await.unwrap_err();
        assert_matches!(err, AishaError::Transcription(msg) if msg.contains("unsupported format"));
    }
}
