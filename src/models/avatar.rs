//! Avatar and avatar photo models
//!
//! An avatar walks a fixed status sequence:
//! `draft -> photos_uploading -> ready_for_training -> training -> {completed | error | cancelled}`.
//! Cancellation is possible from every non-terminal status.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AvatarStatus {
    Draft,
    PhotosUploading,
    ReadyForTraining,
    Training,
    Completed,
    Error,
    Cancelled,
}

impl AvatarStatus {
    pub const ALL: [AvatarStatus; 7] = [
        AvatarStatus::Draft,
        AvatarStatus::PhotosUploading,
        AvatarStatus::ReadyForTraining,
        AvatarStatus::Training,
        AvatarStatus::Completed,
        AvatarStatus::Error,
        AvatarStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AvatarStatus::Draft => "draft",
            AvatarStatus::PhotosUploading => "photos_uploading",
            AvatarStatus::ReadyForTraining => "ready_for_training",
            AvatarStatus::Training => "training",
            AvatarStatus::Completed => "completed",
            AvatarStatus::Error => "error",
            AvatarStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AvatarStatus::Completed | AvatarStatus::Error | AvatarStatus::Cancelled)
    }

    /// Photos may only be added before the set is confirmed
    pub fn accepts_photos(&self) -> bool {
        matches!(self, AvatarStatus::Draft | AvatarStatus::PhotosUploading)
    }

    /// Position in the lifecycle; transitions never decrease it
    pub fn rank(&self) -> u8 {
        match self {
            AvatarStatus::Draft => 0,
            AvatarStatus::PhotosUploading => 1,
            AvatarStatus::ReadyForTraining => 2,
            AvatarStatus::Training => 3,
            AvatarStatus::Completed | AvatarStatus::Error | AvatarStatus::Cancelled => 4,
        }
    }

    pub fn can_transition_to(&self, next: AvatarStatus) -> bool {
        use AvatarStatus::*;

        match (self, next) {
            (Draft, PhotosUploading) => true,
            (PhotosUploading, PhotosUploading) => true,
            (PhotosUploading, ReadyForTraining) => true,
            (ReadyForTraining, Training) => true,
            (Training, Completed) | (Training, Error) => true,
            (current, Cancelled) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for AvatarStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AvatarStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AvatarStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown avatar status: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AvatarGender {
    Male,
    Female,
}

impl AvatarGender {
    pub fn as_str(&self) -> &'static str {
        match self {
            AvatarGender::Male => "male",
            AvatarGender::Female => "female",
        }
    }
}

impl FromStr for AvatarGender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(AvatarGender::Male),
            "female" => Ok(AvatarGender::Female),
            other => Err(format!("unknown gender: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Avatar {
    pub id: Uuid,
    pub user_id: i64,
    pub name: String,
    pub gender: AvatarGender,
    pub status: AvatarStatus,
    pub trigger_word: String,
    pub training_steps: i32,
    pub photos_count: i32,
    pub fal_request_id: Option<String>,
    pub diffusers_lora_file_url: Option<String>,
    pub config_file_url: Option<String>,
    pub error_message: Option<String>,
    pub training_started_at: Option<DateTime<Utc>>,
    pub training_completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateAvatarRequest {
    pub user_id: i64,
    pub name: String,
    pub gender: AvatarGender,
    pub trigger_word: String,
    pub training_steps: i32,
}

/// Terminal outcome reported by the training API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainingOutcome {
    Completed {
        diffusers_lora_file_url: Option<String>,
        config_file_url: Option<String>,
    },
    Failed {
        error_message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PhotoValidationStatus {
    Pending,
    Valid,
    Invalid,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AvatarPhoto {
    pub id: Uuid,
    pub avatar_id: Uuid,
    pub user_id: i64,
    pub storage_key: String,
    pub upload_order: i32,
    pub validation_status: PhotoValidationStatus,
    pub telegram_file_unique_id: String,
    pub file_size: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateAvatarPhotoRequest {
    pub id: Uuid,
    pub avatar_id: Uuid,
    pub user_id: i64,
    pub storage_key: String,
    pub upload_order: i32,
    pub validation_status: PhotoValidationStatus,
    pub telegram_file_unique_id: String,
    pub file_size: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub content_type: String,
}
