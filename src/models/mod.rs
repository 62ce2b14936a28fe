//! Data models module
//!
//! This module contains all data structures used throughout the application

pub mod user;
pub mod balance;
pub mod avatar;
pub mod transcript;
pub mod state;

// Re-export commonly used models
pub use user::{User, CreateUserRequest, UpdateUserRequest};
pub use balance::{Balance, Transaction, TransactionType, CreateTransactionRequest, LedgerAudit};
pub use avatar::{
    Avatar, AvatarGender, AvatarPhoto, AvatarStatus, CreateAvatarPhotoRequest, CreateAvatarRequest,
    PhotoValidationStatus, TrainingOutcome,
};
pub use transcript::{Transcript, CreateTranscriptRequest};
pub use state::UserState;
