//! Database repositories module
//!
//! This module contains all repository implementations for data access

pub mod user;
pub mod balance;
pub mod transaction;
pub mod avatar;
pub mod avatar_photo;
pub mod transcript;
pub mod user_state;

// Re-export repositories
pub use user::UserRepository;
pub use balance::BalanceRepository;
pub use transaction::TransactionRepository;
pub use avatar::AvatarRepository;
pub use avatar_photo::AvatarPhotoRepository;
pub use transcript::TranscriptRepository;
pub use user_state::UserStateRepository;
