//! Message gateway abstraction.
//!
//! The actual WhatsApp session (protocol handling, QR pairing, media
//! decryption) lives outside this workspace. The core only needs a seam to
//! send outbound messages and fetch profile pictures; one gateway instance
//! corresponds to one connected tenant session.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::error::AppError;

/// Fallback avatar when a contact's profile picture cannot be fetched.
pub const DEFAULT_AVATAR_URL: &str = "https://i.imgur.com/z28n3Nz.png";

/// Outbound messaging surface of one connected tenant session.
///
/// Phones are pre-normalized by the caller (`phone::normalize_phone`).
/// Implementations map failures to [`AppError::Gateway`]; callers treat any
/// error as recoverable for that one message.
#[async_trait]
pub trait MessageGateway: Send + Sync + Debug {
    async fn send_text(&self, phone: &str, text: &str) -> Result<(), AppError>;

    async fn send_image(&self, phone: &str, media_url: &str, caption: &str)
        -> Result<(), AppError>;

    async fn send_audio(&self, phone: &str, media_url: &str) -> Result<(), AppError>;

    async fn send_video(&self, phone: &str, media_url: &str, caption: &str)
        -> Result<(), AppError>;

    async fn send_file(
        &self,
        phone: &str,
        media_url: &str,
        filename: &str,
        caption: &str,
    ) -> Result<(), AppError>;

    /// Profile picture URL of a contact, or `None` when unavailable.
    /// Callers substitute [`DEFAULT_AVATAR_URL`] themselves.
    async fn profile_pic_url(&self, phone: &str) -> Option<String>;
}
