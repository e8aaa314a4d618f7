use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Public path prefix under which uploaded images are served.
pub const UPLOADS_PREFIX: &str = "uploads";

/// Rejection text for a send without a sender, a receiver, or any content.
pub const MISSING_CONTENT: &str = "Sender, Receiver and either Text or Image is required";

/// Chat list placeholder for messages that only carry images.
pub const IMAGE_PREVIEW: &str = "📷 Image";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub text: Option<String>,
    pub images: Vec<String>,
    pub is_edited: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub edited_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Message {
    #[must_use]
    pub fn is_sent_by(&self, user_id: Uuid) -> bool {
        self.sender_id == user_id
    }

    #[must_use]
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }

    /// The other participant from `user_id`'s point of view.
    #[must_use]
    pub fn counterpart(&self, user_id: Uuid) -> Uuid {
        if self.sender_id == user_id { self.receiver_id } else { self.sender_id }
    }

    #[must_use]
    pub const fn participants(&self) -> [Uuid; 2] {
        [self.sender_id, self.receiver_id]
    }

    #[must_use]
    pub fn preview(&self) -> String {
        match &self.text {
            Some(text) if !text.trim().is_empty() => text.clone(),
            _ => IMAGE_PREVIEW.to_string(),
        }
    }
}

/// A validated message that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub text: Option<String>,
    pub images: Vec<String>,
}

impl NewMessage {
    /// Builds a message from loosely shaped client input.
    ///
    /// Blank text counts as absent.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` when a party is missing or there is neither text nor an image.
    pub fn new(
        sender_id: Option<Uuid>,
        receiver_id: Option<Uuid>,
        text: Option<String>,
        images: Vec<String>,
    ) -> Result<Self> {
        let text = text.filter(|t| !t.trim().is_empty());

        match (sender_id, receiver_id) {
            (Some(sender_id), Some(receiver_id)) if text.is_some() || !images.is_empty() => {
                Ok(Self { sender_id, receiver_id, text, images })
            }
            _ => Err(AppError::BadRequest(MISSING_CONTENT.to_string())),
        }
    }
}

/// Maps a stored upload file name to the path recorded on a message.
///
/// # Errors
/// Returns `AppError::BadRequest` if the name is empty or could escape the upload directory.
pub fn upload_path(file_name: &str) -> Result<String> {
    let name = file_name.trim();
    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
        return Err(AppError::BadRequest(format!("Invalid image name: {file_name}")));
    }
    Ok(format!("{UPLOADS_PREFIX}/{name}"))
}

/// Validates the replacement text of an edit.
///
/// # Errors
/// Returns `AppError::BadRequest` when the text is missing or blank.
pub fn edited_text(text: Option<String>) -> Result<String> {
    text.filter(|t| !t.trim().is_empty()).ok_or_else(|| AppError::BadRequest("Message text is required".to_string()))
}

#[cfg(test)]
pub(crate) fn sample(sender_id: Uuid, receiver_id: Uuid, text: &str, created_at: OffsetDateTime) -> Message {
    Message {
        id: Uuid::now_v7(),
        sender_id,
        receiver_id,
        text: Some(text.to_string()),
        images: Vec::new(),
        is_edited: false,
        edited_at: None,
        created_at,
        updated_at: created_at,
    }
}
