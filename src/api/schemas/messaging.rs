use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct EditMessage {
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDeleted {
    pub message_id: Uuid,
}

/// Stored names to pass as `images` in a socket `sendMessage`.
#[derive(Debug, Serialize)]
pub struct UploadedImages {
    pub images: Vec<String>,
}
