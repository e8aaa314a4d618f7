//! Real-time gateway wire events.
//!
//! Every frame is a JSON text frame of the form `{"event": "<name>", "data": <payload>}`.

use crate::domain::conversation::ConversationSummary;
use crate::domain::message::Message;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    AddUser(Uuid),
    GetChatUsers(Uuid),
    GetMessages(ConversationRef),
    SendMessage(SendMessagePayload),
    UpdateMessage(UpdateMessagePayload),
    DeleteMessage(DeleteMessagePayload),
}

impl ClientEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AddUser(_) => "addUser",
            Self::GetChatUsers(_) => "getChatUsers",
            Self::GetMessages(_) => "getMessages",
            Self::SendMessage(_) => "sendMessage",
            Self::UpdateMessage(_) => "updateMessage",
            Self::DeleteMessage(_) => "deleteMessage",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRef {
    pub current_user_id: Uuid,
    pub selected_user_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub sender_id: Option<Uuid>,
    pub receiver_id: Option<Uuid>,
    pub text: Option<String>,
    /// Names returned by `POST /api/v1/msg/upload`.
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMessagePayload {
    pub message_id: Uuid,
    pub new_text: Option<String>,
    pub current_user_id: Option<Uuid>,
    pub selected_user_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMessagePayload {
    pub message_id: Uuid,
    pub current_user_id: Option<Uuid>,
    pub selected_user_id: Option<Uuid>,
}

/// Events the server pushes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    GetOnlineUsers(Vec<Uuid>),
    ChatUsersList(Vec<ConversationSummary>),
    MessagesList(Vec<Message>),
    ReceiveMessage(Message),
    MessageUpdated(Message),
    #[serde(rename_all = "camelCase")]
    MessageDeleted {
        message_id: Uuid,
    },
    LastMessageUpdate {
        sender: Uuid,
        receiver: Uuid,
        message: Message,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GetOnlineUsers(_) => "getOnlineUsers",
            Self::ChatUsersList(_) => "chatUsersList",
            Self::MessagesList(_) => "messagesList",
            Self::ReceiveMessage(_) => "receiveMessage",
            Self::MessageUpdated(_) => "messageUpdated",
            Self::MessageDeleted { .. } => "messageDeleted",
            Self::LastMessageUpdate { .. } => "lastMessageUpdate",
            Self::Error { .. } => "error",
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { message: message.into() }
    }
}
