use crate::domain::message::Message;
use crate::domain::user::User;
use serde::Serialize;
use std::collections::HashMap;
use time::OffsetDateTime;
use uuid::Uuid;

/// How a chat list is ordered once it has been folded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatOrdering {
    /// Most recent conversation first.
    Recency,
    /// Online counterparts first, each group by recency.
    OnlineFirst,
}

/// One row of a user's chat list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub user_id: Uuid,
    pub full_name: Option<String>,
    pub email: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_seen: Option<OffsetDateTime>,
    pub last_message: Message,
    pub preview: String,
    #[serde(with = "time::serde::rfc3339")]
    pub last_time: OffsetDateTime,
    pub online: bool,
}

/// Keeps the most recent message exchanged with each counterpart of `user_id`,
/// newest conversation first. Messages not involving `user_id` are ignored.
#[must_use]
pub fn latest_per_counterpart(user_id: Uuid, messages: Vec<Message>) -> Vec<Message> {
    let mut latest: HashMap<Uuid, Message> = HashMap::new();

    for message in messages.into_iter().filter(|m| m.involves(user_id)) {
        let counterpart = message.counterpart(user_id);
        match latest.get(&counterpart) {
            Some(current) if (current.created_at, current.id) >= (message.created_at, message.id) => {}
            _ => {
                latest.insert(counterpart, message);
            }
        }
    }

    let mut folded: Vec<Message> = latest.into_values().collect();
    folded.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
    folded
}

/// Turns folded conversations into chat list rows. `profiles` may miss
/// counterparts; those rows keep empty profile fields.
#[must_use]
pub fn build_summaries(
    user_id: Uuid,
    latest: Vec<Message>,
    profiles: &HashMap<Uuid, User>,
    is_online: impl Fn(Uuid) -> bool,
    ordering: ChatOrdering,
) -> Vec<ConversationSummary> {
    let mut rows: Vec<ConversationSummary> = latest
        .into_iter()
        .map(|message| {
            let counterpart = message.counterpart(user_id);
            let profile = profiles.get(&counterpart);
            ConversationSummary {
                user_id: counterpart,
                full_name: profile.map(|p| p.full_name.clone()),
                email: profile.map(|p| p.email.clone()),
                last_seen: profile.map(|p| p.updated_at),
                preview: message.preview(),
                last_time: message.created_at,
                online: is_online(counterpart),
                last_message: message,
            }
        })
        .collect();

    if ordering == ChatOrdering::OnlineFirst {
        // Stable: recency order survives inside each group.
        rows.sort_by_key(|row| !row.online);
    }

    rows
}
