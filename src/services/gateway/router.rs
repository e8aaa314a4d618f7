use crate::domain::conversation::ChatOrdering;
use crate::domain::events::{
    ClientEvent, ConversationRef, DeleteMessagePayload, SendMessagePayload, ServerEvent, UpdateMessagePayload,
};
use crate::domain::message::{Message, NewMessage};
use crate::error::{AppError, Result};
use crate::services::chat_service::ChatService;
use crate::services::gateway::hub::{ConnectionHub, ConnectionId};
use crate::services::message_service::MessageService;
use crate::services::presence::PresenceRegistry;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    events_received_total: Counter<u64>,
    event_errors_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("bookswap-server");
        Self {
            events_received_total: meter
                .u64_counter("websocket_events_received_total")
                .with_description("Total client events dispatched by the gateway")
                .build(),
            event_errors_total: meter
                .u64_counter("websocket_event_errors_total")
                .with_description("Total client events answered with an error event")
                .build(),
        }
    }
}

/// The connection an inbound event arrived on and the user it authenticated as.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionContext {
    pub connection_id: ConnectionId,
    pub user_id: Uuid,
}

/// Turns client events and REST mutations into pushes to the connections that care.
#[derive(Clone, Debug)]
pub struct EventRouter {
    hub: Arc<ConnectionHub>,
    presence: Arc<PresenceRegistry>,
    message_service: MessageService,
    chat_service: ChatService,
    metrics: Metrics,
}

impl EventRouter {
    #[must_use]
    pub fn new(
        hub: Arc<ConnectionHub>,
        presence: Arc<PresenceRegistry>,
        message_service: MessageService,
        chat_service: ChatService,
    ) -> Self {
        Self { hub, presence, message_service, chat_service, metrics: Metrics::new() }
    }

    /// Handles one inbound event to completion. Failures become an `error` event on the origin connection.
    #[tracing::instrument(
        name = "gateway_event",
        skip(self, ctx, event),
        fields(event = event.name(), user_id = %ctx.user_id, connection_id = %ctx.connection_id)
    )]
    pub async fn dispatch(&self, ctx: &ConnectionContext, event: ClientEvent) {
        let name = event.name();
        self.metrics.events_received_total.add(1, &[KeyValue::new("event", name)]);

        let result = match event {
            ClientEvent::AddUser(user_id) => self.add_user(ctx, user_id),
            ClientEvent::GetChatUsers(user_id) => self.get_chat_users(ctx, user_id).await,
            ClientEvent::GetMessages(conversation) => self.get_messages(ctx, conversation).await,
            ClientEvent::SendMessage(payload) => self.send_message(ctx, payload).await,
            ClientEvent::UpdateMessage(payload) => self.update_message(ctx, payload).await,
            ClientEvent::DeleteMessage(payload) => self.delete_message(ctx, payload).await,
        };

        if let Err(e) = result {
            e.log();
            self.metrics.event_errors_total.add(1, &[KeyValue::new("event", name)]);
            self.hub.send_to(ctx.connection_id, ServerEvent::error(e.client_message()));
        }
    }

    /// Drops a closed connection; tells everyone if that took a user offline.
    pub fn disconnect(&self, connection_id: ConnectionId) {
        self.hub.unregister(connection_id);
        if let Some(user_id) = self.presence.remove(connection_id) {
            tracing::info!(%user_id, "User went offline");
            self.broadcast_presence();
        }
    }

    pub fn broadcast_presence(&self) {
        self.hub.broadcast(&ServerEvent::GetOnlineUsers(self.presence.list()));
    }

    /// Fans out a freshly stored message. `origin` is the sending connection, if it came over the gateway.
    pub async fn deliver_new(&self, message: &Message, origin: Option<ConnectionId>) {
        let receiver_conn = self.presence.connection_of(message.receiver_id);
        let sender_conn = origin.or_else(|| self.presence.connection_of(message.sender_id));

        let mut targets: Vec<ConnectionId> = receiver_conn.into_iter().collect();
        if let Some(conn) = sender_conn
            && !targets.contains(&conn)
        {
            targets.push(conn);
        }
        for conn in targets {
            self.hub.send_to(conn, ServerEvent::ReceiveMessage(message.clone()));
        }

        let update = ServerEvent::LastMessageUpdate {
            sender: message.sender_id,
            receiver: message.receiver_id,
            message: message.clone(),
        };
        self.push_to_participants(message, origin, &update);
        self.refresh_chat_lists(message).await;
    }

    pub async fn deliver_updated(&self, message: &Message, origin: Option<ConnectionId>) {
        self.push_to_participants(message, origin, &ServerEvent::MessageUpdated(message.clone()));
        self.refresh_chat_lists(message).await;
    }

    pub async fn deliver_deleted(&self, message: &Message, origin: Option<ConnectionId>) {
        self.push_to_participants(message, origin, &ServerEvent::MessageDeleted { message_id: message.id });
        self.refresh_chat_lists(message).await;
    }

    fn add_user(&self, ctx: &ConnectionContext, user_id: Uuid) -> Result<()> {
        authorize(ctx, user_id)?;
        self.presence.add_user(user_id, ctx.connection_id);
        tracing::info!("User came online");
        self.broadcast_presence();
        Ok(())
    }

    async fn get_chat_users(&self, ctx: &ConnectionContext, user_id: Uuid) -> Result<()> {
        authorize(ctx, user_id)?;
        let rows = self.chat_service.chat_users(user_id, ChatOrdering::OnlineFirst).await?;
        self.hub.send_to(ctx.connection_id, ServerEvent::ChatUsersList(rows));
        Ok(())
    }

    async fn get_messages(&self, ctx: &ConnectionContext, conversation: ConversationRef) -> Result<()> {
        authorize(ctx, conversation.current_user_id)?;
        let messages =
            self.message_service.conversation(conversation.current_user_id, conversation.selected_user_id).await?;
        self.hub.send_to(ctx.connection_id, ServerEvent::MessagesList(messages));
        Ok(())
    }

    async fn send_message(&self, ctx: &ConnectionContext, payload: SendMessagePayload) -> Result<()> {
        let draft = NewMessage::new(payload.sender_id, payload.receiver_id, payload.text, payload.images)?;
        authorize(ctx, draft.sender_id)?;

        let message = self.message_service.send(draft).await?;
        self.deliver_new(&message, Some(ctx.connection_id)).await;
        Ok(())
    }

    async fn update_message(&self, ctx: &ConnectionContext, payload: UpdateMessagePayload) -> Result<()> {
        if let Some(user_id) = payload.current_user_id {
            authorize(ctx, user_id)?;
        }
        let message = self.message_service.edit(ctx.user_id, payload.message_id, payload.new_text).await?;
        self.deliver_updated(&message, Some(ctx.connection_id)).await;
        Ok(())
    }

    async fn delete_message(&self, ctx: &ConnectionContext, payload: DeleteMessagePayload) -> Result<()> {
        if let Some(user_id) = payload.current_user_id {
            authorize(ctx, user_id)?;
        }
        let message = self.message_service.delete(ctx.user_id, payload.message_id).await?;
        self.deliver_deleted(&message, Some(ctx.connection_id)).await;
        Ok(())
    }

    /// Both participants' connections plus the origin, each at most once.
    fn push_to_participants(&self, message: &Message, origin: Option<ConnectionId>, event: &ServerEvent) {
        let mut targets: Vec<ConnectionId> = Vec::with_capacity(3);
        let candidates = message.participants().into_iter().map(|id| self.presence.connection_of(id)).chain([origin]);
        for conn in candidates.flatten() {
            if !targets.contains(&conn) {
                targets.push(conn);
            }
        }
        for conn in targets {
            self.hub.send_to(conn, event.clone());
        }
    }

    async fn refresh_chat_lists(&self, message: &Message) {
        let [sender, receiver] = message.participants();
        let participants = if sender == receiver { vec![sender] } else { vec![sender, receiver] };

        for user_id in participants {
            let Some(conn) = self.presence.connection_of(user_id) else {
                continue;
            };
            match self.chat_service.chat_users(user_id, ChatOrdering::OnlineFirst).await {
                Ok(rows) => {
                    self.hub.send_to(conn, ServerEvent::ChatUsersList(rows));
                }
                Err(e) => tracing::warn!(error = %e, %user_id, "Failed to refresh chat list"),
            }
        }
    }
}

fn authorize(ctx: &ConnectionContext, claimed: Uuid) -> Result<()> {
    if claimed == ctx.user_id {
        Ok(())
    } else {
        Err(AppError::Forbidden("User id does not match the authenticated user".to_string()))
    }
}
