use crate::api::AppState;
use crate::api::forms::{FormData, parse_id};
use crate::api::middleware::AuthUser;
use crate::api::schemas::messaging::{EditMessage, MessageDeleted, UploadedImages};
use crate::domain::conversation::ChatOrdering;
use crate::domain::message::MISSING_CONTENT;
use crate::error::{AppError, Result};
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};

const IMAGE_FIELDS: &[&str] = &["image", "images"];

/// Sends a message from the authenticated user, optionally with images.
///
/// The message reaches an online receiver immediately; otherwise it waits in history.
///
/// # Errors
/// Returns `AppError::BadRequest` if the receiver is missing or there is neither text nor an image.
/// Returns `AppError::NotFound` if the receiver does not exist. Nothing is written to the upload
/// directory in either case.
pub async fn send_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let form = FormData::read(multipart, IMAGE_FIELDS).await?;

    let Some(raw_receiver) = form.text("receiverId") else {
        return Err(AppError::BadRequest(MISSING_CONTENT.to_string()));
    };
    let text = form.text("text");
    if text.is_none() && form.files.is_empty() {
        return Err(AppError::BadRequest(MISSING_CONTENT.to_string()));
    }
    let receiver_id = parse_id(&raw_receiver, "receiver")?;

    let message =
        state.message_service.send_with_uploads(auth_user.user_id, receiver_id, text, form.files).await?;
    state.gateway_service.deliver_new(&message).await;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Stores images for a later socket `sendMessage`, which references them by the returned names.
pub async fn upload_images(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let form = FormData::read(multipart, IMAGE_FIELDS).await?;
    let images = state.message_service.upload_images(form.files).await?;
    Ok((StatusCode::CREATED, Json(UploadedImages { images })))
}

/// The caller's conversations, most recent first.
pub async fn chat_users(auth_user: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let rows = state.chat_service.chat_users(auth_user.user_id, ChatOrdering::Recency).await?;
    Ok(Json(rows))
}

pub async fn get_messages(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(other): Path<String>,
) -> Result<impl IntoResponse> {
    let other_id = parse_id(&other, "user")?;
    let messages = state.message_service.conversation(auth_user.user_id, other_id).await?;
    Ok(Json(messages))
}

/// # Errors
/// Returns `AppError::NotFound` for an unknown message and `AppError::Forbidden` if the caller did not send it.
pub async fn edit_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Json(payload): Json<EditMessage>,
) -> Result<impl IntoResponse> {
    let message_id = parse_id(&message_id, "message")?;
    let message = state.message_service.edit(auth_user.user_id, message_id, payload.text).await?;
    state.gateway_service.deliver_updated(&message).await;
    Ok(Json(message))
}

/// # Errors
/// Returns `AppError::NotFound` for an unknown message and `AppError::Forbidden` if the caller did not send it.
pub async fn delete_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> Result<impl IntoResponse> {
    let message_id = parse_id(&message_id, "message")?;
    let removed = state.message_service.delete(auth_user.user_id, message_id).await?;
    state.gateway_service.deliver_deleted(&removed).await;
    Ok(Json(MessageDeleted { message_id: removed.id }))
}
