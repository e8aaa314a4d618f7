use crate::api::AppState;
use crate::api::forms::{FormData, parse_id};
use crate::api::middleware::AdminUser;
use crate::error::Result;
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};

const ICON_FIELDS: &[&str] = &["icon"];

/// # Errors
/// Returns `AppError::Forbidden` for non-admins and `AppError::Conflict` for a taken name.
pub async fn add_category(
    _admin: AdminUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut form = FormData::read(multipart, ICON_FIELDS).await?;
    let icon = form.files.pop();
    let category = state.category_service.create(form.text("name"), icon).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn all_categories(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(state.category_service.list().await?))
}

pub async fn get_category(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse> {
    let id = parse_id(&id, "category")?;
    Ok(Json(state.category_service.get(id).await?))
}

/// Renames a category or replaces its icon. Fields left out stay as they are.
pub async fn update_category(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let id = parse_id(&id, "category")?;
    let mut form = FormData::read(multipart, ICON_FIELDS).await?;
    let icon = form.files.pop();
    let name = form.all("name").pop();
    let category = state.category_service.update(id, name, icon).await?;
    Ok(Json(category))
}

/// # Errors
/// Returns `AppError::Conflict` while books are still filed under the category.
pub async fn delete_category(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = parse_id(&id, "category")?;
    Ok(Json(state.category_service.delete(id).await?))
}
