use crate::api::AppState;
use crate::api::forms::parse_id;
use crate::api::middleware::AuthUser;
use crate::api::schemas::auth::Ack;
use crate::api::schemas::books::{
    AlreadyRequested, PageQuery, PagedRequests, RequestBook, SearchQuery, SentRequests, SetRequestStatus,
};
use crate::error::Result;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

/// # Errors
/// Returns `AppError::BadRequest` for the caller's own book and `AppError::Conflict` for a repeat request.
pub async fn add_request(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<RequestBook>,
) -> Result<impl IntoResponse> {
    let book_id = parse_id(&payload.book_id, "book")?;
    let request = state.book_request_service.create(auth_user.user_id, book_id).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn check_request(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> Result<impl IntoResponse> {
    let book_id = parse_id(&book_id, "book")?;
    let already_requested = state.book_request_service.check(auth_user.user_id, book_id).await?;
    Ok(Json(AlreadyRequested { already_requested }))
}

pub async fn list_requests(auth_user: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(state.book_request_service.list(auth_user.user_id).await?))
}

pub async fn search_requests(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.book_request_service.search(auth_user.user_id, &query.query).await?))
}

/// Requests received for the caller's books, one page at a time.
pub async fn paginated_requests(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse> {
    let page = query.page()?;
    let (requests, total) = state.book_request_service.received(auth_user.user_id, page).await?;
    Ok(Json(PagedRequests {
        requests,
        current_page: page.number,
        total_pages: page.total_pages(total),
        total_items: total,
    }))
}

pub async fn sent_requests(auth_user: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let requests = state.book_request_service.sent(auth_user.user_id).await?;
    Ok(Json(SentRequests { requests }))
}

/// # Errors
/// Returns `AppError::Forbidden` unless the caller owns the requested book, and
/// `AppError::BadRequest` once the request has been decided.
pub async fn set_request_status(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    Json(payload): Json<SetRequestStatus>,
) -> Result<impl IntoResponse> {
    let request_id = parse_id(&request_id, "request")?;
    let request = state.book_request_service.set_status(auth_user.user_id, request_id, &payload.status).await?;
    Ok(Json(request))
}

pub async fn cancel_request(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> Result<impl IntoResponse> {
    let book_id = parse_id(&book_id, "book")?;
    state.book_request_service.cancel(auth_user.user_id, book_id).await?;
    Ok(Json(Ack::new("Book request cancelled successfully.")))
}
