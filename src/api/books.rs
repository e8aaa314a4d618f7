use crate::api::AppState;
use crate::api::forms::{FormData, parse_id};
use crate::api::middleware::AuthUser;
use crate::api::schemas::books::{BookDeleted, BookQuery, FilteredBooks};
use crate::domain::book::BookFields;
use crate::error::Result;
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

const IMAGE_FIELDS: &[&str] = &["images", "image"];

fn book_fields(form: &FormData) -> Result<BookFields> {
    Ok(BookFields {
        title: form.text("title"),
        author: form.text("author"),
        genre: form.all("genre"),
        condition: form.text("condition"),
        product_type: form.text("productType"),
        price: form.number("price")?,
        description: form.text("description"),
        pages: form.number("pages")?,
        category_id: form.text("categoryId"),
        location: form.text("location"),
    })
}

/// Lists a book for the caller from a multipart form with up to five `images`.
///
/// # Errors
/// Returns `AppError::BadRequest` for missing or malformed fields and `AppError::NotFound`
/// for an unknown category. No image is kept when the listing is rejected.
pub async fn add_book(
    auth_user: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let form = FormData::read(multipart, IMAGE_FIELDS).await?;
    let fields = book_fields(&form)?;
    let book = state.book_service.add(auth_user.user_id, fields, form.files).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// The catalogue. A signed-in caller does not see their own books.
pub async fn all_books(auth_user: Option<AuthUser>, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let books = state.book_service.all(auth_user.map(|u| u.user_id)).await?;
    Ok(Json(books))
}

pub async fn filter_books(State(state): State<AppState>, Query(query): Query<BookQuery>) -> Result<impl IntoResponse> {
    let (filter, page) = query.into_filter()?;
    let (books, total) = state.book_service.filter(&filter, page).await?;
    Ok(Json(FilteredBooks { total, books }))
}

/// # Errors
/// Returns `AppError::NotFound` for an unknown book and `AppError::Forbidden` if the caller did not list it.
pub async fn update_book(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(book_id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let book_id = parse_id(&book_id, "book")?;
    let form = FormData::read(multipart, IMAGE_FIELDS).await?;
    let fields = book_fields(&form)?;
    let book = state.book_service.update(auth_user.user_id, book_id, fields, form.files).await?;
    Ok(Json(book))
}

pub async fn my_books(auth_user: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let books = state.book_service.mine(auth_user.user_id).await?;
    Ok(Json(books))
}

pub async fn book_by_slug(State(state): State<AppState>, Path(slug): Path<String>) -> Result<impl IntoResponse> {
    let book = state.book_service.by_slug(&slug).await?;
    Ok(Json(book))
}

pub async fn related_books(State(state): State<AppState>, Path(book_id): Path<String>) -> Result<impl IntoResponse> {
    let book_id = parse_id(&book_id, "book")?;
    let books = state.book_service.related(book_id).await?;
    Ok(Json(books))
}

/// # Errors
/// Returns `AppError::NotFound` for an unknown book and `AppError::Forbidden` if the caller did not list it.
pub async fn delete_book(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> Result<impl IntoResponse> {
    let book_id = parse_id(&book_id, "book")?;
    let removed = state.book_service.delete(auth_user.user_id, book_id).await?;
    Ok(Json(BookDeleted { message: "Book deleted successfully", book_id: removed.id }))
}
