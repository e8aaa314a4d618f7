use crate::api::rate_limit::log_rate_limit_events;
use crate::config::Config;
use crate::services::account_service::AccountService;
use crate::domain::book::MAX_BOOK_IMAGES;
use crate::services::auth_service::AuthService;
use crate::services::book_request_service::BookRequestService;
use crate::services::book_service::BookService;
use crate::services::category_service::CategoryService;
use crate::services::chat_service::ChatService;
use crate::services::gateway::GatewayService;
use crate::services::health_service::HealthService;
use crate::services::message_service::MessageService;
use crate::services::rate_limit_service::RateLimitService;
use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::Request;
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post, put},
};
use std::sync::Arc;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod book_requests;
pub mod books;
pub mod categories;
mod forms;
pub mod gateway;
pub mod health;
pub mod messages;
pub mod middleware;
pub mod rate_limit;
pub mod schemas;

/// Room for multipart framing and the text fields around the image parts.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Config,
    pub account_service: AccountService,
    pub auth_service: AuthService,
    pub message_service: MessageService,
    pub category_service: CategoryService,
    pub book_service: BookService,
    pub book_request_service: BookRequestService,
    pub chat_service: ChatService,
    pub gateway_service: GatewayService,
    pub rate_limit_service: RateLimitService,
    pub shutdown_rx: tokio::sync::watch::Receiver<bool>,
}

#[derive(Clone, Debug)]
pub struct MgmtState {
    pub health_service: HealthService,
}

#[derive(Debug)]
pub struct ServiceContainer {
    pub account_service: AccountService,
    pub auth_service: AuthService,
    pub message_service: MessageService,
    pub category_service: CategoryService,
    pub book_service: BookService,
    pub book_request_service: BookRequestService,
    pub chat_service: ChatService,
    pub gateway_service: GatewayService,
    pub rate_limit_service: RateLimitService,
}

/// Configures and returns the primary application router.
///
/// # Panics
/// Panics if the rate limiter configuration cannot be constructed.
pub fn app_router(
    config: Config,
    services: ServiceContainer,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> Router {
    let std_interval_ns = 1_000_000_000 / config.rate_limit.per_second.max(1);
    let standard_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_nanosecond(u64::from(std_interval_ns))
            .burst_size(config.rate_limit.burst)
            .key_extractor(services.rate_limit_service.extractor.clone())
            .finish()
            .expect("Failed to build standard rate limiter config"),
    );

    // Credential endpoints get the stricter tier
    let auth_interval_ns = 1_000_000_000 / config.rate_limit.auth_per_second.max(1);
    let auth_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_nanosecond(u64::from(auth_interval_ns))
            .burst_size(config.rate_limit.auth_burst)
            .key_extractor(services.rate_limit_service.extractor.clone())
            .finish()
            .expect("Failed to build auth rate limiter config"),
    );

    let max_parts = config.uploads.max_images.max(MAX_BOOK_IMAGES);
    let body_limit = max_parts * config.uploads.max_image_bytes + MULTIPART_OVERHEAD_BYTES;
    let uploads = ServeDir::new(&config.uploads.dir);

    let state = AppState {
        config,
        account_service: services.account_service,
        auth_service: services.auth_service,
        message_service: services.message_service,
        category_service: services.category_service,
        book_service: services.book_service,
        book_request_service: services.book_request_service,
        chat_service: services.chat_service,
        gateway_service: services.gateway_service,
        rate_limit_service: services.rate_limit_service,
        shutdown_rx,
    };

    let credential_routes = Router::new()
        .route("/user/signup", post(auth::signup))
        .route("/user/verify-otp", post(auth::verify_otp))
        .route("/user/signin", post(auth::signin))
        .route("/user/resend-otp", post(auth::resend_otp))
        .route("/user/forgot-password", post(auth::forgot_password))
        .route("/user/reset-password", post(auth::reset_password))
        .layer(GovernorLayer::new(auth_conf));

    let api_routes = Router::new()
        .route("/user/signout", post(auth::signout))
        .route("/user/change-password", post(auth::change_password))
        .route("/user/get-user-details", post(auth::user_details))
        .route("/msg/send-message", post(messages::send_message))
        .route("/msg/upload", post(messages::upload_images))
        .route("/msg/chat-users", get(messages::chat_users))
        .route("/msg/get-messages/{user2}", get(messages::get_messages))
        .route("/msg/edit-message/{messageId}", patch(messages::edit_message))
        .route("/msg/delete-message/{messageId}", delete(messages::delete_message))
        .route("/book/add", post(books::add_book))
        .route("/book/all", get(books::all_books))
        .route("/book/filter", get(books::filter_books))
        .route("/book/update/{id}", put(books::update_book))
        .route("/book/my-books", get(books::my_books))
        .route("/book/my/{slug}", get(books::book_by_slug))
        .route("/book/related/{bookId}", get(books::related_books))
        .route("/book/delete/{bookId}", delete(books::delete_book))
        .route("/book/req/add", post(book_requests::add_request))
        .route("/book/req/check/{bookId}", get(book_requests::check_request))
        .route("/book/req/get", get(book_requests::list_requests))
        .route("/book/req/search", get(book_requests::search_requests))
        .route("/book/req/paginated", get(book_requests::paginated_requests))
        .route("/book/req/get-send-requests", get(book_requests::sent_requests))
        .route("/book/req/status/{id}", post(book_requests::set_request_status))
        .route("/book/req/cancel/{bookId}", post(book_requests::cancel_request))
        .route("/category/admin/add", post(categories::add_category))
        .route("/category/all", get(categories::all_categories))
        .route(
            "/category/{id}",
            get(categories::get_category).put(categories::update_category).delete(categories::delete_category),
        )
        .route("/gateway", get(gateway::websocket_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(GovernorLayer::new(standard_conf));

    Router::new()
        .nest("/api/v1", credential_routes.merge(api_routes))
        .nest_service("/uploads", uploads)
        .layer(from_fn_with_state(state.clone(), log_rate_limit_events))
        .layer(PropagateRequestIdLayer::new(axum::http::HeaderName::from_static("x-request-id")))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(move |request: &Request<Body>| {
                    let request_id = request
                        .extensions()
                        .get::<tower_http::request_id::RequestId>()
                        .map(|id| id.header_value().to_str().unwrap_or_default())
                        .unwrap_or_default()
                        .to_string();

                    tracing::info_span!(
                        "request",
                        "request_id" = %request_id,
                        "http.request.method" = %request.method(),
                        "url.path" = %request.uri().path(),
                        "http.response.status_code" = tracing::field::Empty,
                        "otel.kind" = "server",
                        "user_id" = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                        let status = response.status();
                        tracing::Span::current().record("http.response.status_code", status.as_u16());

                        tracing::info!(
                            latency_ms = %latency.as_millis(),
                            status = %status.as_u16(),
                            "request completed"
                        );
                    },
                )
                .on_failure(|error, _latency, _span: &tracing::Span| {
                    tracing::error!(error = %error, "request failed");
                }),
        )
        .layer(SetRequestIdLayer::new(
            axum::http::HeaderName::from_static("x-request-id"),
            middleware::MakeRequestUuidOrHeader,
        ))
        .with_state(state)
}

pub fn mgmt_router(state: MgmtState) -> Router {
    Router::new().route("/livez", get(health::livez)).route("/readyz", get(health::readyz)).with_state(state)
}
