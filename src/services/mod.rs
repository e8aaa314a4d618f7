pub mod account_service;
pub mod auth_service;
pub mod book_request_service;
pub mod book_service;
pub mod category_service;
pub mod chat_service;
pub mod gateway;
pub mod health_service;
pub mod message_service;
pub mod presence;
pub mod rate_limit_service;
pub mod upload_service;
