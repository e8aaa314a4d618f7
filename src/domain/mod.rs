pub mod auth;
pub mod book;
pub mod book_request;
pub mod category;
pub mod conversation;
pub mod events;
pub mod mail;
pub mod message;
pub mod page;
pub mod ports;
pub mod user;
