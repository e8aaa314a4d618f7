pub mod book;
pub mod book_request;
pub mod category;
pub mod message;
pub mod user;

pub use book::BookRecord;
pub use book_request::BookRequestRecord;
pub use category::CategoryRecord;
pub use message::MessageRecord;
pub use user::UserRecord;
