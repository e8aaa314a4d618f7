//! Process-local stores used when no database is configured and by the test suite.

pub mod book_repo;
pub mod book_request_repo;
pub mod category_repo;
pub mod message_repo;
pub mod user_repo;

pub use book_repo::MemoryBookStore;
pub use book_request_repo::MemoryBookRequestStore;
pub use category_repo::MemoryCategoryStore;
pub use message_repo::MemoryMessageStore;
pub use user_repo::MemoryUserStore;
