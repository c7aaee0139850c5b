//! SQLite Persistence - 书籍树存储

mod book_repo;
mod database;

pub use book_repo::SqliteBookStore;
pub use database::{create_pool, run_migrations, DatabaseConfig, DbPool};
