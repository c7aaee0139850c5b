//! Query Handlers

mod book_handlers;

pub use book_handlers::{GetBookHandler, GetRunStatusHandler, ListBooksHandler};
