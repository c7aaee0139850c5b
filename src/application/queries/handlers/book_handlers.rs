//! Book Query Handlers

use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::{
    BookRecord, BookStorePort, BookTree, RunRecord, RunTrackerPort,
};
use crate::application::queries::{GetBook, GetRunStatus, ListBooks};

/// GetBook Handler
pub struct GetBookHandler {
    book_store: Arc<dyn BookStorePort>,
}

impl GetBookHandler {
    pub fn new(book_store: Arc<dyn BookStorePort>) -> Self {
        Self { book_store }
    }

    pub async fn handle(&self, query: GetBook) -> Result<BookTree, ApplicationError> {
        self.book_store
            .get_book(query.space_id, query.book_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Book", query.book_id))
    }
}

/// ListBooks Handler
pub struct ListBooksHandler {
    book_store: Arc<dyn BookStorePort>,
}

impl ListBooksHandler {
    pub fn new(book_store: Arc<dyn BookStorePort>) -> Self {
        Self { book_store }
    }

    pub async fn handle(&self, query: ListBooks) -> Result<Vec<BookRecord>, ApplicationError> {
        Ok(self.book_store.list_books(query.space_id).await?)
    }
}

/// GetRunStatus Handler
pub struct GetRunStatusHandler {
    run_tracker: Arc<dyn RunTrackerPort>,
}

impl GetRunStatusHandler {
    pub fn new(run_tracker: Arc<dyn RunTrackerPort>) -> Self {
        Self { run_tracker }
    }

    pub fn handle(&self, query: GetRunStatus) -> Option<RunRecord> {
        self.run_tracker.get_run(query.document_id)
    }
}
