//! Command Handlers

mod book_handlers;
mod template_handlers;

pub use book_handlers::{
    BookAccepted, DeleteBookHandler, ExpandParagraphHandler, GenerateBookHandler,
    RefineBookHandler,
};
pub use template_handlers::{GenerateTemplateHandler, TemplateAccepted};
