//! Paragraph HTTP Handlers

use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::ExpandParagraph;
use crate::infrastructure::http::dto::{ApiResponse, Empty};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExpandParagraphRequest {
    pub space_id: Uuid,
    pub book_id: Uuid,
    pub chapter_id: Uuid,
    pub paragraph_id: Uuid,
}

/// 单段重写（异步处理，立即返回）
pub async fn expand_paragraph(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExpandParagraphRequest>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    let command = ExpandParagraph {
        space_id: req.space_id,
        book_id: req.book_id,
        chapter_id: req.chapter_id,
        paragraph_id: req.paragraph_id,
    };

    state.expand_paragraph_handler.handle(command).await?;

    Ok(Json(ApiResponse::ok()))
}
