//! Book HTTP Handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::application::{
    DeleteBook, GenerateBook, GetBook, GetRunStatus, ListBooks, RefineBook,
};
use crate::infrastructure::http::dto::{ApiResponse, Empty};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GenerateBookRequest {
    pub space_id: Uuid,
    pub template_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RefineBookRequest {
    pub space_id: Uuid,
    pub book_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct GetBookRequest {
    pub space_id: Uuid,
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct BookStatusRequest {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct DeleteBookRequest {
    pub space_id: Uuid,
    pub id: Uuid,
}

/// 异步接受响应 - 立即返回书籍 id，完成与否以段落状态为准
#[derive(Debug, Serialize)]
pub struct BookAcceptedResponse {
    pub id: Uuid,
    pub title: String,
    pub stage: String,
}

#[derive(Debug, Serialize)]
pub struct BookSummaryResponse {
    pub id: Uuid,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct ParagraphResponse {
    pub id: Uuid,
    pub index: usize,
    pub text: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ChapterResponse {
    pub id: Uuid,
    pub index: usize,
    pub title: String,
    pub idea: String,
    pub paragraphs: Vec<ParagraphResponse>,
}

#[derive(Debug, Serialize)]
pub struct BookTreeResponse {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub chapters: Vec<ChapterResponse>,
}

#[derive(Debug, Serialize)]
pub struct RunStatusResponse {
    pub id: Uuid,
    pub stage: String,
    pub error: Option<String>,
    pub started_at: String,
    pub updated_at: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// 由模板生成成书（异步处理，立即返回 id）
pub async fn generate_book(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateBookRequest>,
) -> Result<Json<ApiResponse<BookAcceptedResponse>>, ApiError> {
    let command = GenerateBook {
        space_id: req.space_id,
        template_id: req.template_id,
    };

    let result = state.generate_book_handler.handle(command).await?;

    Ok(Json(ApiResponse::success(BookAcceptedResponse {
        id: result.id,
        title: result.title,
        stage: result.stage.as_str().to_string(),
    })))
}

/// 触发全书润色（异步处理，立即返回）
pub async fn refine_book(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefineBookRequest>,
) -> Result<Json<ApiResponse<BookAcceptedResponse>>, ApiError> {
    let command = RefineBook {
        space_id: req.space_id,
        book_id: req.book_id,
    };

    let result = state.refine_book_handler.handle(command).await?;

    Ok(Json(ApiResponse::success(BookAcceptedResponse {
        id: result.id,
        title: result.title,
        stage: result.stage.as_str().to_string(),
    })))
}

/// 获取完整书籍树
pub async fn get_book(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GetBookRequest>,
) -> Result<Json<ApiResponse<BookTreeResponse>>, ApiError> {
    let query = GetBook {
        space_id: req.space_id,
        book_id: req.id,
    };

    let tree = state.get_book_handler.handle(query).await?;

    let chapters = tree
        .chapters
        .into_iter()
        .map(|c| ChapterResponse {
            id: c.id,
            index: c.index,
            title: c.title,
            idea: c.idea,
            paragraphs: c
                .paragraphs
                .into_iter()
                .map(|p| ParagraphResponse {
                    id: p.id,
                    index: p.index,
                    text: p.text,
                    status: p.status.as_str().to_string(),
                })
                .collect(),
        })
        .collect();

    Ok(Json(ApiResponse::success(BookTreeResponse {
        id: tree.id,
        title: tree.title,
        abstract_text: tree.abstract_text,
        chapters,
    })))
}

/// 获取书籍列表
pub async fn list_books(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ListBooksRequest>,
) -> Result<Json<ApiResponse<Vec<BookSummaryResponse>>>, ApiError> {
    let result = state
        .list_books_handler
        .handle(ListBooks {
            space_id: req.space_id,
        })
        .await?;

    let responses: Vec<BookSummaryResponse> = result
        .into_iter()
        .map(|b| BookSummaryResponse {
            id: b.id,
            title: b.title,
            created_at: b.created_at.to_rfc3339(),
            updated_at: b.updated_at.to_rfc3339(),
        })
        .collect();

    Ok(Json(ApiResponse::success(responses)))
}

#[derive(Debug, Deserialize)]
pub struct ListBooksRequest {
    pub space_id: Uuid,
}

/// 查询流水线运行状态
pub async fn book_status(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BookStatusRequest>,
) -> Result<Json<ApiResponse<RunStatusResponse>>, ApiError> {
    let run = state
        .get_run_status_handler
        .handle(GetRunStatus {
            document_id: req.id,
        })
        .ok_or_else(|| ApiError::NotFound(format!("No pipeline run for document {}", req.id)))?;

    Ok(Json(ApiResponse::success(RunStatusResponse {
        id: run.document_id,
        stage: run.stage.as_str().to_string(),
        error: run.error_message,
        started_at: run.started_at.to_rfc3339(),
        updated_at: run.updated_at.to_rfc3339(),
    })))
}

/// 删除书籍
pub async fn delete_book(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteBookRequest>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    let command = DeleteBook {
        space_id: req.space_id,
        book_id: req.id,
    };

    state.delete_book_handler.handle(command).await?;

    Ok(Json(ApiResponse::ok()))
}
