//! Template HTTP Handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::application::GenerateTemplate;
use crate::infrastructure::http::dto::ApiResponse;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GenerateTemplateRequest {
    pub space_id: Uuid,
    pub title: String,
    pub informative_text: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub edition: Option<String>,
}

/// 异步接受响应 - 立即返回模板 id，骨架展开通过轮询或 WS 观察
#[derive(Debug, Serialize)]
pub struct TemplateAcceptedResponse {
    pub id: Uuid,
    pub title: String,
    pub stage: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// 生成书籍模板（异步处理，立即返回 id）
pub async fn generate_template(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateTemplateRequest>,
) -> Result<Json<ApiResponse<TemplateAcceptedResponse>>, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Title is required".to_string()));
    }

    let command = GenerateTemplate {
        space_id: req.space_id,
        title: req.title,
        informative_text: req.informative_text,
        instructions: req.instructions,
        edition: req.edition,
    };

    let result = state.generate_template_handler.handle(command).await?;

    Ok(Json(ApiResponse::success(TemplateAcceptedResponse {
        id: result.id,
        title: result.title,
        stage: result.stage.as_str().to_string(),
    })))
}
