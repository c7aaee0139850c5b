//! HTTP Routes
//!
//! API 路由定义
//!
//! API Endpoints:
//! - /api/ping              GET   健康检查
//! - /api/template/generate POST  生成书籍模板（异步，立即返回 id）
//! - /api/book/generate     POST  由模板生成成书（异步，立即返回 id）
//! - /api/book/refine       POST  触发全书润色（异步）
//! - /api/book/get          POST  获取完整书籍树
//! - /api/book/list         POST  列出空间内书籍
//! - /api/book/status       POST  查询流水线运行状态
//! - /api/book/delete       POST  删除书籍
//! - /api/paragraph/expand  POST  单段重写（异步）
//! - /ws/events             WS    全局事件流（阶段/段落事件）

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/api", api_routes())
        .route("/ws/events", get(handlers::events_websocket_handler))
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .nest("/template", template_routes())
        .nest("/book", book_routes())
        .nest("/paragraph", paragraph_routes())
}

/// Template 路由
fn template_routes() -> Router<Arc<AppState>> {
    Router::new().route("/generate", post(handlers::generate_template))
}

/// Book 路由
fn book_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate", post(handlers::generate_book))
        .route("/refine", post(handlers::refine_book))
        .route("/get", post(handlers::get_book))
        .route("/list", post(handlers::list_books))
        .route("/status", post(handlers::book_status))
        .route("/delete", post(handlers::delete_book))
}

/// Paragraph 路由
fn paragraph_routes() -> Router<Arc<AppState>> {
    Router::new().route("/expand", post(handlers::expand_paragraph))
}
