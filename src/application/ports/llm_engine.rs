//! LLM Engine Port - 文本生成服务抽象
//!
//! 定义文本生成调用的抽象接口，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// 生成服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// 文本生成请求
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// 完整提示词
    pub prompt: String,
    /// 模型名（部署级配置，按流水线环节选择）
    pub model: String,
    /// 所属空间（透传给生成服务做配额归属）
    pub space_id: Uuid,
}

/// 文本生成响应
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    /// 模型返回的原始文本（未做任何结构化处理）
    pub text: String,
    /// 实际使用的模型名
    pub model: String,
}

/// LLM Engine Port
///
/// 外部文本生成服务的抽象接口。调用可能因网络/配额失败，
/// 由调用方的重试策略兜底。
#[async_trait]
pub trait LlmEnginePort: Send + Sync {
    /// 执行一次文本生成
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError>;

    /// 检查生成服务是否可用
    async fn health_check(&self) -> bool {
        true // 默认实现
    }
}
