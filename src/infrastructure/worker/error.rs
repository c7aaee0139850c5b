//! Pipeline Errors - 流水线阶段错误

use thiserror::Error;

use crate::application::normalizer::NormalizeError;
use crate::application::ports::{LlmError, RepositoryError};
use crate::application::retry::RetryExhausted;

/// 流水线阶段执行错误
///
/// 传播规则:
/// - 段落层 RetryExhausted 就地吞掉，写失败占位文本，运行继续
/// - 模板/章节层 RetryExhausted 对运行致命，先补偿回滚再携带章节上下文上抛
/// - 润色层失败就地吞掉，保留润色前文本
/// - Persistence 在任何层级都致命，且不进入生成层重试
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 生成服务调用失败
    #[error("generation call failed: {0}")]
    Invocation(#[from] LlmError),

    /// JSON 规整失败（含 ParseExhausted）
    #[error("normalization failed: {0}")]
    Normalize(#[from] NormalizeError),

    /// 存储写入失败（独立失败域，不做生成层重试）
    #[error("persistence failed: {0}")]
    Persistence(#[from] RepositoryError),

    /// 重试次数耗尽，包装最后一次错误
    #[error("all {attempts} attempts exhausted: {last}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: Box<PipelineError>,
    },

    /// 章节层失败（携带章节定位信息）
    #[error("chapter {index} (\"{title}\") failed: {source}")]
    ChapterFailed {
        index: usize,
        title: String,
        #[source]
        source: Box<PipelineError>,
    },

    /// 响应结构与目标形态不符
    #[error("response shape mismatch: {0}")]
    ShapeMismatch(String),

    /// 文档状态不满足阶段前置条件
    #[error("invalid document state: {0}")]
    InvalidDocument(String),
}

impl From<RetryExhausted<PipelineError>> for PipelineError {
    fn from(e: RetryExhausted<PipelineError>) -> Self {
        PipelineError::RetryExhausted {
            attempts: e.attempts,
            last: Box::new(e.last),
        }
    }
}

impl From<crate::domain::book::BookError> for PipelineError {
    fn from(e: crate::domain::book::BookError) -> Self {
        PipelineError::InvalidDocument(e.to_string())
    }
}
