//! Stage Context - 阶段共享服务与配置

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use uuid::Uuid;

use crate::application::normalizer::JsonNormalizer;
use crate::application::ports::{
    BookStorePort, GenerateRequest, LlmEnginePort, RunTrackerPort, StageQueuePort,
};
use crate::application::retry::RetryPolicy;
use crate::infrastructure::events::EventPublisher;

use super::PipelineError;

/// 阶段内首个致命错误槽
///
/// 扇出任务按段落/章节划分实体所有权，这个槽是唯一允许的跨任务
/// 共享写入点；先到的错误保留，后续错误只记日志。
pub(super) type FatalSlot = Arc<Mutex<Option<PipelineError>>>;

pub(super) fn record_fatal(slot: &FatalSlot, error: PipelineError) {
    let mut guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if guard.is_some() {
        tracing::warn!(error = %error, "Additional fatal error after first, dropping");
        return;
    }
    *guard = Some(error);
}

/// 取出致命槽内容（阶段排空后调用一次）
pub(super) fn take_fatal(slot: &FatalSlot) -> Option<PipelineError> {
    slot.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take()
}

/// 各流水线环节使用的模型名
///
/// 模型选择是部署级配置点，代码不依赖任何具体模型
#[derive(Debug, Clone)]
pub struct StageModels {
    /// 章节/段落规划
    pub template: String,
    /// 段落初稿
    pub paragraph: String,
    /// 润色
    pub refinement: String,
    /// JSON 修复
    pub repair: String,
}

impl Default for StageModels {
    fn default() -> Self {
        Self {
            template: "gpt-4o".to_string(),
            paragraph: "gpt-4o".to_string(),
            refinement: "qwen".to_string(),
            repair: "o1-mini".to_string(),
        }
    }
}

/// Pipeline Worker 配置
#[derive(Debug, Clone)]
pub struct PipelineWorkerConfig {
    /// 阶段内段落/章节扇出的最大并发数
    pub max_concurrent: usize,
    /// 生成层重试策略（模板规划与段落初稿）
    pub generation_retry: RetryPolicy,
    /// 润色层重试策略
    pub refinement_retry: RetryPolicy,
    /// 初稿阶段 JSON 规整迭代预算
    pub draft_normalize_passes: u32,
    /// 润色阶段 JSON 规整迭代预算
    pub refine_normalize_passes: u32,
    /// 各环节模型名
    pub models: StageModels,
}

impl Default for PipelineWorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            generation_retry: RetryPolicy::new(3, Duration::from_millis(2000)),
            refinement_retry: RetryPolicy::new(3, Duration::from_millis(2000)),
            draft_normalize_passes: 5,
            refine_normalize_passes: 3,
            models: StageModels::default(),
        }
    }
}

/// 阶段共享上下文
///
/// 只承载服务句柄与配置；每次运行的可变状态（任务清单、回滚清单、
/// 致命错误槽）由各阶段自建并按任务划分所有权。
pub struct StageContext {
    pub config: PipelineWorkerConfig,
    pub book_store: Arc<dyn BookStorePort>,
    pub llm_engine: Arc<dyn LlmEnginePort>,
    pub normalizer: JsonNormalizer,
    pub run_tracker: Arc<dyn RunTrackerPort>,
    pub stage_queue: Arc<dyn StageQueuePort>,
    pub events: Arc<EventPublisher>,
}

impl StageContext {
    /// 一次生成调用：LLM -> JSON 规整，返回已验证可解析的值
    pub async fn generate_json(
        &self,
        prompt: String,
        model: &str,
        normalize_passes: u32,
        schema: &Value,
        space_id: Uuid,
    ) -> Result<Value, PipelineError> {
        let response = self
            .llm_engine
            .generate(GenerateRequest {
                prompt,
                model: model.to_string(),
                space_id,
            })
            .await?;

        let value = self
            .normalizer
            .normalize(&response.text, normalize_passes, Some(schema), space_id)
            .await?;
        Ok(value)
    }

    /// 生成并按目标形态反序列化
    pub async fn generate_structured<T: serde::de::DeserializeOwned>(
        &self,
        prompt: String,
        model: &str,
        normalize_passes: u32,
        schema: &Value,
        space_id: Uuid,
    ) -> Result<T, PipelineError> {
        let value = self
            .generate_json(prompt, model, normalize_passes, schema, space_id)
            .await?;
        serde_json::from_value(value).map_err(|e| PipelineError::ShapeMismatch(e.to_string()))
    }
}
