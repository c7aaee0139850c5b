//! Fake LLM Client - 用于测试的生成客户端
//!
//! 不访问外部服务：按配置的固定文本或回调函数应答，并记录调用次数

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::application::ports::{GenerateRequest, GenerateResponse, LlmEnginePort, LlmError};

type FakeHandler = Box<dyn Fn(&GenerateRequest) -> Result<String, LlmError> + Send + Sync>;

/// Fake LLM Client
///
/// 默认返回固定的合法 JSON 段落；可通过 handler 按提示词内容分流应答，
/// 或注入失败来演练重试/占位路径。
pub struct FakeLlmClient {
    handler: FakeHandler,
    calls: AtomicUsize,
    delay: Duration,
}

impl FakeLlmClient {
    /// 默认应答：固定 JSON 段落
    pub fn new() -> Self {
        Self::with_fixed_response(r#"{"text":"fake generated paragraph"}"#)
    }

    /// 固定文本应答
    pub fn with_fixed_response(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::with_handler(move |_| Ok(text.clone()))
    }

    /// 自定义应答逻辑
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&GenerateRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    /// 模拟生成耗时
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// 已处理的生成调用次数
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for FakeLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmEnginePort for FakeLlmClient {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let text = (self.handler)(&request)?;

        tracing::debug!(
            model = %request.model,
            prompt_len = request.prompt.len(),
            "FakeLlmClient: returning scripted response"
        );

        Ok(GenerateResponse {
            text,
            model: request.model,
        })
    }

    async fn health_check(&self) -> bool {
        true
    }
}
