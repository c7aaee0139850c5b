//! HTTP LLM Client - 调用外部文本生成 HTTP 服务
//!
//! 实现 LlmEnginePort trait，通过 HTTP 调用外部生成服务
//!
//! 外部生成 API:
//! POST {base_url}/api/llm/generate
//! Request: {"prompt": "...", "model": "...", "space_id": "..."}  (JSON)
//! Response: {"text": "...", "model": "..."}  (JSON)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::application::ports::{GenerateRequest, GenerateResponse, LlmEnginePort, LlmError};

/// 生成请求体 (JSON)
#[derive(Debug, Serialize)]
struct LlmHttpRequest<'a> {
    prompt: &'a str,
    model: &'a str,
    space_id: String,
}

/// 生成响应体 (JSON)
#[derive(Debug, Deserialize)]
struct LlmHttpResponse {
    text: String,
    #[serde(default)]
    model: Option<String>,
}

/// HTTP LLM 客户端配置
#[derive(Debug, Clone)]
pub struct HttpLlmClientConfig {
    /// 生成服务基础 URL
    pub base_url: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for HttpLlmClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 120,
        }
    }
}

impl HttpLlmClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// HTTP LLM 客户端
///
/// 通过 HTTP 调用外部文本生成服务
pub struct HttpLlmClient {
    client: Client,
    config: HttpLlmClientConfig,
}

impl HttpLlmClient {
    /// 创建新的 HTTP LLM 客户端
    pub fn new(config: HttpLlmClientConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// 使用默认配置创建客户端
    pub fn with_default_config() -> Result<Self, LlmError> {
        Self::new(HttpLlmClientConfig::default())
    }

    /// 获取生成 URL
    fn generate_url(&self) -> String {
        format!("{}/api/llm/generate", self.config.base_url)
    }

    /// 获取健康检查 URL
    fn health_url(&self) -> String {
        format!("{}/health", self.config.base_url)
    }
}

#[async_trait]
impl LlmEnginePort for HttpLlmClient {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        let http_request = LlmHttpRequest {
            prompt: &request.prompt,
            model: &request.model,
            space_id: request.space_id.to_string(),
        };

        tracing::debug!(
            url = %self.generate_url(),
            model = %request.model,
            prompt_len = request.prompt.len(),
            "Sending generation request"
        );

        let response = self
            .client
            .post(self.generate_url())
            .json(&http_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else if e.is_connect() {
                    LlmError::NetworkError(format!("Cannot connect to LLM service: {}", e))
                } else {
                    LlmError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::QuotaExceeded(error_text));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::ServiceError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let body: LlmHttpResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        tracing::debug!(
            model = ?body.model,
            text_len = body.text.len(),
            "Generation completed"
        );

        Ok(GenerateResponse {
            text: body.text,
            model: body.model.unwrap_or_else(|| request.model.clone()),
        })
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get(self.health_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = HttpLlmClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.timeout_secs, 120);
    }

    #[test]
    fn test_config_builder() {
        let config = HttpLlmClientConfig::new("http://example.com:9000").with_timeout(60);
        assert_eq!(config.base_url, "http://example.com:9000");
        assert_eq!(config.timeout_secs, 60);
    }
}
