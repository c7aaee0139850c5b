//! JSON 规整器
//!
//! 把生成服务返回的不可靠自由文本收敛成可解析的 JSON。修复手段按
//! 固定顺序排列：先做零成本的句法修复，最后才回调生成服务做模型
//! 辅助修复；整体以迭代次数封顶，因此一次规整的外部调用次数不会
//! 超过 max_iterations。

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::application::ports::{GenerateRequest, LlmEnginePort, LlmError};

/// 规整失败
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// 迭代预算内未能得到可解析的 JSON
    #[error("unable to coerce output into valid JSON after {iterations} passes")]
    ParseExhausted { iterations: u32 },

    /// 模型辅助修复阶段的调用失败
    #[error(transparent)]
    Invocation(#[from] LlmError),
}

/// 修复阶段，按声明顺序执行
///
/// 顺序是该序列的不变量：廉价、确定性的修复在前，
/// 昂贵的模型辅助修复垫底。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RepairPhase {
    /// 截取 ```json ... ``` 围栏之间的内容
    StripFencedBlock,
    /// 字符串以围栏标记开头时剥掉首尾标记
    StripFenceMarker,
    /// 去掉内嵌换行
    RemoveNewlines,
    /// 去掉首尾空白
    TrimWhitespace,
    /// 模型辅助修复（回调生成服务）
    ModelRepair,
}

const REPAIR_PHASES: [RepairPhase; 5] = [
    RepairPhase::StripFencedBlock,
    RepairPhase::StripFenceMarker,
    RepairPhase::RemoveNewlines,
    RepairPhase::TrimWhitespace,
    RepairPhase::ModelRepair,
];

const FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";

/// JSON 规整器
pub struct JsonNormalizer {
    engine: Arc<dyn LlmEnginePort>,
    repair_model: String,
}

impl JsonNormalizer {
    pub fn new(engine: Arc<dyn LlmEnginePort>, repair_model: impl Into<String>) -> Self {
        Self {
            engine,
            repair_model: repair_model.into(),
        }
    }

    /// 把原始文本规整为 JSON 值
    ///
    /// 每个修复阶段执行前先做一次严格解析，成功立即返回。
    /// 完整跑满 max_iterations 轮仍不可解析时报 ParseExhausted。
    pub async fn normalize(
        &self,
        raw: &str,
        max_iterations: u32,
        schema: Option<&Value>,
        space_id: Uuid,
    ) -> Result<Value, NormalizeError> {
        let mut working = raw.to_string();
        let mut remaining = max_iterations;

        while remaining > 0 {
            for phase in REPAIR_PHASES {
                if let Ok(value) = serde_json::from_str::<Value>(&working) {
                    return Ok(value);
                }
                working = self.apply_phase(phase, working, schema, space_id).await?;
            }
            remaining -= 1;
        }

        tracing::warn!(
            iterations = max_iterations,
            "JSON normalization budget exhausted"
        );
        Err(NormalizeError::ParseExhausted {
            iterations: max_iterations,
        })
    }

    async fn apply_phase(
        &self,
        phase: RepairPhase,
        working: String,
        schema: Option<&Value>,
        space_id: Uuid,
    ) -> Result<String, NormalizeError> {
        let repaired = match phase {
            RepairPhase::StripFencedBlock => strip_fenced_block(&working),
            RepairPhase::StripFenceMarker => strip_fence_marker(&working),
            RepairPhase::RemoveNewlines => remove_newlines(&working),
            RepairPhase::TrimWhitespace => working.trim().to_string(),
            RepairPhase::ModelRepair => {
                let prompt = repair_prompt(&working, schema);
                let response = self
                    .engine
                    .generate(GenerateRequest {
                        prompt,
                        model: self.repair_model.clone(),
                        space_id,
                    })
                    .await?;
                tracing::debug!(
                    model = %self.repair_model,
                    response_len = response.text.len(),
                    "Model-assisted JSON repair applied"
                );
                response.text
            }
        };
        Ok(repaired)
    }
}

/// 截取第一个围栏开标记与其后首个闭标记之间的内容。
/// 没有围栏或围栏残缺时原样返回。
fn strip_fenced_block(input: &str) -> String {
    let Some(open) = input.find(FENCE_OPEN) else {
        return input.to_string();
    };
    let body = &input[open + FENCE_OPEN.len()..];
    match body.find(FENCE_CLOSE) {
        Some(close) => body[..close].to_string(),
        None => body.to_string(),
    }
}

/// 剥掉字符串自身的首尾围栏标记（针对没有独立内容行的围栏）
fn strip_fence_marker(input: &str) -> String {
    let Some(stripped) = input.strip_prefix(FENCE_OPEN) else {
        return input.to_string();
    };
    stripped
        .strip_suffix(FENCE_CLOSE)
        .unwrap_or(stripped)
        .to_string()
}

fn remove_newlines(input: &str) -> String {
    input.replace('\n', "")
}

fn repair_prompt(working: &str, schema: Option<&Value>) -> String {
    match schema {
        Some(schema) => format!(
            "Please convert the following string into JSON format matching the following \
             schema:\n{}\n{}\nOnly respond with valid JSON without any code blocks or \
             syntax markers.",
            schema, working
        ),
        None => format!(
            "Please convert the following string into a JSON string: \"{}\". Only respond \
             with valid JSON.",
            working
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::FakeLlmClient;
    use serde_json::json;

    fn normalizer_with(fake: FakeLlmClient) -> (JsonNormalizer, Arc<FakeLlmClient>) {
        let fake = Arc::new(fake);
        (
            JsonNormalizer::new(fake.clone(), "repair-model"),
            fake,
        )
    }

    #[tokio::test]
    async fn test_valid_json_returned_unchanged() {
        let (normalizer, fake) = normalizer_with(FakeLlmClient::new());
        let raw = r#"{"text":"already valid"}"#;

        let value = normalizer
            .normalize(raw, 5, Some(&json!({"text": "String"})), Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(value, json!({"text": "already valid"}));
        // 首轮解析成功，不应有任何模型调用
        assert_eq!(fake.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fenced_json_resolved_without_model_repair() {
        let (normalizer, fake) = normalizer_with(FakeLlmClient::new());
        let raw = "```json\n{\"text\":\"a\"}\n```";

        let value = normalizer
            .normalize(raw, 5, Some(&json!({"text": "String"})), Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(value, json!({"text": "a"}));
        assert_eq!(fake.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unrepairable_input_exhausts_budget() {
        let fake = FakeLlmClient::with_fixed_response("still not json");
        let (normalizer, fake) = normalizer_with(fake);

        let result = normalizer
            .normalize("definitely not json", 1, None, Uuid::new_v4())
            .await;

        match result {
            Err(NormalizeError::ParseExhausted { iterations }) => assert_eq!(iterations, 1),
            other => panic!("expected ParseExhausted, got {:?}", other),
        }
        // 每轮恰好一次模型辅助修复
        assert_eq!(fake.call_count(), 1);
    }

    #[tokio::test]
    async fn test_model_repair_resolves_on_next_pass() {
        let fake = FakeLlmClient::with_fixed_response(r#"{"text":"repaired"}"#);
        let (normalizer, fake) = normalizer_with(fake);

        let value = normalizer
            .normalize("not json at all", 2, Some(&json!({"text": "String"})), Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(value, json!({"text": "repaired"}));
        assert_eq!(fake.call_count(), 1);
    }

    #[test]
    fn test_strip_fenced_block_edge_cases() {
        // 无围栏
        assert_eq!(strip_fenced_block("plain"), "plain");
        // 只有开标记
        assert_eq!(strip_fenced_block("```json{\"a\":1}"), "{\"a\":1}");
        // 完整围栏带前后噪声
        assert_eq!(
            strip_fenced_block("noise ```json{\"a\":1}``` trailing"),
            "{\"a\":1}"
        );
        // 空输入
        assert_eq!(strip_fenced_block(""), "");
    }

    #[test]
    fn test_strip_fence_marker_edge_cases() {
        assert_eq!(strip_fence_marker("```json{\"a\":1}```"), "{\"a\":1}");
        // 缺少闭标记也不会越界
        assert_eq!(strip_fence_marker("```json{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_fence_marker("{\"a\":1}"), "{\"a\":1}");
    }
}
