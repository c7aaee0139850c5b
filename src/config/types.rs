//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;

/// 应用主配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// LLM 生成服务配置
    #[serde(default)]
    pub llm: LlmConfig,

    /// 流水线配置
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
            pipeline: PipelineConfig::default(),
            database: DatabaseConfig::default(),
            log: LogConfig::default(),
        }
    }
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// LLM 生成服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// 生成服务基础 URL
    #[serde(default = "default_llm_url")]
    pub url: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// 各流水线环节模型名
    #[serde(default)]
    pub models: ModelsConfig,
}

fn default_llm_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_llm_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: default_llm_url(),
            timeout_secs: default_llm_timeout(),
            models: ModelsConfig::default(),
        }
    }
}

/// 模型选择配置
///
/// 模型选择是部署级决策；默认值沿用历史部署中各环节的选型
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// 章节/段落规划
    #[serde(default = "default_template_model")]
    pub template: String,

    /// 段落初稿
    #[serde(default = "default_paragraph_model")]
    pub paragraph: String,

    /// 润色
    #[serde(default = "default_refinement_model")]
    pub refinement: String,

    /// JSON 修复
    #[serde(default = "default_repair_model")]
    pub repair: String,
}

fn default_template_model() -> String {
    "gpt-4o".to_string()
}

fn default_paragraph_model() -> String {
    "gpt-4o".to_string()
}

fn default_refinement_model() -> String {
    "qwen".to_string()
}

fn default_repair_model() -> String {
    "o1-mini".to_string()
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            template: default_template_model(),
            paragraph: default_paragraph_model(),
            refinement: default_refinement_model(),
            repair: default_repair_model(),
        }
    }
}

/// 流水线配置
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// 阶段内扇出的最大并发数
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// 生成层重试次数
    #[serde(default = "default_generation_attempts")]
    pub generation_attempts: u32,

    /// 生成层重试间隔（毫秒）
    #[serde(default = "default_retry_delay_ms")]
    pub generation_retry_delay_ms: u64,

    /// 润色层重试次数
    #[serde(default = "default_generation_attempts")]
    pub refinement_attempts: u32,

    /// 润色层重试间隔（毫秒）
    #[serde(default = "default_retry_delay_ms")]
    pub refinement_retry_delay_ms: u64,

    /// 初稿阶段 JSON 规整迭代预算
    #[serde(default = "default_draft_normalize_passes")]
    pub draft_normalize_passes: u32,

    /// 润色阶段 JSON 规整迭代预算
    #[serde(default = "default_refine_normalize_passes")]
    pub refine_normalize_passes: u32,
}

fn default_max_concurrent() -> usize {
    3
}

fn default_generation_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_draft_normalize_passes() -> u32 {
    5
}

fn default_refine_normalize_passes() -> u32 {
    3
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            generation_attempts: default_generation_attempts(),
            generation_retry_delay_ms: default_retry_delay_ms(),
            refinement_attempts: default_generation_attempts(),
            refinement_retry_delay_ms: default_retry_delay_ms(),
            draft_normalize_passes: default_draft_normalize_passes(),
            refine_normalize_passes: default_refine_normalize_passes(),
        }
    }
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库文件路径
    #[serde(default = "default_db_path")]
    pub path: String,

    /// 最大连接数
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/bookforge.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// 获取数据库 URL
    pub fn database_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.path)
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5080);
        assert_eq!(config.llm.url, "http://localhost:8000");
        assert_eq!(config.pipeline.max_concurrent, 3);
        assert_eq!(config.pipeline.generation_attempts, 3);
        assert_eq!(config.database.path, "data/bookforge.db");
    }

    #[test]
    fn test_server_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.addr(), "0.0.0.0:5080");
    }

    #[test]
    fn test_database_url() {
        let config = DatabaseConfig::default();
        assert_eq!(config.database_url(), "sqlite:data/bookforge.db?mode=rwc");
    }

    #[test]
    fn test_deserialize_from_toml() {
        let raw = r#"
            [server]
            port = 6000

            [llm]
            url = "http://llm:9000"

            [llm.models]
            refinement = "qwen-plus"

            [pipeline]
            max_concurrent = 5
            generation_attempts = 4
        "#;

        let config: AppConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.server.port, 6000);
        assert_eq!(config.server.host, "0.0.0.0"); // 默认值
        assert_eq!(config.llm.url, "http://llm:9000");
        assert_eq!(config.llm.models.refinement, "qwen-plus");
        assert_eq!(config.llm.models.repair, "o1-mini"); // 默认值
        assert_eq!(config.pipeline.max_concurrent, 5);
        assert_eq!(config.pipeline.generation_attempts, 4);
    }
}
