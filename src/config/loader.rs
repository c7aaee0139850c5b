//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `BOOKFORGE_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `BOOKFORGE_SERVER__HOST=127.0.0.1`
/// - `BOOKFORGE_SERVER__PORT=8080`
/// - `BOOKFORGE_LLM__URL=http://llm-server:8000`
/// - `BOOKFORGE_LLM__MODELS__REFINEMENT=qwen-plus`
/// - `BOOKFORGE_PIPELINE__MAX_CONCURRENT=5`
/// - `BOOKFORGE_DATABASE__PATH=/data/bookforge.db`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 首先设置默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5080)?
        .set_default("llm.url", "http://localhost:8000")?
        .set_default("llm.timeout_secs", 120)?
        .set_default("llm.models.template", "gpt-4o")?
        .set_default("llm.models.paragraph", "gpt-4o")?
        .set_default("llm.models.refinement", "qwen")?
        .set_default("llm.models.repair", "o1-mini")?
        .set_default("pipeline.max_concurrent", 3)?
        .set_default("pipeline.generation_attempts", 3)?
        .set_default("pipeline.generation_retry_delay_ms", 2000)?
        .set_default("pipeline.refinement_attempts", 3)?
        .set_default("pipeline.refinement_retry_delay_ms", 2000)?
        .set_default("pipeline.draft_normalize_passes", 5)?
        .set_default("pipeline.refine_normalize_passes", 3)?
        .set_default("database.path", "data/bookforge.db")?
        .set_default("database.max_connections", 5)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        // 搜索默认配置文件
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 前缀: BOOKFORGE_
    // 层级分隔符: __ (双下划线)
    // 例如: BOOKFORGE_LLM__URL=http://llm-server:8000
    builder = builder.add_source(
        Environment::with_prefix("BOOKFORGE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    // 4. 构建配置
    let config = builder.build()?;

    // 5. 反序列化为 AppConfig
    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    // 6. 验证配置
    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    if config.llm.url.is_empty() {
        return Err(ConfigError::ValidationError(
            "LLM service URL cannot be empty".to_string(),
        ));
    }

    if config.database.path.is_empty() {
        return Err(ConfigError::ValidationError(
            "Database path cannot be empty".to_string(),
        ));
    }

    if config.pipeline.max_concurrent == 0 {
        return Err(ConfigError::ValidationError(
            "Pipeline max_concurrent cannot be 0".to_string(),
        ));
    }

    if config.pipeline.generation_attempts == 0 || config.pipeline.refinement_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "Retry attempts cannot be 0".to_string(),
        ));
    }

    if config.pipeline.draft_normalize_passes == 0 || config.pipeline.refine_normalize_passes == 0 {
        return Err(ConfigError::ValidationError(
            "Normalize passes cannot be 0".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}:{}", config.server.host, config.server.port);
    tracing::info!("LLM URL: {}", config.llm.url);
    tracing::info!("LLM Timeout: {}s", config.llm.timeout_secs);
    tracing::info!(
        "Models: template={} paragraph={} refinement={} repair={}",
        config.llm.models.template,
        config.llm.models.paragraph,
        config.llm.models.refinement,
        config.llm.models.repair
    );
    tracing::info!("Pipeline Concurrency: {}", config.pipeline.max_concurrent);
    tracing::info!(
        "Generation Retry: {} attempts / {}ms",
        config.pipeline.generation_attempts,
        config.pipeline.generation_retry_delay_ms
    );
    tracing::info!("Database: {}", config.database.path);
    tracing::info!("Database Max Connections: {}", config.database.max_connections);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5080);
    }

    #[test]
    fn test_validation_passes_for_valid_config() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_zero_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_empty_llm_url() {
        let mut config = AppConfig::default();
        config.llm.url = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_zero_concurrency() {
        let mut config = AppConfig::default();
        config.pipeline.max_concurrent = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
            [server]
            port = 7070

            [pipeline]
            max_concurrent = 8
            "#
        )
        .unwrap();

        let config = load_config_from_path(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 7070);
        assert_eq!(config.pipeline.max_concurrent, 8);
        // 其余字段落默认值
        assert_eq!(config.llm.models.repair, "o1-mini");
    }
}
