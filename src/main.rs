//! Bookforge - 书籍生成流水线服务
//!
//! 组件装配:
//! - Domain: book/ (Bounded Context)
//! - Application: commands, queries, ports, normalizer, retry
//! - Infrastructure: http, memory, worker, persistence, adapters, events

use std::sync::Arc;
use std::time::Duration;

use bookforge::application::retry::RetryPolicy;
use bookforge::config::{load_config, print_config};
use bookforge::infrastructure::adapters::{HttpLlmClient, HttpLlmClientConfig};
use bookforge::infrastructure::events::EventPublisher;
use bookforge::infrastructure::http::{AppState, HttpServer, ServerConfig};
use bookforge::infrastructure::memory::{ChannelStageQueue, InMemoryRunTracker};
use bookforge::infrastructure::persistence::sqlite::{
    create_pool, run_migrations, DatabaseConfig, SqliteBookStore,
};
use bookforge::infrastructure::worker::{PipelineWorker, PipelineWorkerConfig, StageModels};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!(
        "{},bookforge={},tower_http=debug",
        config.log.level, config.log.level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .init();

    tracing::info!("Bookforge - 书籍生成流水线服务");
    print_config(&config);

    // 确保数据目录存在
    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // 初始化数据库
    let db_config = DatabaseConfig {
        database_url: config.database.database_url(),
        max_connections: config.database.max_connections,
    };
    let pool = create_pool(&db_config).await?;
    run_migrations(&pool).await?;

    // 创建 Book Store 适配器
    let book_store = Arc::new(SqliteBookStore::new(pool.clone()));

    // 创建 HTTP LLM 客户端
    let llm_config = HttpLlmClientConfig {
        base_url: config.llm.url.clone(),
        timeout_secs: config.llm.timeout_secs,
    };
    let llm_engine =
        Arc::new(HttpLlmClient::new(llm_config).map_err(|e| anyhow::anyhow!("{}", e))?);

    // 创建事件发布器
    let event_publisher = Arc::new(EventPublisher::new());

    // 创建阶段作业队列
    let (stage_tx, stage_rx) = mpsc::channel(1000);
    let stage_queue = Arc::new(ChannelStageQueue::new(stage_tx));

    // 创建内存运行状态跟踪器
    let run_tracker = Arc::new(InMemoryRunTracker::new());

    // 创建 PipelineWorker
    let worker_config = PipelineWorkerConfig {
        max_concurrent: config.pipeline.max_concurrent,
        generation_retry: RetryPolicy::new(
            config.pipeline.generation_attempts,
            Duration::from_millis(config.pipeline.generation_retry_delay_ms),
        ),
        refinement_retry: RetryPolicy::new(
            config.pipeline.refinement_attempts,
            Duration::from_millis(config.pipeline.refinement_retry_delay_ms),
        ),
        draft_normalize_passes: config.pipeline.draft_normalize_passes,
        refine_normalize_passes: config.pipeline.refine_normalize_passes,
        models: StageModels {
            template: config.llm.models.template.clone(),
            paragraph: config.llm.models.paragraph.clone(),
            refinement: config.llm.models.refinement.clone(),
            repair: config.llm.models.repair.clone(),
        },
    };
    let worker = PipelineWorker::new(
        worker_config,
        stage_rx,
        book_store.clone(),
        llm_engine.clone(),
        run_tracker.clone(),
        stage_queue.clone(),
        event_publisher.clone(),
    );

    // 启动 Worker
    tokio::spawn(worker.run());

    // 创建 HTTP 服务器
    let server_config = ServerConfig::new(&config.server.host, config.server.port);
    let state = AppState::new(
        book_store,
        llm_engine,
        run_tracker,
        stage_queue,
        event_publisher,
    );

    let server = HttpServer::new(server_config, state);

    tracing::info!("Starting HTTP server...");

    // 启动服务器（带优雅关闭）
    server
        .run_with_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to listen for ctrl-c");
            tracing::info!("Received shutdown signal");
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
