//! Bookforge - 书籍生成流水线服务
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Book Context: 书籍/章节/段落聚合
//! - prompts: 提示词构建（含润色位置三分规则）
//! - sanitize: abstract 字段可逆消毒
//!
//! 应用层 (application/):
//! - Ports: 端口定义（LlmEngine, BookStore, StageQueue, RunTracker）
//! - Normalizer: JSON 规整器（有界修复流水线）
//! - Retry: 有界重试策略
//! - Commands: CQRS 命令处理器
//! - Queries: CQRS 查询处理器
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: RESTful API + WebSocket
//! - Memory: StageQueue, RunTracker 内存实现
//! - Worker: PipelineWorker 阶段处理 + BoundedScheduler 有界并发
//! - Persistence: SQLite 存储
//! - Adapters: LLM HTTP/Fake 客户端
//! - Events: WebSocket 事件发布

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
