//! Worker Layer - Background Stage Processing
//!
//! 实现 PipelineWorker（阶段作业消费）、BoundedScheduler（有界并发）
//! 与三个生成阶段（模板骨架 / 初稿 / 润色）

mod context;
mod draft_stage;
mod error;
mod pipeline_worker;
mod refine_stage;
mod scheduler;
mod template_stage;

pub use context::{PipelineWorkerConfig, StageContext, StageModels};
pub use error::PipelineError;
pub use pipeline_worker::PipelineWorker;
pub use scheduler::BoundedScheduler;
