//! Event Publisher Implementation
//!
//! WebSocket 事件推送实现：流水线进度的结构化可观测出口

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::application::ports::PipelineStage;

/// WebSocket 事件类型
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum WsEvent {
    /// 文档流水线阶段变更
    StageChanged {
        document_id: Uuid,
        stage: String,
    },
    /// 章节骨架就绪
    ChapterReady {
        book_id: Uuid,
        chapter_id: Uuid,
        chapter_index: usize,
    },
    /// 段落到达新状态（生成/润色完成）
    ParagraphReady {
        book_id: Uuid,
        chapter_id: Uuid,
        paragraph_id: Uuid,
        status: String,
    },
    /// 段落生成失败（已写入占位文本）
    ParagraphFailed {
        book_id: Uuid,
        chapter_id: Uuid,
        paragraph_id: Uuid,
        error: String,
    },
    /// 运行失败（终态）
    RunFailed {
        document_id: Uuid,
        error: String,
    },
}

/// 事件发布器
pub struct EventPublisher {
    /// 全局广播通道（所有流水线事件）
    global_channel: broadcast::Sender<WsEvent>,
}

impl EventPublisher {
    pub fn new() -> Self {
        let (global_tx, _) = broadcast::channel(256);
        Self {
            global_channel: global_tx,
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 订阅全局事件
    pub fn subscribe_global(&self) -> broadcast::Receiver<WsEvent> {
        self.global_channel.subscribe()
    }

    /// 发布阶段变更事件
    pub fn publish_stage_changed(&self, document_id: Uuid, stage: PipelineStage) {
        self.publish(WsEvent::StageChanged {
            document_id,
            stage: stage.as_str().to_string(),
        });
    }

    /// 发布章节就绪事件
    pub fn publish_chapter_ready(&self, book_id: Uuid, chapter_id: Uuid, chapter_index: usize) {
        self.publish(WsEvent::ChapterReady {
            book_id,
            chapter_id,
            chapter_index,
        });
    }

    /// 发布段落就绪事件
    pub fn publish_paragraph_ready(
        &self,
        book_id: Uuid,
        chapter_id: Uuid,
        paragraph_id: Uuid,
        status: &str,
    ) {
        self.publish(WsEvent::ParagraphReady {
            book_id,
            chapter_id,
            paragraph_id,
            status: status.to_string(),
        });
    }

    /// 发布段落失败事件
    pub fn publish_paragraph_failed(
        &self,
        book_id: Uuid,
        chapter_id: Uuid,
        paragraph_id: Uuid,
        error: &str,
    ) {
        self.publish(WsEvent::ParagraphFailed {
            book_id,
            chapter_id,
            paragraph_id,
            error: error.to_string(),
        });
    }

    /// 发布运行失败事件
    pub fn publish_run_failed(&self, document_id: Uuid, error: &str) {
        self.publish(WsEvent::RunFailed {
            document_id,
            error: error.to_string(),
        });
    }

    fn publish(&self, event: WsEvent) {
        if let Err(e) = self.global_channel.send(event) {
            tracing::debug!(error = %e, "Failed to publish event (no receivers)");
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
