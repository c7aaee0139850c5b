//! Refine Stage - 邻居感知润色
//!
//! 从存储重建内存镜像后按章扇出：章与章并发（调度器限流），
//! 章内严格按位置顺序推进，保证邻居提示词读到的是已润色文本而
//! 不是旧种子。润色失败保留润色前文本，绝不用错误信息覆盖好内容。

use std::sync::Arc;
use uuid::Uuid;

use crate::application::ports::{ParagraphUpdate, PipelineStage, RefineBookJob};
use crate::domain::book::{Book, BookId, BookSpec, Chapter, Paragraph, ParagraphStatus};
use crate::domain::prompts::{
    paragraph_schema, refinement_prompt, GeneratedParagraph, NeighborContext,
};
use crate::domain::unsanitize;

use super::context::{record_fatal, take_fatal, FatalSlot};
use super::{BoundedScheduler, PipelineError, StageContext};

/// 执行全书润色阶段
pub(super) async fn run(ctx: Arc<StageContext>, job: RefineBookJob) {
    let book_id = job.book_id;

    match refine_book(&ctx, &job).await {
        Ok(()) => {
            let _ = ctx
                .run_tracker
                .set_stage(book_id, PipelineStage::RefinementComplete);
            ctx.events
                .publish_stage_changed(book_id, PipelineStage::RefinementComplete);
            tracing::info!(book_id = %book_id, "Refinement complete");
        }
        Err(error) => {
            tracing::error!(book_id = %book_id, error = %error, "Refinement failed");
            let _ = ctx.run_tracker.set_failed(book_id, error.to_string());
            ctx.events.publish_run_failed(book_id, &error.to_string());
        }
    }
}

async fn refine_book(ctx: &Arc<StageContext>, job: &RefineBookJob) -> Result<(), PipelineError> {
    let space_id = job.space_id;
    let book_id = job.book_id;

    let tree = ctx
        .book_store
        .get_book(space_id, book_id)
        .await?
        .ok_or_else(|| PipelineError::InvalidDocument(format!("book {} not found", book_id)))?;

    let _ = ctx.run_tracker.set_stage(book_id, PipelineStage::Refining);
    ctx.events
        .publish_stage_changed(book_id, PipelineStage::Refining);

    // 提示词嵌入还原消毒后的 abstract 原文
    let book_abstract = unsanitize(&tree.abstract_text);

    // 重建内存镜像，再拆成按章独占的工作单元
    let spec = BookSpec::from_abstract_json(&tree.abstract_text)?;
    let mut chapters = Vec::with_capacity(tree.chapters.len());
    for chapter_tree in &tree.chapters {
        let paragraphs = chapter_tree
            .paragraphs
            .iter()
            .map(|p| Paragraph::new(p.id, p.index, p.text.clone(), p.status))
            .collect();
        chapters.push(
            Chapter::new(
                chapter_tree.id,
                chapter_tree.index,
                chapter_tree.title.clone(),
                chapter_tree.idea.clone(),
            )
            .with_paragraphs(paragraphs),
        );
    }
    let book = Book::new(BookId::from_uuid(book_id), tree.title.clone(), spec).with_chapters(chapters);

    // 章间并发、章内顺序
    let scheduler = BoundedScheduler::new(ctx.config.max_concurrent);
    let fatal: FatalSlot = FatalSlot::default();

    for chapter in book.into_chapters() {
        let ctx = ctx.clone();
        let fatal = fatal.clone();
        let book_abstract = book_abstract.clone();
        scheduler.push(async move {
            refine_chapter(ctx, space_id, book_id, book_abstract, chapter, fatal).await;
        });
    }

    scheduler.on_idle().await;

    match take_fatal(&fatal) {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// 顺序润色一个章节
///
/// 任务独占本章镜像：每次成功润色都写回镜像，后续段落的邻居
/// 上下文因此读到的是最新文本。
async fn refine_chapter(
    ctx: Arc<StageContext>,
    space_id: Uuid,
    book_id: Uuid,
    book_abstract: String,
    mut chapter: Chapter,
    fatal: FatalSlot,
) {
    let chapter_id = chapter.id();
    let total = chapter.paragraph_count();

    for index in 0..total {
        let (paragraph_id, prompt) = {
            let paragraphs = chapter.paragraphs();
            let paragraph = &paragraphs[index];

            // 失败占位段落不参与润色，保持失败标记可见
            if paragraph.status() == ParagraphStatus::Failed {
                continue;
            }

            let neighbors = NeighborContext::for_paragraph(paragraphs, index);
            (
                paragraph.id(),
                refinement_prompt(
                    &book_abstract,
                    chapter.title(),
                    chapter.idea(),
                    paragraph.text(),
                    neighbors,
                ),
            )
        };

        match refine_paragraph(&ctx, space_id, &prompt).await {
            Ok(refined_text) => {
                let update = ParagraphUpdate {
                    text: refined_text.clone(),
                    status: ParagraphStatus::Refined,
                };
                match ctx
                    .book_store
                    .update_paragraph(space_id, book_id, chapter_id, paragraph_id, &update)
                    .await
                {
                    Ok(()) => {
                        // 同步镜像，供后续邻居提示词使用
                        if let Some(p) = chapter.paragraph_mut(index) {
                            p.set_text(refined_text, ParagraphStatus::Refined);
                        }
                        ctx.events.publish_paragraph_ready(
                            book_id,
                            chapter_id,
                            paragraph_id,
                            ParagraphStatus::Refined.as_str(),
                        );
                    }
                    Err(error) => {
                        // Persistence 致命：记录后整章终止
                        record_fatal(&fatal, error.into());
                        return;
                    }
                }
            }
            Err(error) => {
                // 非致命：保留润色前文本
                tracing::warn!(
                    book_id = %book_id,
                    chapter_id = %chapter_id,
                    paragraph_id = %paragraph_id,
                    error = %error,
                    "Refinement failed, keeping existing text"
                );
            }
        }
    }
}

/// 一次润色调用：有界重试生成 + 规整；失败由调用方按非致命处理
async fn refine_paragraph(
    ctx: &Arc<StageContext>,
    space_id: Uuid,
    prompt: &str,
) -> Result<String, PipelineError> {
    let schema = paragraph_schema();

    let refined = ctx
        .config
        .refinement_retry
        .run("paragraph-refine", || {
            ctx.generate_structured::<GeneratedParagraph>(
                prompt.to_string(),
                &ctx.config.models.refinement,
                ctx.config.refine_normalize_passes,
                &schema,
                space_id,
            )
        })
        .await?;

    Ok(refined.text)
}
