//! Draft Stage - 成书初稿
//!
//! 把模板骨架复制进新书，然后以段落为原子单位扇出生成任务：
//! 每个任务自带上下文快照、经有界重试、由调度器限流。单个段落
//! 重试耗尽只在该段落写入失败占位文本，绝不波及兄弟段落或整个
//! 运行；存储失败则记入致命槽，阶段排空后终止运行。

use std::sync::Arc;
use uuid::Uuid;

use crate::application::ports::{
    DraftBookJob, ExpandParagraphJob, NewChapter, NewParagraph, ParagraphUpdate, PipelineStage,
    RefineBookJob, StageJob,
};
use crate::domain::book::{BookSpec, ParagraphStatus};
use crate::domain::prompts::{paragraph_draft_prompt, paragraph_schema, GeneratedParagraph};

use super::context::{record_fatal, take_fatal, FatalSlot};
use super::{BoundedScheduler, PipelineError, StageContext};

/// 每段生成任务的上下文快照（任务独占）
struct ParagraphTask {
    space_id: Uuid,
    book_id: Uuid,
    chapter_id: Uuid,
    paragraph_id: Uuid,
    seed_idea: String,
    chapter_title: String,
    chapter_idea: String,
    spec: BookSpec,
}

/// 执行成书初稿阶段；成功后自动投递润色作业
pub(super) async fn run(ctx: Arc<StageContext>, job: DraftBookJob) {
    let book_id = job.book_id;

    match draft_book(&ctx, &job).await {
        Ok(()) => {
            let _ = ctx
                .run_tracker
                .set_stage(book_id, PipelineStage::BookDraftReady);
            ctx.events
                .publish_stage_changed(book_id, PipelineStage::BookDraftReady);
            tracing::info!(book_id = %book_id, "Book draft ready");

            // 下一阶段走作业队列，保持阶段独立可重试
            if let Err(error) = ctx.stage_queue.submit(StageJob::RefineBook(RefineBookJob {
                space_id: job.space_id,
                book_id,
            })) {
                tracing::error!(
                    book_id = %book_id,
                    error = %error,
                    "Failed to queue refinement stage"
                );
                let _ = ctx.run_tracker.set_failed(book_id, error.to_string());
                ctx.events.publish_run_failed(book_id, &error.to_string());
            }
        }
        Err(error) => {
            tracing::error!(book_id = %book_id, error = %error, "Book draft failed");
            let _ = ctx.run_tracker.set_failed(book_id, error.to_string());
            ctx.events.publish_run_failed(book_id, &error.to_string());
        }
    }
}

async fn draft_book(ctx: &Arc<StageContext>, job: &DraftBookJob) -> Result<(), PipelineError> {
    let space_id = job.space_id;
    let book_id = job.book_id;

    let template = ctx
        .book_store
        .get_book(space_id, job.template_id)
        .await?
        .ok_or_else(|| {
            PipelineError::InvalidDocument(format!("template {} not found", job.template_id))
        })?;

    // 复制模板骨架：章节 + 种子段落
    let mut tasks = Vec::new();
    for chapter in &template.chapters {
        let chapter_id = ctx
            .book_store
            .add_chapter(
                space_id,
                book_id,
                &NewChapter {
                    title: chapter.title.clone(),
                    idea: chapter.idea.clone(),
                },
            )
            .await?;
        let _ = ctx.run_tracker.set_stage(book_id, PipelineStage::ChapterReady);
        ctx.events
            .publish_chapter_ready(book_id, chapter_id, chapter.index);

        for paragraph in &chapter.paragraphs {
            let paragraph_id = ctx
                .book_store
                .add_paragraph(
                    space_id,
                    book_id,
                    chapter_id,
                    &NewParagraph {
                        text: paragraph.text.clone(),
                        status: ParagraphStatus::Seed,
                    },
                )
                .await?;

            tasks.push(ParagraphTask {
                space_id,
                book_id,
                chapter_id,
                paragraph_id,
                seed_idea: paragraph.text.clone(),
                chapter_title: chapter.title.clone(),
                chapter_idea: chapter.idea.clone(),
                spec: job.spec.clone(),
            });
        }
    }

    let _ = ctx
        .run_tracker
        .set_stage(book_id, PipelineStage::ParagraphsGenerating);
    ctx.events
        .publish_stage_changed(book_id, PipelineStage::ParagraphsGenerating);

    // 段落扇出：调度器是唯一的并发准入点
    let scheduler = BoundedScheduler::new(ctx.config.max_concurrent);
    let fatal: FatalSlot = FatalSlot::default();

    let task_count = tasks.len();
    for task in tasks {
        let ctx = ctx.clone();
        let fatal = fatal.clone();
        scheduler.push(async move {
            draft_paragraph(ctx, task, fatal).await;
        });
    }

    scheduler.on_idle().await;
    tracing::debug!(book_id = %book_id, paragraphs = task_count, "Draft fan-out drained");

    match take_fatal(&fatal) {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// 生成单个段落正文
///
/// 生成+规整在重试包络内；重试耗尽写失败占位文本后返回（非致命）。
/// 存储失败属于另一个失败域：记入致命槽，不做生成层重试。
async fn draft_paragraph(ctx: Arc<StageContext>, task: ParagraphTask, fatal: FatalSlot) {
    if let Err(error) = ctx
        .book_store
        .update_paragraph(
            task.space_id,
            task.book_id,
            task.chapter_id,
            task.paragraph_id,
            &ParagraphUpdate {
                text: task.seed_idea.clone(),
                status: ParagraphStatus::Generating,
            },
        )
        .await
    {
        record_fatal(&fatal, error.into());
        return;
    }

    let prompt = paragraph_draft_prompt(
        &task.spec,
        &task.chapter_title,
        &task.chapter_idea,
        &task.seed_idea,
    );
    let schema = paragraph_schema();

    let result = ctx
        .config
        .generation_retry
        .run("paragraph-draft", || {
            ctx.generate_structured::<GeneratedParagraph>(
                prompt.clone(),
                &ctx.config.models.paragraph,
                ctx.config.draft_normalize_passes,
                &schema,
                task.space_id,
            )
        })
        .await;

    match result {
        Ok(generated) => {
            let update = ParagraphUpdate {
                text: generated.text,
                status: ParagraphStatus::Generated,
            };
            match ctx
                .book_store
                .update_paragraph(
                    task.space_id,
                    task.book_id,
                    task.chapter_id,
                    task.paragraph_id,
                    &update,
                )
                .await
            {
                Ok(()) => {
                    ctx.events.publish_paragraph_ready(
                        task.book_id,
                        task.chapter_id,
                        task.paragraph_id,
                        ParagraphStatus::Generated.as_str(),
                    );
                }
                Err(error) => record_fatal(&fatal, error.into()),
            }
        }
        Err(exhausted) => {
            // 可见的失败占位文本，运行继续
            let placeholder = format!("Error generating paragraph: {}", exhausted.last);
            tracing::warn!(
                book_id = %task.book_id,
                paragraph_id = %task.paragraph_id,
                attempts = exhausted.attempts,
                "Paragraph generation exhausted retries, recording failure placeholder"
            );

            match ctx
                .book_store
                .update_paragraph(
                    task.space_id,
                    task.book_id,
                    task.chapter_id,
                    task.paragraph_id,
                    &ParagraphUpdate {
                        text: placeholder,
                        status: ParagraphStatus::Failed,
                    },
                )
                .await
            {
                Ok(()) => {
                    ctx.events.publish_paragraph_failed(
                        task.book_id,
                        task.chapter_id,
                        task.paragraph_id,
                        &exhausted.last.to_string(),
                    );
                }
                Err(error) => record_fatal(&fatal, error.into()),
            }
        }
    }
}

// ============================================================================
// 单段重写
// ============================================================================

/// 执行单段重写作业
pub(super) async fn run_expand(ctx: Arc<StageContext>, job: ExpandParagraphJob) {
    if let Err(error) = expand_paragraph(&ctx, &job).await {
        tracing::error!(
            book_id = %job.book_id,
            paragraph_id = %job.paragraph_id,
            error = %error,
            "Paragraph expansion failed"
        );
    }
}

async fn expand_paragraph(
    ctx: &Arc<StageContext>,
    job: &ExpandParagraphJob,
) -> Result<(), PipelineError> {
    let tree = ctx
        .book_store
        .get_book(job.space_id, job.book_id)
        .await?
        .ok_or_else(|| {
            PipelineError::InvalidDocument(format!("book {} not found", job.book_id))
        })?;

    let spec = BookSpec::from_abstract_json(&tree.abstract_text)?;
    let chapter = tree
        .chapters
        .iter()
        .find(|c| c.id == job.chapter_id)
        .ok_or_else(|| {
            PipelineError::InvalidDocument(format!("chapter {} not found", job.chapter_id))
        })?;
    let paragraph = chapter
        .paragraphs
        .iter()
        .find(|p| p.id == job.paragraph_id)
        .ok_or_else(|| {
            PipelineError::InvalidDocument(format!("paragraph {} not found", job.paragraph_id))
        })?;

    let prompt = paragraph_draft_prompt(&spec, &chapter.title, &chapter.idea, &paragraph.text);
    let schema = paragraph_schema();

    let result = ctx
        .config
        .generation_retry
        .run("paragraph-expand", || {
            ctx.generate_structured::<GeneratedParagraph>(
                prompt.clone(),
                &ctx.config.models.paragraph,
                ctx.config.draft_normalize_passes,
                &schema,
                job.space_id,
            )
        })
        .await;

    let update = match result {
        Ok(generated) => ParagraphUpdate {
            text: generated.text,
            status: ParagraphStatus::Generated,
        },
        Err(exhausted) => ParagraphUpdate {
            text: format!("Error expanding paragraph: {}", exhausted.last),
            status: ParagraphStatus::Failed,
        },
    };

    let failed = update.status == ParagraphStatus::Failed;
    ctx.book_store
        .update_paragraph(
            job.space_id,
            job.book_id,
            job.chapter_id,
            job.paragraph_id,
            &update,
        )
        .await?;

    if failed {
        ctx.events.publish_paragraph_failed(
            job.book_id,
            job.chapter_id,
            job.paragraph_id,
            &update.text,
        );
    } else {
        ctx.events.publish_paragraph_ready(
            job.book_id,
            job.chapter_id,
            job.paragraph_id,
            update.status.as_str(),
        );
    }

    Ok(())
}
