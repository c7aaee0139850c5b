//! Template Stage - 模板骨架展开
//!
//! 规划章节清单，再为每章规划段落种子并落库。模板层的重试耗尽对
//! 整个运行致命：先补偿回滚本章已创建的段落，再携带章节定位信息
//! 上抛。

use std::sync::Arc;
use uuid::Uuid;

use crate::application::ports::{
    BookStorePort, ExpandTemplateJob, NewChapter, NewParagraph, PipelineStage,
};
use crate::domain::book::{BookSpec, ParagraphStatus};
use crate::domain::prompts::{
    chapter_plan_prompt, chapter_plan_schema, paragraph_plan_prompt, paragraph_plan_schema,
    ChapterPlan, ChapterSeed, ParagraphPlan,
};

use super::{PipelineError, StageContext};

/// 执行模板骨架展开，失败时标记运行失败
pub(super) async fn run(ctx: Arc<StageContext>, job: ExpandTemplateJob) {
    let template_id = job.template_id;

    match expand_template(&ctx, &job).await {
        Ok(paragraph_count) => {
            let _ = ctx
                .run_tracker
                .set_stage(template_id, PipelineStage::TemplateReady);
            ctx.events
                .publish_stage_changed(template_id, PipelineStage::TemplateReady);
            tracing::info!(
                template_id = %template_id,
                paragraphs = paragraph_count,
                "Template skeleton ready"
            );
        }
        Err(error) => {
            tracing::error!(
                template_id = %template_id,
                error = %error,
                "Template expansion failed"
            );
            let _ = ctx.run_tracker.set_failed(template_id, error.to_string());
            ctx.events
                .publish_run_failed(template_id, &error.to_string());
        }
    }
}

async fn expand_template(
    ctx: &StageContext,
    job: &ExpandTemplateJob,
) -> Result<usize, PipelineError> {
    let space_id = job.space_id;
    let template_id = job.template_id;

    // 章节规划
    let schema = chapter_plan_schema();
    let plan: ChapterPlan = ctx
        .config
        .generation_retry
        .run("chapter-plan", || {
            ctx.generate_structured(
                chapter_plan_prompt(&job.spec),
                &ctx.config.models.template,
                ctx.config.draft_normalize_passes,
                &schema,
                space_id,
            )
        })
        .await?;

    if plan.chapters.is_empty() {
        return Err(PipelineError::InvalidDocument(
            "chapter plan contains no chapters".to_string(),
        ));
    }

    let mut total_paragraphs = 0;

    for (chapter_index, seed) in plan.chapters.iter().enumerate() {
        let chapter_id = ctx
            .book_store
            .add_chapter(
                space_id,
                template_id,
                &NewChapter {
                    title: seed.title.clone(),
                    idea: seed.idea.clone(),
                },
            )
            .await?;
        ctx.events
            .publish_chapter_ready(template_id, chapter_id, chapter_index);

        // 本章已创建段落的补偿回滚清单
        let mut rollback = ChapterRollback::new(space_id, template_id, chapter_id);

        match populate_chapter(ctx, &job.spec, space_id, template_id, chapter_id, seed, &mut rollback)
            .await
        {
            Ok(count) => {
                total_paragraphs += count;
                tracing::debug!(
                    template_id = %template_id,
                    chapter_id = %chapter_id,
                    paragraphs = count,
                    "Chapter skeleton populated"
                );
            }
            Err(error) => {
                rollback.compensate(ctx.book_store.as_ref()).await;
                return Err(PipelineError::ChapterFailed {
                    index: chapter_index,
                    title: seed.title.clone(),
                    source: Box::new(error),
                });
            }
        }
    }

    Ok(total_paragraphs)
}

/// 为单个章节规划并落库段落种子
async fn populate_chapter(
    ctx: &StageContext,
    spec: &BookSpec,
    space_id: Uuid,
    template_id: Uuid,
    chapter_id: Uuid,
    seed: &ChapterSeed,
    rollback: &mut ChapterRollback,
) -> Result<usize, PipelineError> {
    let schema = paragraph_plan_schema();
    let plan: ParagraphPlan = ctx
        .config
        .generation_retry
        .run("paragraph-plan", || {
            ctx.generate_structured(
                paragraph_plan_prompt(spec, &seed.title, &seed.idea),
                &ctx.config.models.template,
                ctx.config.draft_normalize_passes,
                &schema,
                space_id,
            )
        })
        .await?;

    for paragraph in &plan.paragraphs {
        let paragraph_id = ctx
            .book_store
            .add_paragraph(
                space_id,
                template_id,
                chapter_id,
                &NewParagraph {
                    text: paragraph.idea.clone(),
                    status: ParagraphStatus::Seed,
                },
            )
            .await?;
        rollback.record(paragraph_id);
    }

    Ok(plan.paragraphs.len())
}

/// 章节级补偿回滚清单
///
/// 显式持有本次运行创建的段落 id；章节失败时逐个删除，
/// 避免模板里留下半成品章节内容。
struct ChapterRollback {
    space_id: Uuid,
    template_id: Uuid,
    chapter_id: Uuid,
    created_paragraphs: Vec<Uuid>,
}

impl ChapterRollback {
    fn new(space_id: Uuid, template_id: Uuid, chapter_id: Uuid) -> Self {
        Self {
            space_id,
            template_id,
            chapter_id,
            created_paragraphs: Vec::new(),
        }
    }

    fn record(&mut self, paragraph_id: Uuid) {
        self.created_paragraphs.push(paragraph_id);
    }

    async fn compensate(&self, store: &dyn BookStorePort) {
        for paragraph_id in &self.created_paragraphs {
            if let Err(error) = store
                .delete_paragraph(self.space_id, self.template_id, self.chapter_id, *paragraph_id)
                .await
            {
                tracing::warn!(
                    paragraph_id = %paragraph_id,
                    error = %error,
                    "Compensating rollback failed for paragraph"
                );
            }
        }
        if !self.created_paragraphs.is_empty() {
            tracing::info!(
                chapter_id = %self.chapter_id,
                rolled_back = self.created_paragraphs.len(),
                "Chapter paragraphs rolled back"
            );
        }
    }
}
