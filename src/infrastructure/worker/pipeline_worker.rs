//! Pipeline Worker - 流水线阶段消费者
//!
//! 从阶段队列消费作业并执行对应阶段。每个作业作为独立任务运行：
//! 一个阶段内部的失败只影响它自己的文档，不会停住队列。

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::application::normalizer::JsonNormalizer;
use crate::application::ports::{
    BookStorePort, LlmEnginePort, RunTrackerPort, StageJob, StageQueuePort,
};
use crate::infrastructure::events::EventPublisher;

use super::{draft_stage, refine_stage, template_stage, PipelineWorkerConfig, StageContext};

/// 流水线 Worker
pub struct PipelineWorker {
    queue_receiver: mpsc::Receiver<StageJob>,
    context: Arc<StageContext>,
}

impl PipelineWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: PipelineWorkerConfig,
        queue_receiver: mpsc::Receiver<StageJob>,
        book_store: Arc<dyn BookStorePort>,
        llm_engine: Arc<dyn LlmEnginePort>,
        run_tracker: Arc<dyn RunTrackerPort>,
        stage_queue: Arc<dyn StageQueuePort>,
        event_publisher: Arc<EventPublisher>,
    ) -> Self {
        let normalizer = JsonNormalizer::new(llm_engine.clone(), config.models.repair.clone());
        let context = Arc::new(StageContext {
            config,
            book_store,
            llm_engine,
            normalizer,
            run_tracker,
            stage_queue,
            events: event_publisher,
        });

        Self {
            queue_receiver,
            context,
        }
    }

    /// 启动 Worker
    pub async fn run(mut self) {
        tracing::info!(
            max_concurrent = self.context.config.max_concurrent,
            "PipelineWorker started"
        );

        while let Some(job) = self.queue_receiver.recv().await {
            tracing::info!(
                kind = job.kind(),
                document_id = %job.document_id(),
                "Stage job received"
            );

            // 阶段作业彼此独立，各自 spawn
            let context = self.context.clone();
            tokio::spawn(async move {
                match job {
                    StageJob::ExpandTemplate(job) => template_stage::run(context, job).await,
                    StageJob::DraftBook(job) => draft_stage::run(context, job).await,
                    StageJob::RefineBook(job) => refine_stage::run(context, job).await,
                    StageJob::ExpandParagraph(job) => draft_stage::run_expand(context, job).await,
                }
            });
        }

        tracing::info!("PipelineWorker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use uuid::Uuid;

    use crate::application::ports::{
        BookRecord, BookTree, DraftBookJob, ExpandTemplateJob, NewBook, NewChapter, NewParagraph,
        ParagraphUpdate, PipelineStage, RepositoryError,
    };
    use crate::application::retry::RetryPolicy;
    use crate::domain::book::{BookSpec, ParagraphStatus};
    use crate::infrastructure::adapters::FakeLlmClient;
    use crate::infrastructure::memory::{ChannelStageQueue, InMemoryRunTracker};
    use crate::infrastructure::persistence::sqlite::{
        create_pool, run_migrations, DatabaseConfig, SqliteBookStore,
    };
    use crate::infrastructure::worker::StageModels;

    const WAIT_TIMEOUT: Duration = Duration::from_secs(10);
    const POLL_INTERVAL: Duration = Duration::from_millis(10);

    struct Harness {
        store: Arc<dyn BookStorePort>,
        queue: Arc<ChannelStageQueue>,
        tracker: Arc<InMemoryRunTracker>,
        space_id: Uuid,
    }

    fn fast_config() -> PipelineWorkerConfig {
        PipelineWorkerConfig {
            max_concurrent: 2,
            generation_retry: RetryPolicy::new(3, Duration::from_millis(1)),
            refinement_retry: RetryPolicy::new(3, Duration::from_millis(1)),
            draft_normalize_passes: 5,
            refine_normalize_passes: 3,
            models: StageModels::default(),
        }
    }

    async fn start_worker(
        llm: Arc<dyn LlmEnginePort>,
        store: Arc<dyn BookStorePort>,
    ) -> Harness {
        let (tx, rx) = mpsc::channel(64);
        let queue = Arc::new(ChannelStageQueue::new(tx));
        let tracker = InMemoryRunTracker::new().arc();
        let events = EventPublisher::new().arc();

        let worker = PipelineWorker::new(
            fast_config(),
            rx,
            store.clone(),
            llm,
            tracker.clone(),
            queue.clone(),
            events,
        );
        tokio::spawn(worker.run());

        Harness {
            store,
            queue,
            tracker,
            space_id: Uuid::new_v4(),
        }
    }

    async fn sqlite_store() -> Arc<SqliteBookStore> {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        Arc::new(SqliteBookStore::new(pool))
    }

    fn spec() -> BookSpec {
        BookSpec::new("Pipelines", "A book about resilient pipelines", "Keep it concrete")
    }

    /// 在存储里手工搭一个 2 章 x 2 种子段落的模板
    async fn seed_template(store: &dyn BookStorePort, space_id: Uuid) -> Uuid {
        let template_id = store
            .create_book(
                space_id,
                &NewBook {
                    title: "template_Pipelines".to_string(),
                    abstract_text: spec().to_abstract_json().unwrap(),
                },
            )
            .await
            .unwrap();

        for c in 0..2 {
            let chapter_id = store
                .add_chapter(
                    space_id,
                    template_id,
                    &NewChapter {
                        title: format!("Chapter {}", c),
                        idea: format!("chapter idea {}", c),
                    },
                )
                .await
                .unwrap();
            for p in 0..2 {
                store
                    .add_paragraph(
                        space_id,
                        template_id,
                        chapter_id,
                        &NewParagraph {
                            text: format!("seed idea {}-{}", c, p),
                            status: ParagraphStatus::Seed,
                        },
                    )
                    .await
                    .unwrap();
            }
        }

        template_id
    }

    async fn wait_until<F>(check: F) -> bool
    where
        F: Fn() -> std::pin::Pin<Box<dyn std::future::Future<Output = bool> + Send>>,
    {
        let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
        while tokio::time::Instant::now() < deadline {
            if check().await {
                return true;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        false
    }

    fn paragraph_statuses(tree: &BookTree) -> Vec<ParagraphStatus> {
        tree.chapters
            .iter()
            .flat_map(|c| c.paragraphs.iter().map(|p| p.status))
            .collect()
    }

    /// 端到端：2 章 x 2 段模板 -> 初稿 -> 润色，强制一个段落生成失败。
    /// 失败段落落下占位文本，其余 3 段到达 Refined。
    #[tokio::test]
    async fn test_draft_and_refine_with_one_forced_failure() {
        let llm = Arc::new(FakeLlmClient::with_handler(|request| {
            let prompt = request.prompt.as_str();
            if prompt.contains("write a comprehensive and detailed paragraph") {
                if prompt.contains("seed idea 0-1") {
                    // 强制该段落每次尝试都失败
                    return Err(crate::application::ports::LlmError::ServiceError(
                        "forced generation failure".to_string(),
                    ));
                }
                // 围栏包裹的响应，顺带走一遍句法修复
                return Ok("```json\n{\"text\":\"drafted body\"}\n```".to_string());
            }
            if prompt.contains("refactor the current paragraph") {
                return Ok(r#"{"text":"refined body"}"#.to_string());
            }
            Err(crate::application::ports::LlmError::ServiceError(format!(
                "unexpected prompt: {}",
                &prompt[..prompt.len().min(80)]
            )))
        }));

        let store = sqlite_store().await;
        let harness = start_worker(llm, store.clone()).await;
        let space_id = harness.space_id;

        let template_id = seed_template(harness.store.as_ref(), space_id).await;
        let book_id = harness
            .store
            .create_book(
                space_id,
                &NewBook {
                    title: "book_Pipelines".to_string(),
                    abstract_text: spec().to_abstract_json().unwrap(),
                },
            )
            .await
            .unwrap();

        harness
            .tracker
            .begin(book_id, PipelineStage::ChaptersExpanding);

        harness
            .queue
            .submit(StageJob::DraftBook(DraftBookJob {
                space_id,
                template_id,
                book_id,
                spec: spec(),
            }))
            .unwrap();

        // 等待润色扫尾结束
        let tracker = harness.tracker.clone();
        let done = wait_until(move || {
            let tracker = tracker.clone();
            Box::pin(async move {
                tracker.get_stage(book_id) == Some(PipelineStage::RefinementComplete)
            })
        })
        .await;
        assert!(done, "pipeline did not reach RefinementComplete in time");

        let tree = harness
            .store
            .get_book(space_id, book_id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(tree.chapters.len(), 2);
        let statuses = paragraph_statuses(&tree);
        assert_eq!(statuses.len(), 4);
        assert_eq!(
            statuses
                .iter()
                .filter(|s| **s == ParagraphStatus::Refined)
                .count(),
            3
        );
        assert_eq!(
            statuses
                .iter()
                .filter(|s| **s == ParagraphStatus::Failed)
                .count(),
            1
        );

        for chapter in &tree.chapters {
            for paragraph in &chapter.paragraphs {
                // 每个段落都离开了种子文本
                assert!(!paragraph.text.starts_with("seed idea"));
                match paragraph.status {
                    ParagraphStatus::Refined => assert_eq!(paragraph.text, "refined body"),
                    ParagraphStatus::Failed => {
                        assert!(paragraph.text.starts_with("Error generating paragraph:"))
                    }
                    other => panic!("unexpected terminal status: {:?}", other),
                }
            }
        }

        // 失败的是 chapter 0 的第 2 段
        let failed = &tree.chapters[0].paragraphs[1];
        assert_eq!(failed.status, ParagraphStatus::Failed);
    }

    /// 模板阶段端到端：规划 2 章、每章 2 个种子段落
    #[tokio::test]
    async fn test_template_expansion() {
        let llm = Arc::new(FakeLlmClient::with_handler(|request| {
            let prompt = request.prompt.as_str();
            if prompt.contains("book schema template") {
                return Ok(r#"{"chapters":[{"title":"One","idea":"first"},{"title":"Two","idea":"second"}]}"#.to_string());
            }
            if prompt.contains("list of paragraphs") {
                return Ok(
                    r#"{"paragraphs":[{"idea":"idea a"},{"idea":"idea b"}]}"#.to_string(),
                );
            }
            Err(crate::application::ports::LlmError::ServiceError(
                "unexpected prompt".to_string(),
            ))
        }));

        let store = sqlite_store().await;
        let harness = start_worker(llm, store.clone()).await;
        let space_id = harness.space_id;

        let template_id = harness
            .store
            .create_book(
                space_id,
                &NewBook {
                    title: "template_Pipelines".to_string(),
                    abstract_text: spec().to_abstract_json().unwrap(),
                },
            )
            .await
            .unwrap();
        harness
            .tracker
            .begin(template_id, PipelineStage::TemplateRequested);

        harness
            .queue
            .submit(StageJob::ExpandTemplate(ExpandTemplateJob {
                space_id,
                template_id,
                spec: spec(),
            }))
            .unwrap();

        let tracker = harness.tracker.clone();
        let done = wait_until(move || {
            let tracker = tracker.clone();
            Box::pin(async move {
                tracker.get_stage(template_id) == Some(PipelineStage::TemplateReady)
            })
        })
        .await;
        assert!(done, "template expansion did not finish in time");

        let tree = harness
            .store
            .get_book(space_id, template_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tree.chapters.len(), 2);
        assert_eq!(tree.chapters[0].title, "One");
        assert_eq!(tree.chapters[1].title, "Two");
        for chapter in &tree.chapters {
            assert_eq!(chapter.paragraphs.len(), 2);
            assert_eq!(chapter.paragraphs[0].text, "idea a");
            assert_eq!(chapter.paragraphs[1].text, "idea b");
            for paragraph in &chapter.paragraphs {
                assert_eq!(paragraph.status, ParagraphStatus::Seed);
            }
        }
    }

    /// 存储包装器：特定段落文本触发写入失败，用于演练补偿回滚
    struct PoisonedStore {
        inner: Arc<SqliteBookStore>,
        poison: &'static str,
    }

    #[async_trait]
    impl BookStorePort for PoisonedStore {
        async fn create_book(
            &self,
            space_id: Uuid,
            book: &NewBook,
        ) -> Result<Uuid, RepositoryError> {
            self.inner.create_book(space_id, book).await
        }

        async fn add_chapter(
            &self,
            space_id: Uuid,
            book_id: Uuid,
            chapter: &NewChapter,
        ) -> Result<Uuid, RepositoryError> {
            self.inner.add_chapter(space_id, book_id, chapter).await
        }

        async fn add_paragraph(
            &self,
            space_id: Uuid,
            book_id: Uuid,
            chapter_id: Uuid,
            paragraph: &NewParagraph,
        ) -> Result<Uuid, RepositoryError> {
            if paragraph.text == self.poison {
                return Err(RepositoryError::DatabaseError(
                    "injected write failure".to_string(),
                ));
            }
            self.inner
                .add_paragraph(space_id, book_id, chapter_id, paragraph)
                .await
        }

        async fn update_paragraph(
            &self,
            space_id: Uuid,
            book_id: Uuid,
            chapter_id: Uuid,
            paragraph_id: Uuid,
            update: &ParagraphUpdate,
        ) -> Result<(), RepositoryError> {
            self.inner
                .update_paragraph(space_id, book_id, chapter_id, paragraph_id, update)
                .await
        }

        async fn get_book(
            &self,
            space_id: Uuid,
            book_id: Uuid,
        ) -> Result<Option<BookTree>, RepositoryError> {
            self.inner.get_book(space_id, book_id).await
        }

        async fn list_books(&self, space_id: Uuid) -> Result<Vec<BookRecord>, RepositoryError> {
            self.inner.list_books(space_id).await
        }

        async fn delete_paragraph(
            &self,
            space_id: Uuid,
            book_id: Uuid,
            chapter_id: Uuid,
            paragraph_id: Uuid,
        ) -> Result<(), RepositoryError> {
            self.inner
                .delete_paragraph(space_id, book_id, chapter_id, paragraph_id)
                .await
        }

        async fn delete_book(&self, space_id: Uuid, book_id: Uuid) -> Result<(), RepositoryError> {
            self.inner.delete_book(space_id, book_id).await
        }
    }

    /// 章节层失败：已创建段落被补偿回滚，运行 Failed 且错误携带章节定位
    #[tokio::test]
    async fn test_template_chapter_failure_rolls_back_created_paragraphs() {
        let llm = Arc::new(FakeLlmClient::with_handler(|request| {
            let prompt = request.prompt.as_str();
            if prompt.contains("book schema template") {
                return Ok(
                    r#"{"chapters":[{"title":"Sound","idea":"fine"},{"title":"Doomed","idea":"cursed"}]}"#
                        .to_string(),
                );
            }
            if prompt.contains("list of paragraphs") {
                if prompt.contains("Doomed") {
                    return Ok(
                        r#"{"paragraphs":[{"idea":"kept seed"},{"idea":"poison seed"}]}"#
                            .to_string(),
                    );
                }
                return Ok(r#"{"paragraphs":[{"idea":"plain seed"}]}"#.to_string());
            }
            Err(crate::application::ports::LlmError::ServiceError(
                "unexpected prompt".to_string(),
            ))
        }));

        let sqlite = sqlite_store().await;
        let store: Arc<dyn BookStorePort> = Arc::new(PoisonedStore {
            inner: sqlite,
            poison: "poison seed",
        });
        let harness = start_worker(llm, store).await;
        let space_id = harness.space_id;

        let template_id = harness
            .store
            .create_book(
                space_id,
                &NewBook {
                    title: "template_Pipelines".to_string(),
                    abstract_text: spec().to_abstract_json().unwrap(),
                },
            )
            .await
            .unwrap();
        harness
            .tracker
            .begin(template_id, PipelineStage::TemplateRequested);

        harness
            .queue
            .submit(StageJob::ExpandTemplate(ExpandTemplateJob {
                space_id,
                template_id,
                spec: spec(),
            }))
            .unwrap();

        let tracker = harness.tracker.clone();
        let done = wait_until(move || {
            let tracker = tracker.clone();
            Box::pin(
                async move { tracker.get_stage(template_id) == Some(PipelineStage::Failed) },
            )
        })
        .await;
        assert!(done, "template run did not fail in time");

        // 错误信息携带章节定位
        let run = harness.tracker.get_run(template_id).unwrap();
        let message = run.error_message.unwrap();
        assert!(message.contains("Doomed"), "got: {}", message);

        // Doomed 章节里先创建的 "kept seed" 已被回滚
        let tree = harness
            .store
            .get_book(space_id, template_id)
            .await
            .unwrap()
            .unwrap();
        let doomed = tree
            .chapters
            .iter()
            .find(|c| c.title == "Doomed")
            .unwrap();
        assert!(doomed.paragraphs.is_empty());

        // 健康章节不受影响
        let sound = tree.chapters.iter().find(|c| c.title == "Sound").unwrap();
        assert_eq!(sound.paragraphs.len(), 1);
    }

    /// 单段章节走无邻居模板，多段章节末段走仅前文模板
    #[tokio::test]
    async fn test_refinement_neighbor_prompts_observed_by_llm() {
        use std::sync::Mutex as StdMutex;

        let prompts: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
        let prompts_in_handler = prompts.clone();

        let llm = Arc::new(FakeLlmClient::with_handler(move |request| {
            let prompt = request.prompt.clone();
            if prompt.contains("refactor the current paragraph") {
                prompts_in_handler.lock().unwrap().push(prompt);
                return Ok(r#"{"text":"refined"}"#.to_string());
            }
            Err(crate::application::ports::LlmError::ServiceError(
                "unexpected prompt".to_string(),
            ))
        }));

        let store = sqlite_store().await;
        let harness = start_worker(llm, store.clone()).await;
        let space_id = harness.space_id;

        // 一本已有初稿的书：单章 3 段
        let book_id = harness
            .store
            .create_book(
                space_id,
                &NewBook {
                    title: "book_Pipelines".to_string(),
                    abstract_text: spec().to_abstract_json().unwrap(),
                },
            )
            .await
            .unwrap();
        let chapter_id = harness
            .store
            .add_chapter(
                space_id,
                book_id,
                &NewChapter {
                    title: "Only".to_string(),
                    idea: "idea".to_string(),
                },
            )
            .await
            .unwrap();
        for text in ["body P0", "body P1", "body P2"] {
            harness
                .store
                .add_paragraph(
                    space_id,
                    book_id,
                    chapter_id,
                    &NewParagraph {
                        text: text.to_string(),
                        status: ParagraphStatus::Generated,
                    },
                )
                .await
                .unwrap();
        }

        harness.tracker.begin(book_id, PipelineStage::Refining);
        harness
            .queue
            .submit(StageJob::RefineBook(crate::application::ports::RefineBookJob {
                space_id,
                book_id,
            }))
            .unwrap();

        let tracker = harness.tracker.clone();
        let done = wait_until(move || {
            let tracker = tracker.clone();
            Box::pin(async move {
                tracker.get_stage(book_id) == Some(PipelineStage::RefinementComplete)
            })
        })
        .await;
        assert!(done, "refinement did not finish in time");

        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 3);

        // P0: 无邻居
        assert!(!prompts[0].contains("**Previous Paragraph**"));
        assert!(!prompts[0].contains("**Next Paragraph**"));
        assert!(prompts[0].contains("body P0"));

        // P1: 前后文，且前文已是润色后的文本
        assert!(prompts[1].contains("**Previous Paragraph**"));
        assert!(prompts[1].contains("**Next Paragraph**"));
        assert!(prompts[1].contains("\"refined\""));
        assert!(prompts[1].contains("body P2"));

        // P2: 仅前文
        assert!(prompts[2].contains("**Previous Paragraph**"));
        assert!(!prompts[2].contains("**Next Paragraph**"));
    }
}
