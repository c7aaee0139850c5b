//! Bounded Scheduler - 有界并发调度器
//!
//! 任务入队后由派发循环按 FIFO 顺序准入，同时在跑的任务数以
//! Semaphore 封顶。任务完成（成功、失败、panic）都会释放名额并
//! 递减未完成计数；`on_idle` 基于 watch 通道等待计数归零，
//! wait_for 先检查当前值再挂起，不存在错过唤醒的窗口。

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Semaphore};

type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// 有界并发调度器
///
/// 不变量:
/// - 同时在跑的任务数不超过 capacity
/// - 任务完成无条件释放名额（Drop guard，panic 也不例外）
/// - 单个任务的失败不会停住派发循环或影响其它任务
pub struct BoundedScheduler {
    task_sender: mpsc::UnboundedSender<BoxedTask>,
    pending_tx: watch::Sender<usize>,
    pending_rx: watch::Receiver<usize>,
}

impl BoundedScheduler {
    /// 创建调度器并启动派发循环
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<BoxedTask>();
        let (pending_tx, pending_rx) = watch::channel(0usize);

        let semaphore = Arc::new(Semaphore::new(capacity));
        let completion_tx = pending_tx.clone();

        tokio::spawn(async move {
            // FIFO 准入：先到先拿名额，名额满时在此等待
            while let Some(task) = task_receiver.recv().await {
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };

                let completion = CompletionGuard(completion_tx.clone());
                tokio::spawn(async move {
                    let _permit = permit;
                    let _completion = completion;
                    task.await;
                });
            }
        });

        Self {
            task_sender,
            pending_tx,
            pending_rx,
        }
    }

    /// 入队一个任务
    ///
    /// 任务自身负责兜住内部错误；调度器只关心它何时结束。
    pub fn push<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pending_tx.send_modify(|n| *n += 1);

        if self.task_sender.send(Box::pin(task)).is_err() {
            // 派发循环已退出，任务不会执行
            tracing::error!("Scheduler dispatch loop gone, task dropped");
            self.pending_tx.send_modify(|n| *n = n.saturating_sub(1));
        }
    }

    /// 当前未完成任务数（排队 + 在跑）
    pub fn pending(&self) -> usize {
        *self.pending_rx.borrow()
    }

    /// 等待队列与在跑任务全部清空
    pub async fn on_idle(&self) {
        let mut rx = self.pending_rx.clone();
        // wait_for 先检查当前值：与最后一个任务的完成并发调用也不会漏唤醒
        let _ = rx.wait_for(|pending| *pending == 0).await;
    }
}

/// 任务完成守卫：Drop 时递减未完成计数并唤醒等待者
struct CompletionGuard(watch::Sender<usize>);

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_running_count_never_exceeds_capacity() {
        let scheduler = BoundedScheduler::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let max_running = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let running = running.clone();
            let max_running = max_running.clone();
            let completed = completed.clone();
            scheduler.push(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                max_running.fetch_max(now, Ordering::SeqCst);
                // 挂起，制造并发窗口
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                completed.fetch_add(1, Ordering::SeqCst);
            });
        }

        scheduler.on_idle().await;

        assert_eq!(completed.load(Ordering::SeqCst), 5);
        assert!(max_running.load(Ordering::SeqCst) <= 2);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn test_on_idle_with_no_tasks_resolves_immediately() {
        let scheduler = BoundedScheduler::new(4);
        scheduler.on_idle().await;
    }

    #[tokio::test]
    async fn test_on_idle_racing_last_completion() {
        let scheduler = Arc::new(BoundedScheduler::new(1));

        for _ in 0..50 {
            scheduler.push(async {
                tokio::task::yield_now().await;
            });

            // 与最后一个任务的完成并发等待，不得漏唤醒
            let waiter = {
                let scheduler = scheduler.clone();
                tokio::spawn(async move { scheduler.on_idle().await })
            };
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("on_idle missed the wakeup")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_panicking_task_releases_slot() {
        let scheduler = BoundedScheduler::new(1);
        let completed = Arc::new(AtomicUsize::new(0));

        scheduler.push(async {
            panic!("task blew up");
        });
        for _ in 0..3 {
            let completed = completed.clone();
            scheduler.push(async move {
                completed.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::timeout(Duration::from_secs(1), scheduler.on_idle())
            .await
            .expect("panicking task blocked the scheduler");
        assert_eq!(completed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fifo_admission_order() {
        // capacity 1 时任务串行执行，完成顺序即入队顺序
        let scheduler = BoundedScheduler::new(1);
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        for i in 0..4 {
            let order = order.clone();
            scheduler.push(async move {
                order.lock().unwrap().push(i);
            });
        }

        scheduler.on_idle().await;
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }
}
