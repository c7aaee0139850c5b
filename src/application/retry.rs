//! 重试策略
//!
//! 有界重试 + 固定间隔。严格模式在次数耗尽后把最后一次错误包进
//! RetryExhausted 上抛；宽松模式退化为 None，由调用阶段决定失败
//! 是否致命。每次失败都会带着尝试序号与原因写入日志。

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// 次数耗尽，携带最后一次错误
#[derive(Debug, Error)]
#[error("all {attempts} attempts failed: {last}")]
pub struct RetryExhausted<E: std::error::Error + 'static> {
    pub attempts: u32,
    #[source]
    pub last: E,
}

/// 重试策略
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// 严格模式：最后一次失败包装为 RetryExhausted 上抛
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, RetryExhausted<E>>
    where
        E: std::error::Error + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < self.max_attempts => {
                    tracing::warn!(
                        label = %label,
                        attempt = attempt,
                        max_attempts = self.max_attempts,
                        error = %error,
                        delay_ms = self.delay.as_millis() as u64,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    tracing::error!(
                        label = %label,
                        attempts = self.max_attempts,
                        error = %error,
                        "All attempts failed"
                    );
                    return Err(RetryExhausted {
                        attempts: self.max_attempts,
                        last: error,
                    });
                }
            }
        }
    }

    /// 宽松模式：次数耗尽退化为 None，继续处理后续任务
    pub async fn run_lenient<T, E, F, Fut>(&self, label: &str, op: F) -> Option<T>
    where
        E: std::error::Error + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(label, op).await.ok()
    }
}
