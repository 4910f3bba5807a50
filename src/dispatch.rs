//! 任务分发
//!
//! 每个候选标签生成一个带重试的探测任务，同时运行的任务数不超过 `concurrency`。
//! 任务完成后通过通道把结果交给唯一的消费者（聚合器），任务之间没有共享的可变状态。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use log::{debug, error};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

use crate::config::MAX_CONCURRENCY;
use crate::probe::{candidate_name, Probe, ProbeOutcome};
use crate::retry::RetryPolicy;

/// 单个候选域名的完成结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// 完整候选域名
    pub name: String,
    /// 重试结束后的最终结果
    pub outcome: ProbeOutcome,
    /// 实际查询次数，任务崩溃时为 0
    pub attempts: u32,
}

/// 分发器发给聚合器的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchMessage {
    /// 一个任务完成
    Completed(Completion),
    /// 全部任务已提交，之后只剩在途任务
    AllSubmitted {
        /// 已提交的任务数
        submitted: usize,
    },
}

/// 任务分发器
#[derive(Clone)]
pub struct Dispatcher {
    probe: Arc<dyn Probe>,
    policy: RetryPolicy,
    concurrency: usize,
}

impl Dispatcher {
    /// `concurrency` 会被限制在 `1..=MAX_CONCURRENCY`
    pub fn new(probe: Arc<dyn Probe>, policy: RetryPolicy, concurrency: usize) -> Self {
        Dispatcher {
            probe,
            policy,
            concurrency: concurrency.clamp(1, MAX_CONCURRENCY),
        }
    }

    /// 同时运行的任务上限
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// 每个任务使用的重试策略
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// 开始分发一个域名的全部任务，立即返回完成结果的接收端
    pub fn dispatch(&self, domain: &str, labels: Arc<[String]>) -> DispatchHandle {
        let (tx, rx) = mpsc::channel(self.concurrency);
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let probe = self.probe.clone();
        let policy = self.policy;
        let domain = domain.to_string();

        let task = tokio::spawn(async move {
            let mut workers = JoinSet::new();
            let mut submitted = 0usize;

            for label in labels.iter() {
                // 先拿许可再启动任务，保证在途任务不超过上限
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let name = candidate_name(label, &domain);
                let probe = probe.clone();
                let tx = tx.clone();

                workers.spawn(async move {
                    let completion = run_task(probe.as_ref(), policy, name).await;
                    drop(permit);
                    // 接收端已关闭说明扫描被中断，结果直接丢弃
                    let _ = tx.send(DispatchMessage::Completed(completion)).await;
                });
                submitted += 1;
            }

            debug!("{} 已提交 {} 个任务", domain, submitted);
            let _ = tx.send(DispatchMessage::AllSubmitted { submitted }).await;
            drop(tx);

            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    if !e.is_cancelled() {
                        error!("{} 的任务异常退出: {}", domain, e);
                    }
                }
            }
        });

        DispatchHandle { rx, task }
    }
}

/// 执行单个任务，探测过程中的 panic 也转成一个 `Error` 结果
async fn run_task(probe: &dyn Probe, policy: RetryPolicy, name: String) -> Completion {
    match AssertUnwindSafe(policy.run(probe, &name)).catch_unwind().await {
        Ok(result) => Completion {
            name,
            outcome: result.outcome,
            attempts: result.attempts,
        },
        Err(payload) => {
            let cause = panic_message(payload.as_ref());
            error!("{} 任务异常: {}", name, cause);
            Completion {
                name,
                outcome: ProbeOutcome::Error(format!("task panicked: {}", cause)),
                attempts: 0,
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// 一次分发的句柄。丢弃时中止所有在途任务
pub struct DispatchHandle {
    rx: mpsc::Receiver<DispatchMessage>,
    task: JoinHandle<()>,
}

impl DispatchHandle {
    /// 接收下一条消息，所有任务结束后返回 `None`
    pub async fn recv(&mut self) -> Option<DispatchMessage> {
        self.rx.recv().await
    }

    /// 中止分发和所有在途任务
    pub fn abort(&self) {
        self.task.abort();
    }
}

impl Drop for DispatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
