//! 批处理流程 - 流程层
//!
//! 核心职责：定义"一个批处理"的完整生命周期
//!
//! 流程顺序：
//! 1. submit：提交提示词，得到批处理 id
//! 2. poll：等待批处理结束
//! 3. fetch_results：读取并分类结果
//!
//! 任一阶段失败立即返回，并标明阶段；不返回部分结果。
//! 三个阶段都与取消信号竞争，取消后立即返回 `Cancelled`。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{BatchError, OrchestrationError};
use crate::models::{BatchJob, OutcomeSet, Prompt, Reconciliation};
use crate::providers::BatchProvider;
use crate::utils::logging;
use crate::workflow::Stage;

/// 一次完整流程的产出
#[derive(Debug)]
pub struct BatchRun {
    /// 已结束的批处理
    pub job: BatchJob,
    pub outcomes: OutcomeSet,
    /// 与提交的 id 对账；`resume` 时不知道提交了哪些 id，为 `None`
    pub reconciliation: Option<Reconciliation>,
}

/// 批处理流程
///
/// - 只依赖 `BatchProvider` 能力，不关心厂商
/// - 不持有结果，不写文件
pub struct BatchFlow {
    provider: Arc<dyn BatchProvider>,
    poll_timeout: Option<Duration>,
}

impl BatchFlow {
    pub fn new(provider: Arc<dyn BatchProvider>) -> Self {
        Self {
            provider,
            poll_timeout: None,
        }
    }

    /// 轮询阶段的总等待上限
    pub fn with_poll_timeout(mut self, poll_timeout: Option<Duration>) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    pub fn provider(&self) -> &Arc<dyn BatchProvider> {
        &self.provider
    }

    /// submit → poll → fetch_results
    pub async fn run(
        &self,
        prompts: &[Prompt],
        cancel: &CancellationToken,
    ) -> Result<BatchRun, OrchestrationError> {
        info!(
            "🚀 [{}] 提交 {} 条提示词",
            self.provider.name(),
            prompts.len()
        );

        let job = until_cancelled(cancel, self.provider.submit(prompts), || {
            BatchError::SubmitCancelled
        })
        .await
        .map_err(|e| fail(Stage::Submit, e))?;
        logging::log_batch_submitted(&job.id, prompts.len());

        let mut run = self.poll_and_fetch(&job, cancel).await?;

        let reconciliation = run
            .outcomes
            .reconcile(prompts.iter().map(|p| p.id.as_str()));
        log_reconciliation(&run.job.id, &reconciliation);
        run.reconciliation = Some(reconciliation);

        Ok(run)
    }

    /// 对已存在的批处理执行 poll → fetch_results
    pub async fn resume(
        &self,
        batch_id: &str,
        cancel: &CancellationToken,
    ) -> Result<BatchRun, OrchestrationError> {
        info!("🔁 [{}] 继续批处理 {}", self.provider.name(), batch_id);
        self.poll_and_fetch(&BatchJob::pending(batch_id), cancel)
            .await
    }

    async fn poll_and_fetch(
        &self,
        job: &BatchJob,
        cancel: &CancellationToken,
    ) -> Result<BatchRun, OrchestrationError> {
        let ended = self
            .poll_with_deadline(job, cancel)
            .await
            .map_err(|e| fail(Stage::Poll, e))?;

        info!("📥 [{}] 读取批处理 {} 的结果", self.provider.name(), ended.id);
        let outcomes = until_cancelled(cancel, self.provider.fetch_results(&ended), || {
            BatchError::Cancelled {
                batch_id: ended.id.clone(),
            }
        })
        .await
        .map_err(|e| fail(Stage::FetchResults, e))?;

        Ok(BatchRun {
            job: ended,
            outcomes,
            reconciliation: None,
        })
    }

    async fn poll_with_deadline(
        &self,
        job: &BatchJob,
        cancel: &CancellationToken,
    ) -> Result<BatchJob, BatchError> {
        let cancelled = || BatchError::Cancelled {
            batch_id: job.id.clone(),
        };
        let poll = until_cancelled(cancel, self.provider.poll(job, cancel), cancelled);
        let Some(deadline) = self.poll_timeout else {
            return poll.await;
        };

        match tokio::time::timeout(deadline, poll).await {
            Ok(result) => result,
            Err(_) => Err(BatchError::DeadlineExceeded {
                batch_id: job.id.clone(),
                waited: deadline,
            }),
        }
    }
}

/// 让一次 provider 调用与取消信号竞争，已取消时不会开始调用
async fn until_cancelled<T, F>(
    cancel: &CancellationToken,
    call: F,
    on_cancel: impl FnOnce() -> BatchError,
) -> Result<T, BatchError>
where
    F: Future<Output = Result<T, BatchError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            warn!("⚠️ 收到取消信号，停止等待 provider");
            Err(on_cancel())
        }
        result = call => result,
    }
}

fn fail(stage: Stage, source: BatchError) -> OrchestrationError {
    let err = OrchestrationError::new(stage, source);
    error!("❌ 批处理流程在 {} 阶段失败: {}", stage, err.source);
    err
}

fn log_reconciliation(batch_id: &str, reconciliation: &Reconciliation) {
    if !reconciliation.missing.is_empty() {
        warn!(
            "⚠️ 批处理 {} 有 {} 条提示词没有返回结果: {:?}",
            batch_id,
            reconciliation.missing.len(),
            reconciliation.missing
        );
    }
    if !reconciliation.unexpected.is_empty() {
        warn!(
            "⚠️ 批处理 {} 返回了 {} 条未提交的结果: {:?}",
            batch_id,
            reconciliation.unexpected.len(),
            reconciliation.unexpected
        );
    }
}
