#![allow(dead_code)]

//! 集成测试共用的假 provider 和本地 HTTP 服务器

pub mod mock_server;

use async_trait::async_trait;
use futures::stream;
use plan_batch::clients::anthropic_types::parse_result_line;
use plan_batch::error::{ApiError, BatchError};
use plan_batch::models::{BatchJob, BatchStatus, OutcomeSet, Prompt};
use plan_batch::providers::BatchProvider;
use plan_batch::services::{collect_outcomes, BackoffPolicy, BatchPoller};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 按脚本返回状态和结果行的 provider，轮询使用真实的 `BatchPoller`
pub struct ScriptedProvider {
    pub batch_id: String,
    statuses: Mutex<VecDeque<BatchJob>>,
    result_lines: Vec<String>,
    submit_error: Mutex<Option<BatchError>>,
    poller: BatchPoller,
    pub submitted: Mutex<Vec<Prompt>>,
    pub submit_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(batch_id: &str, statuses: Vec<BatchStatus>, result_lines: Vec<String>) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            statuses: Mutex::new(
                statuses
                    .into_iter()
                    .map(|s| BatchJob::with_status(batch_id, s))
                    .collect(),
            ),
            result_lines,
            submit_error: Mutex::new(None),
            poller: BatchPoller::new(default_backoff()),
            submitted: Mutex::new(Vec::new()),
            submit_calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_submit(error: BatchError) -> Self {
        let provider = Self::new("unused", vec![], vec![]);
        *provider.submit_error.lock().unwrap() = Some(error);
        provider
    }

    pub fn with_failure_detail(self, detail: &str) -> Self {
        for job in self.statuses.lock().unwrap().iter_mut() {
            if job.status == BatchStatus::Failed {
                job.error = Some(detail.to_string());
            }
        }
        self
    }

    pub fn queries(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

pub fn default_backoff() -> BackoffPolicy {
    BackoffPolicy::new(Duration::from_secs(10), Duration::from_secs(120), 1.5)
}

#[async_trait]
impl BatchProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn submit(&self, prompts: &[Prompt]) -> Result<BatchJob, BatchError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.submit_error.lock().unwrap().take() {
            return Err(err);
        }
        self.submitted.lock().unwrap().extend_from_slice(prompts);
        Ok(BatchJob::pending(self.batch_id.clone()))
    }

    async fn query_status(&self, batch_id: &str) -> Result<BatchJob, BatchError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| BatchJob::with_status(batch_id, BatchStatus::Processing)))
    }

    async fn poll(&self, job: &BatchJob, cancel: &CancellationToken) -> Result<BatchJob, BatchError> {
        self.poller.poll(self, job, cancel).await
    }

    async fn fetch_results(&self, job: &BatchJob) -> Result<OutcomeSet, BatchError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let records = self
            .result_lines
            .iter()
            .map(|line| Ok::<_, ApiError>(parse_result_line(line)))
            .collect::<Vec<_>>();
        collect_outcomes(&job.id, stream::iter(records)).await
    }
}

/// Anthropic 格式的成功结果行
pub fn succeeded_line(id: &str, text: &str) -> String {
    serde_json::json!({
        "custom_id": id,
        "result": {
            "type": "succeeded",
            "message": {
                "content": [{"type": "text", "text": text}],
                "usage": {"input_tokens": 10, "output_tokens": 20}
            }
        }
    })
    .to_string()
}

/// Anthropic 格式的失败结果行
pub fn errored_line(id: &str, message: &str) -> String {
    serde_json::json!({
        "custom_id": id,
        "result": {
            "type": "errored",
            "error": {"type": "error", "error": {"type": "api_error", "message": message}}
        }
    })
    .to_string()
}
