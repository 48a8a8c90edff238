use crate::clients::anthropic_types::{parse_result_line, CreateBatchRequest};
use crate::clients::AnthropicClient;
use crate::config::Config;
use crate::error::{ApiError, BatchError, ConfigError};
use crate::models::{BatchJob, OutcomeSet, Prompt};
use crate::providers::BatchProvider;
use crate::services::{collect_outcomes, BatchPoller, BatchSubmitter};
use async_trait::async_trait;
use futures::StreamExt;
use regex::Regex;
use std::sync::OnceLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

fn custom_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("静态正则表达式"))
}

/// Anthropic Message Batches 实现
pub struct AnthropicProvider {
    client: AnthropicClient,
    submitter: BatchSubmitter,
    poller: BatchPoller,
}

impl AnthropicProvider {
    pub fn new(client: AnthropicClient, submitter: BatchSubmitter, poller: BatchPoller) -> Self {
        Self {
            client,
            submitter,
            poller,
        }
    }

    /// 没有 API 密钥时直接失败
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or(ConfigError::MissingApiKey)?;
        let client = AnthropicClient::new(api_key, &config.api_base_url, config.request_timeout())?;

        Ok(Self::new(
            client,
            BatchSubmitter::new(config.model_config()),
            BatchPoller::from_config(config)?,
        ))
    }

    /// 厂商对 `custom_id` 的格式要求
    fn check_custom_ids(prompts: &[Prompt]) -> Result<(), BatchError> {
        match prompts.iter().find(|p| !custom_id_regex().is_match(&p.id)) {
            Some(prompt) => Err(BatchError::InvalidPromptId {
                id: prompt.id.clone(),
                reason: "只能包含字母、数字、'_'、'-'，长度 1-64".to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BatchProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn submit(&self, prompts: &[Prompt]) -> Result<BatchJob, BatchError> {
        let items = self.submitter.build_requests(prompts)?;
        Self::check_custom_ids(prompts)?;

        let request = CreateBatchRequest::from_items(&items);
        let batch = self
            .client
            .create_batch(&request)
            .await
            .map_err(BatchError::Submission)?;

        info!("📤 已提交 {} 条子请求，批处理 id: {}", items.len(), batch.id);
        Ok(BatchJob::pending(batch.id))
    }

    async fn query_status(&self, batch_id: &str) -> Result<BatchJob, BatchError> {
        let to_query_error = |source: ApiError| BatchError::StatusQuery {
            batch_id: batch_id.to_string(),
            source,
        };

        let batch = self
            .client
            .retrieve_batch(batch_id)
            .await
            .map_err(to_query_error)?;
        let endpoint = format!("/v1/messages/batches/{}", batch_id);
        let job = batch.into_job(&endpoint).map_err(to_query_error)?;

        debug!("批处理 {} 当前状态: {}", job.id, job.status);
        Ok(job)
    }

    async fn poll(&self, job: &BatchJob, cancel: &CancellationToken) -> Result<BatchJob, BatchError> {
        self.poller.poll(self, job, cancel).await
    }

    async fn fetch_results(&self, job: &BatchJob) -> Result<OutcomeSet, BatchError> {
        let lines = self
            .client
            .stream_results(&job.id)
            .await
            .map_err(|source| BatchError::ResultFetch {
                batch_id: job.id.clone(),
                source,
            })?;

        let records = lines.map(|line| line.map(parse_result_line));
        collect_outcomes(&job.id, records).await
    }
}
