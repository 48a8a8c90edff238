//! 批处理厂商抽象
//!
//! 流程层只依赖 `BatchProvider`，不知道具体是哪家的接口。

pub mod anthropic;

pub use anthropic::AnthropicProvider;

use crate::config::Config;
use crate::error::{BatchError, ConfigError};
use crate::models::{BatchJob, OutcomeSet, Prompt};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 批处理能力
#[async_trait]
pub trait BatchProvider: Send + Sync {
    /// 厂商名称，用于日志
    fn name(&self) -> &str;

    /// 提交一批提示词，恰好一次网络调用，不重试
    async fn submit(&self, prompts: &[Prompt]) -> Result<BatchJob, BatchError>;

    /// 查询一次状态
    async fn query_status(&self, batch_id: &str) -> Result<BatchJob, BatchError>;

    /// 轮询直到 `ended`，或返回失败/取消
    async fn poll(&self, job: &BatchJob, cancel: &CancellationToken) -> Result<BatchJob, BatchError>;

    /// 读取并分类已结束批处理的全部结果
    async fn fetch_results(&self, job: &BatchJob) -> Result<OutcomeSet, BatchError>;
}

/// 根据配置创建 provider
pub fn create_provider(config: &Config) -> Result<Arc<dyn BatchProvider>, ConfigError> {
    match config.provider.to_ascii_lowercase().as_str() {
        "anthropic" => Ok(Arc::new(AnthropicProvider::from_config(config)?)),
        other => Err(ConfigError::UnknownProvider(other.to_string())),
    }
}
