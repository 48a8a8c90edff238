//! 批处理轮询服务 - 业务能力层
//!
//! 反复查询批处理状态直到终态，两次查询之间按指数退避等待。
//!
//! - 第 n 次等待 = `min(initial * factor^(n-1), max)`
//! - 没有次数上限，也不限制总时长；需要截止时间的调用方在外层包一层超时
//! - 每次查询前、每次等待时都会检查取消信号

use crate::config::Config;
use crate::error::{BatchError, ConfigError};
use crate::models::{BatchJob, BatchStatus};
use crate::providers::BatchProvider;
use crate::services::result_classifier::UNKNOWN_ERROR;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 指数退避参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    initial: Duration,
    max: Duration,
    factor: f64,
}

impl BackoffPolicy {
    /// 参数需事先校验：`initial > 0`，`max >= initial`，`factor > 1`
    pub fn new(initial: Duration, max: Duration, factor: f64) -> Self {
        Self {
            initial,
            max,
            factor,
        }
    }

    /// 秒数无法表示为 `Duration`（负数、NaN、无穷大、过大）时返回配置错误
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(
            secs_to_duration("poll_initial_delay_secs", config.poll_initial_delay_secs)?,
            secs_to_duration("poll_max_delay_secs", config.poll_max_delay_secs)?,
            config.poll_backoff_factor,
        ))
    }

    /// 第 `n` 次等待的时长（从 1 开始计数）
    pub fn delay_for(&self, n: u32) -> Duration {
        self.delays()
            .nth(n.saturating_sub(1) as usize)
            .unwrap_or(self.max)
    }

    /// 无限的等待时长序列
    pub fn delays(&self) -> Backoff {
        Backoff {
            policy: *self,
            next_secs: None,
        }
    }
}

fn secs_to_duration(key: &str, secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("{} 无法转换为时长: {}", secs, e),
    })
}

/// 等待时长序列，单调不减且不超过上限
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    next_secs: Option<f64>,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let max_secs = self.policy.max.as_secs_f64();
        let current = match self.next_secs {
            None => self.policy.initial.as_secs_f64().min(max_secs),
            Some(secs) => secs,
        };

        // 到达上限后不再相乘
        let following = if current >= max_secs {
            max_secs
        } else {
            (current * self.policy.factor).min(max_secs)
        };
        self.next_secs = Some(following);

        Some(Duration::from_secs_f64(current))
    }
}

/// 查询状态出错时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryErrorPolicy {
    /// 直接结束轮询，把错误交给调用方
    #[default]
    Fatal,
    /// 记录警告，按退避继续查询
    Retry,
}

/// 批处理轮询服务
///
/// 职责：
/// - 只依赖 `BatchProvider::query_status`，与厂商无关
/// - 只返回 `ended` 的任务或错误，不会返回处理中的任务
pub struct BatchPoller {
    backoff: BackoffPolicy,
    error_policy: QueryErrorPolicy,
}

impl BatchPoller {
    pub fn new(backoff: BackoffPolicy) -> Self {
        Self {
            backoff,
            error_policy: QueryErrorPolicy::default(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let error_policy = if config.poll_retry_on_error {
            QueryErrorPolicy::Retry
        } else {
            QueryErrorPolicy::Fatal
        };
        Ok(Self::new(BackoffPolicy::from_config(config)?).with_error_policy(error_policy))
    }

    pub fn with_error_policy(mut self, error_policy: QueryErrorPolicy) -> Self {
        self.error_policy = error_policy;
        self
    }

    /// 轮询直到批处理结束
    ///
    /// # 返回
    /// - `Ok(job)`：状态为 `ended`
    /// - `Err(RemoteFailure)`：远端报告失败，立即返回不重试
    /// - `Err(StatusQuery)`：查询出错（`Fatal` 策略下）
    /// - `Err(Cancelled)`：取消信号触发
    pub async fn poll<P>(
        &self,
        provider: &P,
        job: &BatchJob,
        cancel: &CancellationToken,
    ) -> Result<BatchJob, BatchError>
    where
        P: BatchProvider + ?Sized,
    {
        let batch_id = job.id.as_str();
        let mut delays = self.backoff.delays();
        let mut attempt = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(BatchError::Cancelled {
                    batch_id: batch_id.to_string(),
                });
            }

            attempt += 1;
            match provider.query_status(batch_id).await {
                Ok(current) => match current.status {
                    BatchStatus::Ended => {
                        info!("✓ 批处理 {} 已结束 (第 {} 次查询)", batch_id, attempt);
                        return Ok(current);
                    }
                    BatchStatus::Failed => {
                        let detail = current
                            .error
                            .clone()
                            .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
                        error!("❌ 批处理 {} 失败: {}", batch_id, detail);
                        return Err(BatchError::RemoteFailure {
                            batch_id: batch_id.to_string(),
                            detail,
                        });
                    }
                    BatchStatus::Pending | BatchStatus::Processing => match current.request_counts {
                        Some(counts) => {
                            info!("⏳ 批处理 {} 状态: {} ({})", batch_id, current.status, counts)
                        }
                        None => info!("⏳ 批处理 {} 状态: {}", batch_id, current.status),
                    },
                },
                Err(err) => match (self.error_policy, &err) {
                    (QueryErrorPolicy::Retry, BatchError::StatusQuery { .. }) => {
                        warn!("⚠️ 查询批处理 {} 状态出错，稍后重试: {}", batch_id, err);
                    }
                    _ => {
                        error!("❌ 查询批处理 {} 状态出错: {}", batch_id, err);
                        return Err(err);
                    }
                },
            }

            let delay = delays.next().unwrap_or(self.backoff.max);
            debug!("批处理 {} 等待 {:?} 后再次查询", batch_id, delay);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(BatchError::Cancelled {
                        batch_id: batch_id.to_string(),
                    });
                }
                _ = sleep(delay) => {}
            }
        }
    }
}
