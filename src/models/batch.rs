use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// 批处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// 刚提交，尚未开始
    Pending,
    /// 远端处理中
    Processing,
    /// 已结束，可以拉取结果
    Ended,
    /// 远端报告整体失败
    Failed,
}

impl BatchStatus {
    /// 是否为终态（`ended` 或 `failed`）
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchStatus::Ended | BatchStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Processing => "processing",
            BatchStatus::Ended => "ended",
            BatchStatus::Failed => "failed",
        }
    }
}

impl Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 远端报告的各类子请求数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCounts {
    #[serde(default)]
    pub processing: u64,
    #[serde(default)]
    pub succeeded: u64,
    #[serde(default)]
    pub errored: u64,
    #[serde(default)]
    pub canceled: u64,
    #[serde(default)]
    pub expired: u64,
}

impl Display for RequestCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "处理中 {} / 成功 {} / 出错 {} / 取消 {} / 过期 {}",
            self.processing, self.succeeded, self.errored, self.canceled, self.expired
        )
    }
}

/// 远端批处理任务的本地快照
///
/// 本地从不修改状态，只会被新一次查询的结果整体替换。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: String,
    pub status: BatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_counts: Option<RequestCounts>,
}

impl BatchJob {
    /// 刚提交成功的任务
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: BatchStatus::Pending,
            error: None,
            request_counts: None,
        }
    }

    pub fn with_status(id: impl Into<String>, status: BatchStatus) -> Self {
        Self {
            status,
            ..Self::pending(id)
        }
    }
}
