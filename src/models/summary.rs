use crate::models::{OutcomeSet, Reconciliation, SkippedRecord, Usage};
use chrono::{DateTime, Local};
use serde::Serialize;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 一次运行的汇总，写入 `summary.json`
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub batch_id: String,
    pub model: String,
    pub started_at: String,
    pub finished_at: String,
    /// 本次提交的提示词数量；`resume` 时未知
    pub submitted: Option<usize>,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: Vec<SkippedRecord>,
    pub missing: Vec<String>,
    pub unexpected: Vec<String>,
    pub usage: Usage,
}

impl RunSummary {
    pub fn new(
        batch_id: impl Into<String>,
        model: impl Into<String>,
        started_at: DateTime<Local>,
        submitted: Option<usize>,
        outcomes: &OutcomeSet,
        reconciliation: Option<&Reconciliation>,
    ) -> Self {
        let (missing, unexpected) = reconciliation
            .map(|r| (r.missing.clone(), r.unexpected.clone()))
            .unwrap_or_default();

        Self {
            batch_id: batch_id.into(),
            model: model.into(),
            started_at: started_at.format(TIME_FORMAT).to_string(),
            finished_at: Local::now().format(TIME_FORMAT).to_string(),
            submitted,
            succeeded: outcomes.succeeded().len(),
            failed: outcomes.failed().len(),
            skipped: outcomes.skipped().to_vec(),
            missing,
            unexpected,
            usage: outcomes.total_usage(),
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}
