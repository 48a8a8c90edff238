use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// token 用量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
    }
}

/// 单条结果的分类
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded { text: String, usage: Usage },
    Failed { error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Succeeded,
    Failed,
}

/// 一条提示词对应的最终结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub id: String,
    pub outcome: Outcome,
}

impl ItemOutcome {
    pub fn succeeded(id: impl Into<String>, text: impl Into<String>, usage: Usage) -> Self {
        Self {
            id: id.into(),
            outcome: Outcome::Succeeded {
                text: text.into(),
                usage,
            },
        }
    }

    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            outcome: Outcome::Failed {
                error: error.into(),
            },
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self.outcome {
            Outcome::Succeeded { .. } => OutcomeKind::Succeeded,
            Outcome::Failed { .. } => OutcomeKind::Failed,
        }
    }
}

/// 结果流中的一条原始记录（已从厂商格式解码，尚未分类）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub correlation_id: Option<String>,
    pub succeeded: bool,
    pub text: Option<String>,
    pub usage: Option<Usage>,
    pub error: Option<String>,
}

/// 被跳过的记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRecord {
    /// 在结果流中的位置（从 0 开始）
    pub position: usize,
    pub reason: String,
}

/// 提交的 id 与返回的 id 的对账结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// 提交了但没有返回结果
    pub missing: Vec<String>,
    /// 返回了但从未提交
    pub unexpected: Vec<String>,
}

impl Reconciliation {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

/// 一个批处理的全部结果，按到达顺序分成成功和失败两组
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutcomeSet {
    succeeded: Vec<ItemOutcome>,
    failed: Vec<ItemOutcome>,
    skipped: Vec<SkippedRecord>,
    arrival: Vec<(OutcomeKind, usize)>,
    seen: HashSet<String>,
}

impl OutcomeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一条结果；id 已出现过时丢弃并返回 `false`
    pub fn record(&mut self, item: ItemOutcome) -> bool {
        if !self.seen.insert(item.id.clone()) {
            return false;
        }

        let kind = item.kind();
        let bucket = match kind {
            OutcomeKind::Succeeded => &mut self.succeeded,
            OutcomeKind::Failed => &mut self.failed,
        };
        self.arrival.push((kind, bucket.len()));
        bucket.push(item);
        true
    }

    pub fn skip(&mut self, position: usize, reason: impl Into<String>) {
        self.skipped.push(SkippedRecord {
            position,
            reason: reason.into(),
        });
    }

    /// 按到达顺序遍历成功和失败的结果
    pub fn arrival_order(&self) -> impl Iterator<Item = &ItemOutcome> + '_ {
        self.arrival.iter().map(move |(kind, index)| match kind {
            OutcomeKind::Succeeded => &self.succeeded[*index],
            OutcomeKind::Failed => &self.failed[*index],
        })
    }

    /// 成功的结果，按到达顺序
    pub fn succeeded(&self) -> &[ItemOutcome] {
        &self.succeeded
    }

    /// 失败的结果，按到达顺序
    pub fn failed(&self) -> &[ItemOutcome] {
        &self.failed
    }

    pub fn skipped(&self) -> &[SkippedRecord] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.arrival.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrival.is_empty()
    }

    /// 所有成功结果的 token 用量合计
    pub fn total_usage(&self) -> Usage {
        let mut total = Usage::default();
        for item in &self.succeeded {
            if let Outcome::Succeeded { usage, .. } = &item.outcome {
                total += *usage;
            }
        }
        total
    }

    pub fn reconcile<'a, I>(&self, submitted_ids: I) -> Reconciliation
    where
        I: IntoIterator<Item = &'a str>,
    {
        let submitted: HashSet<&str> = submitted_ids.into_iter().collect();

        let mut missing: Vec<String> = submitted
            .iter()
            .filter(|id| !self.seen.contains(**id))
            .map(|id| id.to_string())
            .collect();
        missing.sort();

        let unexpected = self
            .arrival_order()
            .filter(|item| !submitted.contains(item.id.as_str()))
            .map(|item| item.id.clone())
            .collect();

        Reconciliation {
            missing,
            unexpected,
        }
    }
}
