//! 结果分类服务 - 业务能力层
//!
//! 把结果流中的每条原始记录分成成功或失败两类：
//!
//! - 单条记录有问题（缺 id、无法解码）只跳过并警告，不影响其他记录
//! - 结果流本身不可读时整体失败
//! - 同一个 id 出现多次时只保留第一次

use crate::error::{ApiError, BatchError, ClassificationError};
use crate::models::{ItemOutcome, OutcomeSet, RawRecord};
use futures::{pin_mut, Stream, StreamExt};
use tracing::{debug, info, warn};

/// 失败记录没有错误描述时使用的占位
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// 对单条记录分类
pub fn classify(record: RawRecord) -> Result<ItemOutcome, ClassificationError> {
    let id = record
        .correlation_id
        .filter(|id| !id.trim().is_empty())
        .ok_or(ClassificationError::MissingCorrelationId)?;

    if record.succeeded {
        Ok(ItemOutcome::succeeded(
            id,
            record.text.unwrap_or_default(),
            record.usage.unwrap_or_default(),
        ))
    } else {
        let error = record
            .error
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
        Ok(ItemOutcome::failed(id, error))
    }
}

/// 消费整个结果流，得到分好类的结果集合
///
/// 流中每一项：
/// - 外层 `Err`：流不可读，整体返回 `ResultFetch`
/// - 内层 `Err`：该条记录无法解码，跳过
pub async fn collect_outcomes<S>(batch_id: &str, records: S) -> Result<OutcomeSet, BatchError>
where
    S: Stream<Item = Result<Result<RawRecord, ClassificationError>, ApiError>>,
{
    pin_mut!(records);

    let mut outcomes = OutcomeSet::new();
    let mut position = 0usize;

    while let Some(item) = records.next().await {
        let decoded = item.map_err(|source| BatchError::ResultFetch {
            batch_id: batch_id.to_string(),
            source,
        })?;

        match decoded.and_then(classify) {
            Ok(outcome) => {
                let id = outcome.id.clone();
                if outcomes.record(outcome) {
                    debug!("结果 #{} 已分类: {}", position, id);
                } else {
                    warn!("⚠️ 批处理 {} 中 id 重复，已忽略后出现的记录: {}", batch_id, id);
                }
            }
            Err(err) => {
                warn!("⚠️ 批处理 {} 的第 {} 条结果已跳过: {}", batch_id, position, err);
                outcomes.skip(position, err.to_string());
            }
        }
        position += 1;
    }

    info!(
        "📦 批处理 {} 结果: 成功 {}，失败 {}，跳过 {}",
        batch_id,
        outcomes.succeeded().len(),
        outcomes.failed().len(),
        outcomes.skipped().len()
    );

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Outcome, Usage};
    use futures::stream;

    fn success(id: &str, text: &str) -> RawRecord {
        RawRecord {
            correlation_id: Some(id.to_string()),
            succeeded: true,
            text: Some(text.to_string()),
            usage: Some(Usage {
                input_tokens: 3,
                output_tokens: 4,
            }),
            error: None,
        }
    }

    fn failure(id: &str, error: Option<&str>) -> RawRecord {
        RawRecord {
            correlation_id: Some(id.to_string()),
            succeeded: false,
            error: error.map(str::to_string),
            ..RawRecord::default()
        }
    }

    fn malformed() -> ClassificationError {
        ClassificationError::Malformed {
            source: serde_json::from_str::<serde_json::Value>("{oops").unwrap_err(),
        }
    }

    #[test]
    fn test_classify_success_and_failure() {
        let ok = classify(success("A", "hello")).unwrap();
        assert_eq!(ok.id, "A");
        assert!(matches!(ok.outcome, Outcome::Succeeded { ref text, .. } if text == "hello"));

        let failed = classify(failure("B", Some("rate limited"))).unwrap();
        assert_eq!(failed, ItemOutcome::failed("B", "rate limited"));
    }

    #[test]
    fn test_classify_defaults() {
        let mut record = success("A", "");
        record.text = None;
        record.usage = None;
        let ok = classify(record).unwrap();
        assert_eq!(ok, ItemOutcome::succeeded("A", "", Usage::default()));

        let failed = classify(failure("B", None)).unwrap();
        assert_eq!(failed, ItemOutcome::failed("B", UNKNOWN_ERROR));

        let failed = classify(failure("C", Some("   "))).unwrap();
        assert_eq!(failed, ItemOutcome::failed("C", UNKNOWN_ERROR));
    }

    #[test]
    fn test_classify_missing_id() {
        let mut record = success("A", "x");
        record.correlation_id = None;
        assert!(matches!(
            classify(record),
            Err(ClassificationError::MissingCorrelationId)
        ));

        let mut record = failure("", Some("x"));
        record.correlation_id = Some(String::new());
        assert!(matches!(
            classify(record),
            Err(ClassificationError::MissingCorrelationId)
        ));
    }

    #[tokio::test]
    async fn test_collect_outcomes_partitions_in_arrival_order() {
        let records = stream::iter(vec![
            Ok(Ok(success("A", "a"))),
            Ok(Ok(failure("B", Some("boom")))),
            Ok(Ok(success("C", "c"))),
        ]);

        let set = collect_outcomes("b1", records).await.unwrap();

        let succeeded: Vec<_> = set.succeeded().iter().map(|i| i.id.as_str()).collect();
        let failed: Vec<_> = set.failed().iter().map(|i| i.id.as_str()).collect();
        let merged: Vec<_> = set.arrival_order().map(|i| i.id.as_str()).collect();
        assert_eq!(succeeded, vec!["A", "C"]);
        assert_eq!(failed, vec!["B"]);
        assert_eq!(merged, vec!["A", "B", "C"]);
        assert!(set.skipped().is_empty());
    }

    #[tokio::test]
    async fn test_bad_records_are_skipped_not_fatal() {
        let mut missing_id = success("X", "x");
        missing_id.correlation_id = None;

        let records = stream::iter(vec![
            Ok(Ok(success("A", "a"))),
            Ok(Err(malformed())),
            Ok(Ok(missing_id)),
            Ok(Ok(failure("B", None))),
        ]);

        let set = collect_outcomes("b2", records).await.unwrap();

        assert_eq!(set.len(), 2);
        let positions: Vec<usize> = set.skipped().iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![1, 2]);
        assert_eq!(set.failed()[0], ItemOutcome::failed("B", UNKNOWN_ERROR));
    }

    #[tokio::test]
    async fn test_duplicate_ids_keep_first() {
        let records = stream::iter(vec![
            Ok(Ok(success("A", "first"))),
            Ok(Ok(failure("A", Some("second")))),
        ]);

        let set = collect_outcomes("b3", records).await.unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.failed().is_empty());
        assert!(matches!(
            set.succeeded()[0].outcome,
            Outcome::Succeeded { ref text, .. } if text == "first"
        ));
    }

    #[tokio::test]
    async fn test_unreadable_stream_is_fatal() {
        let records = stream::iter(vec![
            Ok(Ok(success("A", "a"))),
            Err(ApiError::BadResponse {
                endpoint: "/v1/messages/batches/b4/results".to_string(),
                status: 502,
                message: None,
            }),
        ]);

        let err = collect_outcomes("b4", records).await.unwrap_err();
        assert!(matches!(err, BatchError::ResultFetch { ref batch_id, .. } if batch_id == "b4"));
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let records = stream::iter(Vec::<Result<Result<RawRecord, ClassificationError>, ApiError>>::new());
        let set = collect_outcomes("b5", records).await.unwrap();
        assert!(set.is_empty());
    }
}
