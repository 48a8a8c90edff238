//! Anthropic Message Batches API 的请求/响应结构
//!
//! 只在 `clients` 层使用，对外转换成与厂商无关的 `BatchJob` / `RawRecord`。

use crate::error::{ApiError, ClassificationError};
use crate::models::{BatchJob, BatchRequestItem, BatchStatus, RawRecord, RequestCounts, Usage};
use phf::phf_map;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `processing_status` 到本地状态的映射
static PROCESSING_STATUS: phf::Map<&'static str, BatchStatus> = phf_map! {
    "in_progress" => BatchStatus::Processing,
    "canceling" => BatchStatus::Processing,
    "ended" => BatchStatus::Ended,
    "failed" => BatchStatus::Failed,
    "errored" => BatchStatus::Failed,
    "expired" => BatchStatus::Failed,
    "canceled" => BatchStatus::Failed,
};

pub fn map_processing_status(status: &str) -> Option<BatchStatus> {
    PROCESSING_STATUS.get(status).copied()
}

// ========== 请求 ==========

#[derive(Debug, Clone, Serialize)]
pub struct CreateBatchRequest {
    pub requests: Vec<BatchRequestEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchRequestEntry {
    pub custom_id: String,
    pub params: MessageParams,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageParams {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: &'static str,
    pub content: String,
}

impl From<&BatchRequestItem> for BatchRequestEntry {
    fn from(item: &BatchRequestItem) -> Self {
        Self {
            custom_id: item.correlation_id.clone(),
            params: MessageParams {
                model: item.model.clone(),
                max_tokens: item.max_tokens,
                system: Some(item.system.clone()).filter(|s| !s.is_empty()),
                messages: vec![Message {
                    role: "user",
                    content: item.user_message.clone(),
                }],
            },
        }
    }
}

impl CreateBatchRequest {
    pub fn from_items(items: &[BatchRequestItem]) -> Self {
        Self {
            requests: items.iter().map(BatchRequestEntry::from).collect(),
        }
    }
}

// ========== 响应 ==========

/// 批处理对象（创建和查询都返回它）
#[derive(Debug, Clone, Deserialize)]
pub struct MessageBatch {
    pub id: String,
    pub processing_status: String,
    #[serde(default)]
    pub request_counts: Option<RequestCounts>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl MessageBatch {
    pub fn into_job(self, endpoint: &str) -> Result<BatchJob, ApiError> {
        let status = map_processing_status(&self.processing_status).ok_or_else(|| {
            ApiError::UnexpectedStatus {
                endpoint: endpoint.to_string(),
                status: self.processing_status.clone(),
            }
        })?;

        Ok(BatchJob {
            id: self.id,
            status,
            error: self.error.as_ref().and_then(extract_error_message),
            request_counts: self.request_counts,
        })
    }
}

/// 错误响应体 `{"type": "error", "error": {"type": ..., "message": ...}}`
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub message: String,
}

/// 结果文件（JSONL）中的一行
#[derive(Debug, Clone, Deserialize)]
pub struct ResultLine {
    #[serde(default)]
    pub custom_id: Option<String>,
    #[serde(default)]
    pub result: Option<ResultBody>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResultBody {
    Succeeded {
        message: ResultMessage,
    },
    Errored {
        #[serde(default)]
        error: Option<Value>,
    },
    Canceled,
    Expired,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultMessage {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub usage: Usage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl From<ResultLine> for RawRecord {
    fn from(line: ResultLine) -> Self {
        let mut record = RawRecord {
            correlation_id: line.custom_id,
            ..RawRecord::default()
        };

        match line.result {
            Some(ResultBody::Succeeded { message }) => {
                record.succeeded = true;
                record.text = message
                    .content
                    .into_iter()
                    .find(|block| block.kind == "text")
                    .and_then(|block| block.text);
                record.usage = Some(message.usage);
            }
            Some(ResultBody::Errored { error }) => {
                record.error = error.as_ref().and_then(extract_error_message);
            }
            Some(ResultBody::Canceled) => record.error = Some("canceled".to_string()),
            Some(ResultBody::Expired) => record.error = Some("expired".to_string()),
            Some(ResultBody::Unknown) | None => {}
        }

        record
    }
}

/// 解码结果文件中的一行
///
/// 不合法的 UTF-8 直接拒绝，不做替换
pub fn parse_result_line(line: impl AsRef<[u8]>) -> Result<RawRecord, ClassificationError> {
    let text = std::str::from_utf8(line.as_ref())
        .map_err(|source| ClassificationError::InvalidUtf8 { source })?;
    serde_json::from_str::<ResultLine>(text)
        .map(RawRecord::from)
        .map_err(|source| ClassificationError::Malformed { source })
}

/// 从错误对象中取出可读的信息
///
/// 依次尝试 `error.error.message`、`error.message`，字符串直接使用，
/// 其他形态原样序列化。
pub fn extract_error_message(error: &Value) -> Option<String> {
    let message = match error {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("error")
            .and_then(|inner| inner.get("message"))
            .or_else(|| map.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(error.to_string())),
        other => Some(other.to_string()),
    };
    message.filter(|m| !m.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_request_shape() {
        let items = vec![BatchRequestItem {
            correlation_id: "task_0".to_string(),
            model: "claude-3-opus-20240229".to_string(),
            max_tokens: 4096,
            system: "be terse".to_string(),
            user_message: "hello".to_string(),
        }];

        let body = serde_json::to_value(CreateBatchRequest::from_items(&items)).unwrap();
        assert_eq!(
            body,
            json!({
                "requests": [{
                    "custom_id": "task_0",
                    "params": {
                        "model": "claude-3-opus-20240229",
                        "max_tokens": 4096,
                        "system": "be terse",
                        "messages": [{"role": "user", "content": "hello"}]
                    }
                }]
            })
        );
    }

    #[test]
    fn test_empty_system_prompt_is_omitted() {
        let item = BatchRequestItem {
            correlation_id: "a".to_string(),
            model: "m".to_string(),
            max_tokens: 1,
            system: String::new(),
            user_message: "u".to_string(),
        };
        let body = serde_json::to_value(BatchRequestEntry::from(&item)).unwrap();
        assert!(body["params"].get("system").is_none());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(map_processing_status("in_progress"), Some(BatchStatus::Processing));
        assert_eq!(map_processing_status("canceling"), Some(BatchStatus::Processing));
        assert_eq!(map_processing_status("ended"), Some(BatchStatus::Ended));
        assert_eq!(map_processing_status("failed"), Some(BatchStatus::Failed));
        assert_eq!(map_processing_status("sleeping"), None);
    }

    #[test]
    fn test_message_batch_into_job() {
        let batch: MessageBatch = serde_json::from_value(json!({
            "id": "msgbatch_013Zva2CMHLNnXjNJJKqJ2EF",
            "type": "message_batch",
            "processing_status": "in_progress",
            "request_counts": {
                "processing": 2,
                "succeeded": 1,
                "errored": 0,
                "canceled": 0,
                "expired": 0
            },
            "results_url": null
        }))
        .unwrap();

        let job = batch.into_job("/v1/messages/batches").unwrap();
        assert_eq!(job.id, "msgbatch_013Zva2CMHLNnXjNJJKqJ2EF");
        assert_eq!(job.status, BatchStatus::Processing);
        assert_eq!(job.request_counts.unwrap().processing, 2);
    }

    #[test]
    fn test_unknown_status_is_an_error() {
        let batch: MessageBatch = serde_json::from_value(json!({
            "id": "msgbatch_1",
            "processing_status": "paused"
        }))
        .unwrap();

        let err = batch.into_job("/v1/messages/batches/msgbatch_1").unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedStatus { ref status, .. } if status == "paused"));
    }

    #[test]
    fn test_parse_succeeded_line() {
        let line = r##"{"custom_id":"task_0","result":{"type":"succeeded","message":{"id":"msg_1","type":"message","role":"assistant","content":[{"type":"text","text":"# src/main.py\nprint(1)"},{"type":"text","text":"second"}],"usage":{"input_tokens":12,"output_tokens":34}}}}"##;

        let record = parse_result_line(line).unwrap();
        assert_eq!(record.correlation_id.as_deref(), Some("task_0"));
        assert!(record.succeeded);
        assert_eq!(record.text.as_deref(), Some("# src/main.py\nprint(1)"));
        assert_eq!(
            record.usage,
            Some(Usage {
                input_tokens: 12,
                output_tokens: 34
            })
        );
    }

    #[test]
    fn test_parse_errored_line_uses_nested_message() {
        let line = r#"{"custom_id":"task_1","result":{"type":"errored","error":{"type":"error","error":{"type":"invalid_request_error","message":"max_tokens: too large"}}}}"#;

        let record = parse_result_line(line).unwrap();
        assert!(!record.succeeded);
        assert_eq!(record.error.as_deref(), Some("max_tokens: too large"));
    }

    #[test]
    fn test_parse_canceled_and_expired_lines() {
        let canceled = parse_result_line(r#"{"custom_id":"a","result":{"type":"canceled"}}"#).unwrap();
        assert_eq!(canceled.error.as_deref(), Some("canceled"));

        let expired = parse_result_line(r#"{"custom_id":"b","result":{"type":"expired"}}"#).unwrap();
        assert_eq!(expired.error.as_deref(), Some("expired"));
    }

    #[test]
    fn test_parse_errored_line_without_detail() {
        let record = parse_result_line(r#"{"custom_id":"c","result":{"type":"errored"}}"#).unwrap();
        assert!(!record.succeeded);
        assert!(record.error.is_none());
    }

    #[test]
    fn test_parse_malformed_line() {
        let err = parse_result_line("{not json").unwrap_err();
        assert!(matches!(err, ClassificationError::Malformed { .. }));
    }

    #[test]
    fn test_parse_rejects_invalid_utf8() {
        let mut line = br#"{"custom_id":"a","result":{"type":"succeeded","message":{"content":[{"type":"text","text":""#.to_vec();
        line.extend_from_slice(&[0xff, 0xfe]);
        line.extend_from_slice(br#""}]}}}"#);

        let err = parse_result_line(&line).unwrap_err();
        assert!(matches!(err, ClassificationError::InvalidUtf8 { .. }));

        let record = parse_result_line("{\"custom_id\":\"b\"}".as_bytes()).unwrap();
        assert_eq!(record.correlation_id.as_deref(), Some("b"));
    }

    #[test]
    fn test_extract_error_message_shapes() {
        assert_eq!(
            extract_error_message(&json!({"message": "flat"})).as_deref(),
            Some("flat")
        );
        assert_eq!(extract_error_message(&json!("plain")).as_deref(), Some("plain"));
        assert_eq!(
            extract_error_message(&json!({"code": 7})).as_deref(),
            Some(r#"{"code":7}"#)
        );
        assert_eq!(extract_error_message(&json!("")), None);
        assert_eq!(extract_error_message(&Value::Null), None);
    }
}
