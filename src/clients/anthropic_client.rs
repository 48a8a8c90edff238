/// Anthropic Message Batches API 客户端
///
/// 封装所有与批处理接口相关的 HTTP 调用，只处理协议，不关心流程
use crate::clients::anthropic_types::{CreateBatchRequest, ErrorResponse, MessageBatch};
use crate::error::{ApiError, ConfigError};
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const BATCHES_PATH: &str = "/v1/messages/batches";

/// Anthropic 批处理客户端
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: HeaderValue,
    base_url: String,
    request_timeout: Duration,
}

impl AnthropicClient {
    /// 创建新的客户端
    ///
    /// 密钥为空或无法放入请求头时立即失败，不会发起任何网络请求
    ///
    /// `request_timeout` 用于普通请求的总时长，以及结果下载中两次读取之间的最长间隔
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        let mut api_key =
            HeaderValue::from_str(api_key.trim()).map_err(|_| ConfigError::InvalidValue {
                key: "api_key".to_string(),
                reason: "包含无法放入请求头的字符".to_string(),
            })?;
        api_key.set_sensitive(true);

        let http = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(Self {
            http,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    /// 创建批处理
    pub async fn create_batch(&self, request: &CreateBatchRequest) -> Result<MessageBatch, ApiError> {
        let endpoint = self.url(BATCHES_PATH);
        debug!("创建批处理: {} 条子请求 -> {}", request.requests.len(), endpoint);

        let response = self
            .http
            .post(&endpoint)
            .headers(self.headers())
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::request_failed(endpoint.clone(), e))?;

        read_json(check_status(response, &endpoint).await?, &endpoint).await
    }

    /// 查询批处理状态
    pub async fn retrieve_batch(&self, batch_id: &str) -> Result<MessageBatch, ApiError> {
        let endpoint = self.url(&format!("{}/{}", BATCHES_PATH, batch_id));
        debug!("查询批处理状态: {}", endpoint);

        let response = self
            .http
            .get(&endpoint)
            .headers(self.headers())
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| ApiError::request_failed(endpoint.clone(), e))?;

        read_json(check_status(response, &endpoint).await?, &endpoint).await
    }

    /// 以行流的形式读取批处理结果（JSONL）
    ///
    /// 返回的流按远端顺序逐行产出原始字节，不会一次性把结果读入内存。
    /// 响应头或任意两块数据之间超过 `request_timeout` 时产出 `ApiError::Timeout`。
    pub async fn stream_results(
        &self,
        batch_id: &str,
    ) -> Result<BoxStream<'static, Result<Vec<u8>, ApiError>>, ApiError> {
        let endpoint = self.url(&format!("{}/{}/results", BATCHES_PATH, batch_id));
        debug!("读取批处理结果: {}", endpoint);

        let send = self.http.get(&endpoint).headers(self.headers()).send();
        let response = match tokio::time::timeout(self.request_timeout, send).await {
            Ok(result) => result.map_err(|e| ApiError::request_failed(endpoint.clone(), e))?,
            Err(_) => {
                return Err(ApiError::Timeout {
                    endpoint,
                    waited: self.request_timeout,
                })
            }
        };
        let response = check_status(response, &endpoint).await?;

        let state = LineStreamState {
            bytes: response
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
                .boxed(),
            buffer: LineBuffer::default(),
            pending: VecDeque::new(),
            done: false,
            idle_timeout: self.request_timeout,
            endpoint,
        };

        let lines = stream::unfold(state, |mut state| async move {
            loop {
                if let Some(line) = state.pending.pop_front() {
                    return Some((Ok(line), state));
                }
                if state.done {
                    return None;
                }
                match tokio::time::timeout(state.idle_timeout, state.bytes.next()).await {
                    Ok(Some(Ok(chunk))) => {
                        let lines = state.buffer.push(&chunk);
                        state.pending.extend(lines);
                    }
                    Ok(Some(Err(e))) => {
                        state.done = true;
                        let err = ApiError::request_failed(state.endpoint.clone(), e);
                        return Some((Err(err), state));
                    }
                    Ok(None) => {
                        state.done = true;
                        state.pending.extend(state.buffer.finish());
                    }
                    Err(_) => {
                        state.done = true;
                        warn!("读取结果超时: {}", state.endpoint);
                        let err = ApiError::Timeout {
                            endpoint: state.endpoint.clone(),
                            waited: state.idle_timeout,
                        };
                        return Some((Err(err), state));
                    }
                }
            }
        });

        Ok(lines.boxed())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", self.api_key.clone());
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers
    }
}

struct LineStreamState {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    buffer: LineBuffer,
    pending: VecDeque<Vec<u8>>,
    done: bool,
    idle_timeout: Duration,
    endpoint: String,
}

/// 把任意切分的字节块重新拼成完整的行
///
/// 只按 `\n` 切分，不做 UTF-8 解码；编码错误留给逐行解析时处理
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    partial: Vec<u8>,
}

impl LineBuffer {
    /// 追加一个数据块，返回其中已完整的非空行
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.partial.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.partial.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.partial.drain(..=pos).collect();
            if let Some(line) = trim_line(&raw) {
                lines.push(line);
            }
        }
        lines
    }

    /// 流结束时取出最后一行（没有换行结尾的情况）
    pub(crate) fn finish(&mut self) -> Option<Vec<u8>> {
        let raw = std::mem::take(&mut self.partial);
        trim_line(&raw)
    }
}

fn trim_line(raw: &[u8]) -> Option<Vec<u8>> {
    let start = raw.iter().position(|b| !b.is_ascii_whitespace())?;
    let end = raw.iter().rposition(|b| !b.is_ascii_whitespace())?;
    Some(raw[start..=end].to_vec())
}

/// 非 2xx 响应转换成 `ApiError`
async fn check_status(response: Response, endpoint: &str) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        warn!("API 请求频率限制: {}", endpoint);
        return Err(ApiError::RateLimited {
            endpoint: endpoint.to_string(),
            retry_after,
        });
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message_from_body(&body);
    warn!("API 返回错误响应 ({}): {} {:?}", endpoint, status, message);

    Err(ApiError::BadResponse {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        message,
    })
}

async fn read_json(response: Response, endpoint: &str) -> Result<MessageBatch, ApiError> {
    let body = response
        .text()
        .await
        .map_err(|e| ApiError::request_failed(endpoint, e))?;
    serde_json::from_str(&body).map_err(|e| ApiError::json_parse_failed(endpoint, e))
}

fn error_message_from_body(body: &str) -> Option<String> {
    if body.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) if !parsed.error.message.is_empty() => {
            Some(format!("{}: {}", parsed.error.kind, parsed.error.message))
        }
        _ => Some(body.trim().to_string()),
    }
}
