use std::time::Duration;
use thiserror::Error;

use crate::workflow::Stage;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 批处理流程错误（带阶段信息）
    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),
    /// 单独调用批处理能力时的错误
    #[error("批处理错误: {0}")]
    Batch(#[from] BatchError),
}

/// 远端 API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// API 返回错误响应
    #[error("API返回错误响应 ({endpoint}): status={status}, message={message:?}")]
    BadResponse {
        endpoint: String,
        status: u16,
        message: Option<String>,
    },
    /// 请求频率限制
    #[error("API请求频率限制 ({endpoint}), 建议等待: {retry_after:?}秒")]
    RateLimited {
        endpoint: String,
        retry_after: Option<u64>,
    },
    /// JSON 解析失败
    #[error("JSON解析失败 ({endpoint}): {source}")]
    JsonParseFailed {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    /// 无法识别的批处理状态
    #[error("无法识别的批处理状态 ({endpoint}): {status}")]
    UnexpectedStatus { endpoint: String, status: String },
    /// 等待响应超时
    #[error("API请求超时 ({endpoint}): {waited:?} 内没有收到数据")]
    Timeout { endpoint: String, waited: Duration },
}

/// 批处理生命周期中的错误
#[derive(Debug, Error)]
pub enum BatchError {
    /// 提示词列表为空
    #[error("提示词列表为空，无法提交批处理")]
    EmptyBatch,
    /// 同一批次内 id 重复
    #[error("提示词 id 重复: {id}")]
    DuplicatePromptId { id: String },
    /// id 不符合厂商要求
    #[error("提示词 id 不合法 ({id}): {reason}")]
    InvalidPromptId { id: String, reason: String },
    /// 远端拒绝创建批处理
    #[error("提交批处理失败: {0}")]
    Submission(#[source] ApiError),
    /// 远端报告批处理整体失败
    #[error("批处理 {batch_id} 失败: {detail}")]
    RemoteFailure { batch_id: String, detail: String },
    /// 查询状态失败
    #[error("查询批处理 {batch_id} 状态失败: {source}")]
    StatusQuery {
        batch_id: String,
        #[source]
        source: ApiError,
    },
    /// 结果流不可读
    #[error("读取批处理 {batch_id} 结果失败: {source}")]
    ResultFetch {
        batch_id: String,
        #[source]
        source: ApiError,
    },
    /// 提交请求被调用方取消，远端可能已经创建了批处理
    #[error("提交批处理已取消，远端可能已创建批处理")]
    SubmitCancelled,
    /// 调用方取消
    #[error("批处理 {batch_id} 的处理已取消")]
    Cancelled { batch_id: String },
    /// 超过调用方设置的等待时间
    #[error("批处理 {batch_id} 在 {waited:?} 内未结束")]
    DeadlineExceeded { batch_id: String, waited: Duration },
}

impl BatchError {
    /// 出错的批处理 id（如果已知）
    pub fn batch_id(&self) -> Option<&str> {
        match self {
            BatchError::RemoteFailure { batch_id, .. }
            | BatchError::StatusQuery { batch_id, .. }
            | BatchError::ResultFetch { batch_id, .. }
            | BatchError::Cancelled { batch_id }
            | BatchError::DeadlineExceeded { batch_id, .. } => Some(batch_id),
            _ => None,
        }
    }
}

/// 单条结果记录无法分类
#[derive(Debug, Error)]
pub enum ClassificationError {
    /// 缺少 correlation id
    #[error("结果记录缺少 correlation id")]
    MissingCorrelationId,
    /// 记录不是合法的 UTF-8
    #[error("结果记录不是合法的 UTF-8: {source}")]
    InvalidUtf8 {
        #[source]
        source: std::str::Utf8Error,
    },
    /// 记录无法解码
    #[error("结果记录格式错误: {source}")]
    Malformed {
        #[source]
        source: serde_json::Error,
    },
}

/// 带阶段信息的流程错误
#[derive(Debug, Error)]
#[error("[{stage}] {source}")]
pub struct OrchestrationError {
    pub stage: Stage,
    pub batch_id: Option<String>,
    #[source]
    pub source: BatchError,
}

impl OrchestrationError {
    pub fn new(stage: Stage, source: BatchError) -> Self {
        Self {
            stage,
            batch_id: source.batch_id().map(str::to_string),
            source,
        }
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 缺少 API 密钥
    #[error("缺少 API 密钥，请设置 ANTHROPIC_API_KEY")]
    MissingApiKey,
    /// 未知的厂商
    #[error("未知的 LLM 厂商: {0}")]
    UnknownProvider(String),
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 取值不合法
    #[error("配置项 {key} 不合法: {reason}")]
    InvalidValue { key: String, reason: String },
    /// 配置文件无法读取
    #[error("读取配置文件失败 ({path}): {source}")]
    FileReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 配置文件解析失败
    #[error("配置文件解析失败 ({path}): {source}")]
    FileParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 构建 HTTP 客户端失败
    #[error("构建 HTTP 客户端失败: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件不存在
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 规划文件中没有提示词区块
    #[error("文件 {path} 中没有找到 \"## Generated Prompts\" JSON 区块")]
    PromptsSectionMissing { path: String },
    /// 提示词 JSON 解析失败
    #[error("提示词 JSON 解析失败 ({path}): {source}")]
    JsonParseFailed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

// ========== 便捷构造函数 ==========

impl ApiError {
    /// 创建网络请求失败错误
    pub fn request_failed(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// 创建 JSON 解析错误
    pub fn json_parse_failed(endpoint: impl Into<String>, source: serde_json::Error) -> Self {
        ApiError::JsonParseFailed {
            endpoint: endpoint.into(),
            source,
        }
    }
}

impl FileError {
    /// 创建文件读取错误，`NotFound` 单独归类
    pub fn read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            FileError::NotFound { path }
        } else {
            FileError::ReadFailed { path, source }
        }
    }

    /// 创建文件写入错误
    pub fn write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        FileError::WriteFailed {
            path: path.into(),
            source,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
