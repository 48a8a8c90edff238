use serde::{Deserialize, Serialize};

/// 一条待提交的提示词
///
/// `id` 在同一个批处理内必须唯一，结果记录通过它回到对应的提示词。
/// 兼容旧版规划文件中的 `custom_id` / `content` 字段名。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    #[serde(alias = "custom_id")]
    pub id: String,
    #[serde(alias = "content")]
    pub text: String,
}

impl Prompt {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// 模型调用参数，每条子请求共用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    /// 模型名称
    pub model: String,
    /// 单条回复的最大 token 数
    pub max_tokens: u32,
    /// 固定的系统提示词
    pub system_prompt: String,
}

/// 批处理中的一条子请求（与具体厂商无关的形态）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequestItem {
    pub correlation_id: String,
    pub model: String,
    pub max_tokens: u32,
    pub system: String,
    pub user_message: String,
}
