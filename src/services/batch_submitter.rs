//! 批处理提交服务 - 业务能力层
//!
//! 只负责"把提示词打包成一次批处理请求"，不关心具体厂商的协议

use crate::error::BatchError;
use crate::models::{BatchRequestItem, ModelConfig, Prompt};
use std::collections::HashSet;
use tracing::debug;

/// 批处理提交服务
///
/// 职责：
/// - 校验提示词列表（非空、id 唯一）
/// - 每条提示词生成一条子请求，以 id 作为 correlation id
pub struct BatchSubmitter {
    model_config: ModelConfig,
}

impl BatchSubmitter {
    pub fn new(model_config: ModelConfig) -> Self {
        Self { model_config }
    }

    /// 构建子请求列表
    ///
    /// 校验失败时不会产生任何网络调用
    pub fn build_requests(&self, prompts: &[Prompt]) -> Result<Vec<BatchRequestItem>, BatchError> {
        if prompts.is_empty() {
            return Err(BatchError::EmptyBatch);
        }

        let mut seen = HashSet::with_capacity(prompts.len());
        for prompt in prompts {
            if !seen.insert(prompt.id.as_str()) {
                return Err(BatchError::DuplicatePromptId {
                    id: prompt.id.clone(),
                });
            }
        }

        let items: Vec<BatchRequestItem> = prompts
            .iter()
            .map(|prompt| BatchRequestItem {
                correlation_id: prompt.id.clone(),
                model: self.model_config.model.clone(),
                max_tokens: self.model_config.max_tokens,
                system: self.model_config.system_prompt.clone(),
                user_message: prompt.text.clone(),
            })
            .collect();

        debug!(
            "构建了 {} 条子请求，模型: {}",
            items.len(),
            self.model_config.model
        );

        Ok(items)
    }
}
