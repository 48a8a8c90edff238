use crate::error::FileError;
use crate::models::prompt::Prompt;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tokio::fs;

fn prompts_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)##\s*Generated Prompts\s*\n\s*```json\s*\n(.*?)\n\s*```")
            .expect("静态正则表达式")
    })
}

/// 从文件加载提示词列表
///
/// - `.json` 文件：整个文件就是提示词数组
/// - 其他文件（规划 markdown）：读取 `## Generated Prompts` 下的 JSON 区块
pub async fn load_prompts(path: &Path) -> Result<Vec<Prompt>, FileError> {
    let path_str = path.display().to_string();
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| FileError::read_failed(path_str.clone(), e))?;

    let prompts = if path.extension().and_then(|s| s.to_str()) == Some("json") {
        serde_json::from_str(&content).map_err(|source| FileError::JsonParseFailed {
            path: path_str.clone(),
            source,
        })?
    } else {
        parse_planning_prompts(&content, &path_str)?
    };

    tracing::info!("从 {} 加载了 {} 条提示词", path_str, prompts.len());
    Ok(prompts)
}

/// 从规划文件内容中解析提示词区块
pub fn parse_planning_prompts(content: &str, path: &str) -> Result<Vec<Prompt>, FileError> {
    let block = prompts_block_regex()
        .captures(content)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| FileError::PromptsSectionMissing {
            path: path.to_string(),
        })?;

    serde_json::from_str(block.as_str()).map_err(|source| FileError::JsonParseFailed {
        path: path.to_string(),
        source,
    })
}
