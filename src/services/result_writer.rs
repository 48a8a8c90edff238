//! 结果写入服务 - 业务能力层
//!
//! 只负责"把结果落盘"，不关心流程

use crate::error::FileError;
use crate::models::{Outcome, OutcomeSet, RunSummary};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// 写入失败结果时的 JSON 结构
#[derive(Debug, Serialize)]
struct FailedItem<'a> {
    custom_id: &'a str,
    error: &'a str,
}

/// 结果写入服务
///
/// 目录结构：
/// ```text
/// <output_dir>/
///   succeeded/<id>.txt
///   failed/<id>.json
///   summary.json
/// ```
pub struct ResultWriter {
    output_dir: PathBuf,
}

impl ResultWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 写入全部结果和汇总，返回写入的结果文件数量
    pub async fn write(&self, outcomes: &OutcomeSet, summary: &RunSummary) -> Result<usize, FileError> {
        let succeeded_dir = self.output_dir.join("succeeded");
        let failed_dir = self.output_dir.join("failed");
        create_dir(&succeeded_dir).await?;
        create_dir(&failed_dir).await?;

        let mut written = 0;
        for item in outcomes.arrival_order() {
            let stem = sanitize_file_stem(&item.id);
            match &item.outcome {
                Outcome::Succeeded { text, .. } => {
                    let path = succeeded_dir.join(format!("{}.txt", stem));
                    write_file(&path, text.as_bytes()).await?;
                }
                Outcome::Failed { error } => {
                    let path = failed_dir.join(format!("{}.json", stem));
                    let body = FailedItem {
                        custom_id: &item.id,
                        error,
                    };
                    write_file(&path, &to_pretty_json(&path, &body)?).await?;
                }
            }
            written += 1;
        }

        let summary_path = self.output_dir.join("summary.json");
        write_file(&summary_path, &to_pretty_json(&summary_path, summary)?).await?;

        info!(
            "💾 已写入 {} 个结果文件到 {}",
            written,
            self.output_dir.display()
        );
        Ok(written)
    }
}

/// 文件名中只保留 `[A-Za-z0-9._-]`，其余字符替换为 `_`
pub fn sanitize_file_stem(id: &str) -> String {
    let stem: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    // 避免 "." / ".." 这样的特殊名字
    if stem.chars().all(|c| c == '.') {
        stem.replace('.', "_")
    } else {
        stem
    }
}

async fn create_dir(path: &Path) -> Result<(), FileError> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| FileError::write_failed(path.display().to_string(), e))
}

async fn write_file(path: &Path, content: &[u8]) -> Result<(), FileError> {
    debug!("写入文件: {} ({} 字节)", path.display(), content.len());
    fs::write(path, content)
        .await
        .map_err(|e| FileError::write_failed(path.display().to_string(), e))
}

fn to_pretty_json<T: Serialize>(path: &Path, value: &T) -> Result<Vec<u8>, FileError> {
    serde_json::to_vec_pretty(value).map_err(|e| {
        FileError::write_failed(
            path.display().to_string(),
            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        )
    })
}
