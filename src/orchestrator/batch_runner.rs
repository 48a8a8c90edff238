//! 批处理运行器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责把配置、厂商、流程和结果写入连起来。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：根据配置创建 provider（缺少密钥时立即失败）
//! 2. **加载提示词**：从规划文件或 JSON 文件读取
//! 3. **执行流程**：委托 `BatchFlow` 完成 submit → poll → fetch_results
//! 4. **结果落盘**：委托 `ResultWriter` 写入结果和汇总
//! 5. **全局统计**：输出最终统计信息
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单条结果的细节
//! - **向下委托**：批处理生命周期交给 workflow 层

use crate::config::Config;
use crate::error::AppResult;
use crate::models::{load_prompts, BatchJob, Outcome, RunSummary};
use crate::providers::{create_provider, BatchProvider};
use crate::services::ResultWriter;
use crate::utils::logging;
use crate::workflow::{BatchFlow, BatchRun};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 应用主结构
pub struct App {
    config: Config,
    flow: BatchFlow,
    writer: ResultWriter,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> AppResult<Self> {
        let provider = create_provider(&config)?;
        Ok(Self::with_provider(config, provider))
    }

    /// 使用指定的 provider 创建应用
    pub fn with_provider(config: Config, provider: Arc<dyn BatchProvider>) -> Self {
        let flow = BatchFlow::new(provider).with_poll_timeout(config.poll_timeout());
        let writer = ResultWriter::new(&config.results_dir);
        Self {
            config,
            flow,
            writer,
        }
    }

    /// 加载提示词并执行完整批处理
    ///
    /// `prompts_file` 为空时使用配置中的规划文件
    pub async fn execute(
        &self,
        prompts_file: Option<&Path>,
        cancel: &CancellationToken,
    ) -> AppResult<RunSummary> {
        let started_at = Local::now();
        let path = prompts_file
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(&self.config.planning_file));

        info!("\n📁 正在读取提示词: {}", path.display());
        let prompts = load_prompts(&path).await?;
        logging::log_prompts_loaded(prompts.len(), &path.display().to_string());

        let run = self.flow.run(&prompts, cancel).await?;
        self.finish(run, started_at, Some(prompts.len())).await
    }

    /// 继续一个已提交的批处理
    pub async fn resume(&self, batch_id: &str, cancel: &CancellationToken) -> AppResult<RunSummary> {
        let started_at = Local::now();
        let run = self.flow.resume(batch_id, cancel).await?;
        self.finish(run, started_at, None).await
    }

    /// 查询一次状态
    pub async fn status(&self, batch_id: &str) -> AppResult<BatchJob> {
        let job = self.flow.provider().query_status(batch_id).await?;

        info!("📋 批处理 {} 状态: {}", job.id, job.status);
        if let Some(counts) = job.request_counts {
            info!("   {}", counts);
        }
        if let Some(error) = &job.error {
            warn!("   错误信息: {}", error);
        }
        if !job.status.is_terminal() {
            info!("💡 批处理尚未结束，可执行 `resume {}` 等待并拉取结果", job.id);
        }
        Ok(job)
    }

    async fn finish(
        &self,
        run: BatchRun,
        started_at: chrono::DateTime<Local>,
        submitted: Option<usize>,
    ) -> AppResult<RunSummary> {
        for item in run.outcomes.failed() {
            if let Outcome::Failed { error } = &item.outcome {
                warn!("❌ {} 失败: {}", item.id, logging::truncate_text(error, 120));
            }
        }

        let summary = RunSummary::new(
            &run.job.id,
            &self.config.model_name,
            started_at,
            submitted,
            &run.outcomes,
            run.reconciliation.as_ref(),
        );

        self.writer.write(&run.outcomes, &summary).await?;
        logging::print_final_stats(&summary, &self.writer.output_dir().display().to_string());

        Ok(summary)
    }
}
