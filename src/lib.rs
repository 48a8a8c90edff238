//! # Plan Batch
//!
//! 把规划文件中的提示词作为一个批处理提交给 LLM 批处理接口，
//! 等待结束后把每条结果分成成功/失败并写入结果目录。
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 协议层（Clients）
//! - `clients/` - 只处理 HTTP 协议和厂商数据格式
//! - `AnthropicClient` - Message Batches 接口
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，与厂商无关
//! - `BatchSubmitter` - 校验并打包提示词
//! - `BatchPoller` - 指数退避轮询
//! - `result_classifier` - 结果分类
//! - `ResultWriter` - 结果落盘
//!
//! ### ③ 厂商抽象（Providers）
//! - `BatchProvider` - submit / query_status / poll / fetch_results
//! - `AnthropicProvider` - 唯一的实现
//!
//! ### ④ 流程层（Workflow）
//! - `BatchFlow` - submit → poll → fetch_results，失败时标明阶段
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator::App` - 配置、提示词加载、结果写入、统计
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, BatchError, OrchestrationError};
pub use models::{BatchJob, BatchStatus, ItemOutcome, OutcomeSet, Prompt};
pub use orchestrator::App;
pub use providers::{create_provider, BatchProvider};
pub use workflow::{BatchFlow, BatchRun, Stage};
