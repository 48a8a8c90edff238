//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责把各层连起来，是整个系统的"指挥中心"。
//!
//! ## 层次关系
//!
//! ```text
//! batch_runner::App (配置 / 提示词 / 结果目录)
//!     ↓
//! workflow::BatchFlow (submit → poll → fetch_results)
//!     ↓
//! providers::BatchProvider (厂商能力)
//!     ↓
//! services (submitter / poller / classifier / writer)
//!     ↓
//! clients (HTTP 协议)
//! ```
//!
//! ## 设计原则
//!
//! 1. **向下依赖**：编排层 → workflow → providers → services → clients
//! 2. **无业务逻辑**：只做调度和统计，不做具体结果判断

pub mod batch_runner;

pub use batch_runner::App;
