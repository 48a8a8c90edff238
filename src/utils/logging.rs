/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use crate::config::Config;
use crate::models::RunSummary;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化 tracing 订阅者
///
/// `RUST_LOG` 优先；未设置时默认 `info`，`verbose` 时为 `debug`。
/// 重复初始化会被忽略。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config, command: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 批处理模式: {}", command);
    info!("🤖 厂商: {} | 模型: {}", config.provider, config.model_name);
    info!(
        "⏱️ 轮询间隔: {}s 起，x{}，上限 {}s",
        config.poll_initial_delay_secs, config.poll_backoff_factor, config.poll_max_delay_secs
    );
    info!("{}", "=".repeat(60));
}

/// 记录提示词加载信息
pub fn log_prompts_loaded(total: usize, source: &str) {
    info!("✓ 从 {} 找到 {} 条待提交的提示词", source, total);
}

/// 记录批处理创建成功，中断后可用 batch id 继续
pub fn log_batch_submitted(batch_id: &str, total: usize) {
    info!("\n{}", "─".repeat(60));
    info!("✓ 批处理已创建: {} ({} 条子请求)", batch_id, total);
    info!("💡 中断后可执行 `resume {}` 继续", batch_id);
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(summary: &RunSummary, output_dir: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 批处理 {} 完成统计", summary.batch_id);
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", summary.succeeded, summary.total());
    info!("❌ 失败: {}", summary.failed);
    if !summary.skipped.is_empty() {
        info!("⚠️ 跳过的记录: {}", summary.skipped.len());
    }
    if !summary.missing.is_empty() {
        info!("⚠️ 没有返回结果: {}", summary.missing.len());
    }
    info!(
        "🔢 Token: 输入 {} / 输出 {}",
        summary.usage.input_tokens, summary.usage.output_tokens
    );
    info!("{}", "=".repeat(60));
    info!("\n结果已保存至: {}", output_dir);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
