use anyhow::Result;
use clap::{Parser, Subcommand};
use plan_batch::utils::logging;
use plan_batch::{App, Config};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

#[derive(Parser, Debug)]
#[command(name = "plan_batch", version, about = "把规划文件中的提示词作为批处理提交给 LLM")]
struct Cli {
    /// TOML 配置文件
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 显示详细日志
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 读取提示词，提交并等待结果
    Execute {
        /// 规划文件或 JSON 提示词文件
        #[arg(short, long)]
        planning_file: Option<PathBuf>,
        /// 结果目录
        #[arg(short, long)]
        output_dir: Option<String>,
        /// 模型名称
        #[arg(short, long)]
        model: Option<String>,
    },
    /// 继续等待已提交的批处理并拉取结果
    Resume {
        batch_id: String,
        #[arg(short, long)]
        output_dir: Option<String>,
    },
    /// 查询一次批处理状态
    Status { batch_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置，命令行参数优先
    let mut config = Config::load(cli.config.as_deref())?;
    if cli.verbose {
        config.verbose_logging = true;
    }
    match &cli.command {
        Command::Execute {
            output_dir, model, ..
        } => {
            if let Some(dir) = output_dir {
                config.results_dir = dir.clone();
            }
            if let Some(model) = model {
                config.model_name = model.clone();
            }
        }
        Command::Resume { output_dir, .. } => {
            if let Some(dir) = output_dir {
                config.results_dir = dir.clone();
            }
        }
        Command::Status { .. } => {}
    }

    // 初始化日志
    logging::init(config.verbose_logging);

    let command_name = match &cli.command {
        Command::Execute { .. } => "execute",
        Command::Resume { .. } => "resume",
        Command::Status { .. } => "status",
    };
    logging::log_startup(&config, command_name);

    let app = App::initialize(config)?;

    // Ctrl-C 取消轮询
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⚠️ 收到中断信号，正在停止轮询...");
            signal_token.cancel();
        }
    });

    let result = match cli.command {
        Command::Execute { planning_file, .. } => app
            .execute(planning_file.as_deref(), &cancel)
            .await
            .map(|_| ()),
        Command::Resume { batch_id, .. } => app.resume(&batch_id, &cancel).await.map(|_| ()),
        Command::Status { batch_id } => app.status(&batch_id).await.map(|_| ()),
    };

    if let Err(e) = &result {
        error!("❌ {}", e);
    }
    result?;

    Ok(())
}
