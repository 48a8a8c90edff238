use crate::error::ConfigError;
use crate::models::ModelConfig;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// 单次轮询等待的上限（秒），同时作为配置校验的边界
pub const MAX_POLL_DELAY_SECS: f64 = 86_400.0;

/// 程序配置
///
/// 优先级：默认值 < TOML 配置文件 < 环境变量 < 命令行参数
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- LLM 配置 ---
    /// API 密钥，构建 provider 时必须存在
    pub api_key: Option<String>,
    /// 厂商名称
    pub provider: String,
    pub api_base_url: String,
    pub model_name: String,
    pub max_tokens: u32,
    /// 每条子请求共用的系统提示词
    pub system_prompt: String,
    /// 单次 HTTP 请求超时（秒）
    pub request_timeout_secs: u64,
    // --- 轮询配置 ---
    pub poll_initial_delay_secs: f64,
    pub poll_max_delay_secs: f64,
    pub poll_backoff_factor: f64,
    /// 查询状态出错时是否按退避继续重试（默认直接失败）
    pub poll_retry_on_error: bool,
    /// 轮询阶段的总等待上限（秒），不设置则一直等
    pub poll_timeout_secs: Option<u64>,
    // --- 文件配置 ---
    pub planning_file: String,
    pub results_dir: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: "anthropic".to_string(),
            api_base_url: "https://api.anthropic.com".to_string(),
            model_name: "claude-3-opus-20240229".to_string(),
            max_tokens: 4096,
            system_prompt: "You are an expert Python developer. Implement complete, production-ready code with error handling, documentation, and tests.".to_string(),
            request_timeout_secs: 60,
            poll_initial_delay_secs: 10.0,
            poll_max_delay_secs: 120.0,
            poll_backoff_factor: 1.5,
            poll_retry_on_error: false,
            poll_timeout_secs: None,
            planning_file: "PLANNING.md".to_string(),
            results_dir: "results".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 加载配置：可选的 TOML 文件，再叠加环境变量，最后校验
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match config_file {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    pub fn from_toml_str(content: &str, path: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::FileParseFailed {
            path: path.to_string(),
            source,
        })
    }

    /// 用给定的查找函数叠加环境变量
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ANTHROPIC_API_KEY").filter(|v| !v.trim().is_empty()) {
            self.api_key = Some(v);
        }
        if let Some(v) = lookup("LLM_PROVIDER") {
            self.provider = v;
        }
        if let Some(v) = lookup("ANTHROPIC_BASE_URL") {
            self.api_base_url = v;
        }
        if let Some(v) = lookup("MODEL_NAME") {
            self.model_name = v;
        }
        if let Some(v) = lookup("SYSTEM_PROMPT") {
            self.system_prompt = v;
        }
        if let Some(v) = lookup("PLANNING_FILE") {
            self.planning_file = v;
        }
        if let Some(v) = lookup("RESULTS_DIR") {
            self.results_dir = v;
        }

        parse_env(&lookup, "MAX_TOKENS", "u32", &mut self.max_tokens)?;
        parse_env(&lookup, "REQUEST_TIMEOUT_SECS", "u64", &mut self.request_timeout_secs)?;
        parse_env(&lookup, "POLL_INITIAL_DELAY_SECS", "f64", &mut self.poll_initial_delay_secs)?;
        parse_env(&lookup, "POLL_MAX_DELAY_SECS", "f64", &mut self.poll_max_delay_secs)?;
        parse_env(&lookup, "POLL_BACKOFF_FACTOR", "f64", &mut self.poll_backoff_factor)?;
        parse_env(&lookup, "POLL_RETRY_ON_ERROR", "bool", &mut self.poll_retry_on_error)?;
        parse_env(&lookup, "VERBOSE_LOGGING", "bool", &mut self.verbose_logging)?;

        if let Some(value) = lookup("POLL_TIMEOUT_SECS") {
            let mut secs = 0u64;
            parse_value("POLL_TIMEOUT_SECS", &value, "u64", &mut secs)?;
            self.poll_timeout_secs = Some(secs);
        }

        Ok(())
    }

    /// 校验取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, reason: String| {
            Err(ConfigError::InvalidValue {
                key: key.to_string(),
                reason,
            })
        };

        if !(self.poll_initial_delay_secs > 0.0 && self.poll_initial_delay_secs <= MAX_POLL_DELAY_SECS) {
            return invalid(
                "poll_initial_delay_secs",
                format!(
                    "必须在 (0, {}] 之间，当前为 {}",
                    MAX_POLL_DELAY_SECS, self.poll_initial_delay_secs
                ),
            );
        }
        if !(self.poll_max_delay_secs <= MAX_POLL_DELAY_SECS) {
            return invalid(
                "poll_max_delay_secs",
                format!(
                    "不能超过 {}，当前为 {}",
                    MAX_POLL_DELAY_SECS, self.poll_max_delay_secs
                ),
            );
        }
        if !(self.poll_max_delay_secs >= self.poll_initial_delay_secs) {
            return invalid(
                "poll_max_delay_secs",
                format!(
                    "必须不小于初始间隔 {}，当前为 {}",
                    self.poll_initial_delay_secs, self.poll_max_delay_secs
                ),
            );
        }
        if !(self.poll_backoff_factor > 1.0) || !self.poll_backoff_factor.is_finite() {
            return invalid(
                "poll_backoff_factor",
                format!("必须大于 1，当前为 {}", self.poll_backoff_factor),
            );
        }
        if self.max_tokens == 0 {
            return invalid("max_tokens", "必须大于 0".to_string());
        }
        if self.poll_timeout_secs == Some(0) {
            return invalid("poll_timeout_secs", "必须大于 0".to_string());
        }
        Ok(())
    }

    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            model: self.model_name.clone(),
            max_tokens: self.max_tokens,
            system_prompt: self.system_prompt.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_timeout(&self) -> Option<Duration> {
        self.poll_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_env<F, T>(
    lookup: &F,
    var_name: &str,
    expected_type: &str,
    target: &mut T,
) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var_name) {
        Some(value) => parse_value(var_name, &value, expected_type, target),
        None => Ok(()),
    }
}

fn parse_value<T: FromStr>(
    var_name: &str,
    value: &str,
    expected_type: &str,
    target: &mut T,
) -> Result<(), ConfigError> {
    *target = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::EnvVarParseFailed {
            var_name: var_name.to_string(),
            value: value.to_string(),
            expected_type: expected_type.to_string(),
        })?;
    Ok(())
}
