//! 批处理流程的阶段

use std::fmt;

/// 流程失败时所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Submit,
    Poll,
    FetchResults,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Submit => "submit",
            Stage::Poll => "poll",
            Stage::FetchResults => "fetch_results",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
