//! 错误类型
//!
//! BackendError 描述一次网络调用的失败（传输、非 2xx、解码）；
//! HarnessError 是库对外的统一错误：缺字段在发起网络调用前拒绝，
//! 传输失败在 send/approve 中被转换为合成的错误对话条目，不会以 Err 返回。

use thiserror::Error;

/// 与后端 / 脚本服务 / 文档存储交互时的失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Decode error: {0}")]
    Decode(String),

    /// 当前环境没有配置 base URL
    #[error("No base URL configured for environment: {0}")]
    UnconfiguredEnvironment(String),
}

impl BackendError {
    /// 给对话记录里合成错误条目用的可读文本
    pub fn reason(&self) -> String {
        match self {
            BackendError::Transport(msg) | BackendError::Decode(msg) => msg.clone(),
            BackendError::Status { status, .. } => format!("backend responded with HTTP {}", status),
            BackendError::UnconfiguredEnvironment(env) => {
                format!("no backend configured for environment '{}'", env)
            }
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}

/// 测试台运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum HarnessError {
    /// 用户操作缺少必填字段（如审批时没有 payment_request_id）
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Unknown element kind: {0}")]
    UnknownElementKind(String),

    #[error("Unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("No saved request named: {0}")]
    UnknownSavedRequest(String),

    #[error("Settings I/O error: {0}")]
    SettingsIo(#[from] std::io::Error),

    #[error("Settings serialization error: {0}")]
    SettingsFormat(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// 命令行输入输出失败（如终端已关闭）
    #[error("Terminal I/O error: {0}")]
    Terminal(#[source] std::io::Error),
}
