//! 错误类型：模型回复解析错误与任务引擎错误
//!
//! 解析错误永远在本地恢复（携带原始回复便于诊断），不会让探索循环崩溃；
//! 任务错误只影响出错的那个 Job，停止相关错误同步返回给调用方且不改变任何状态。

use thiserror::Error;

use crate::jobs::JobStatus;

/// 模型回复解析失败（所有变体都保留原始回复文本）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// 必需的标签（如 `Action:`）在回复中不存在
    #[error("Missing field: {label}")]
    MissingField { label: String, raw: String },

    #[error("Undefined action: {name}")]
    UnrecognizedAction { name: String, raw: String },

    #[error("Undefined decision: {decision}")]
    UnrecognizedDecision { decision: String, raw: String },

    /// 括号内参数个数或类型不对、括号/引号未闭合
    #[error("Malformed arguments for {action}: {detail}")]
    MalformedArguments {
        action: String,
        detail: String,
        raw: String,
    },
}

impl ParseError {
    /// 出错的原始回复
    pub fn raw(&self) -> &str {
        match self {
            ParseError::MissingField { raw, .. }
            | ParseError::UnrecognizedAction { raw, .. }
            | ParseError::UnrecognizedDecision { raw, .. }
            | ParseError::MalformedArguments { raw, .. } => raw,
        }
    }
}

/// 任务引擎错误
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job already finished with status: {0}")]
    JobAlreadyFinished(JobStatus),

    /// 创建任务时的参数校验失败（模式不支持、缺应用名、缺任务描述）
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Failed to launch `{program}`: {source}")]
    ProcessLaunchFailure {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command exited with status {0}.")]
    NonZeroExit(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
