//! Job 记录与状态机
//!
//! ```text
//! queued --start--> running --(全部成功)--> succeeded
//! queued --启动前停止--> stopped
//! running --命令失败--> failed
//! running --请求停止--> stopping --当前命令退出--> stopped
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::core::JobError;

/// Job ID（不透明、全局唯一）
pub type JobId = String;

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    /// 部署阶段：执行任务
    Run,
    /// 探索阶段：自主探索
    LearnAuto,
    /// 探索阶段：人工演示 + 文档生成
    LearnDemo,
}

impl JobMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobMode::Run => "run",
            JobMode::LearnAuto => "learn_auto",
            JobMode::LearnDemo => "learn_demo",
        }
    }

    /// 该模式是否必须提供任务描述
    pub fn requires_task(&self) -> bool {
        matches!(self, JobMode::Run | JobMode::LearnAuto)
    }
}

impl FromStr for JobMode {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "run" => Ok(JobMode::Run),
            "learn_auto" => Ok(JobMode::LearnAuto),
            "learn_demo" => Ok(JobMode::LearnDemo),
            _ => Err(JobError::InvalidRequest("Unsupported mode.".to_string())),
        }
    }
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 部署阶段使用的 UI 文档来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocSource {
    /// 由脚本交互选择
    #[default]
    AutoSelect,
    /// 自主探索生成的文档
    Auto,
    /// 人工演示生成的文档
    Demo,
    None,
}

impl DocSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocSource::AutoSelect => "auto_select",
            DocSource::Auto => "auto",
            DocSource::Demo => "demo",
            DocSource::None => "none",
        }
    }
}

impl FromStr for DocSource {
    type Err = JobError;

    /// 空串取默认值
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "auto_select" => Ok(DocSource::AutoSelect),
            "auto" => Ok(DocSource::Auto),
            "demo" => Ok(DocSource::Demo),
            "none" => Ok(DocSource::None),
            other => Err(JobError::InvalidRequest(format!(
                "Unsupported doc source: {}",
                other
            ))),
        }
    }
}

/// Job 状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    /// 已请求停止，等待当前命令退出
    Stopping,
    Succeeded,
    Failed,
    Stopped,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Stopping => "stopping",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Stopped => "stopped",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Stopped
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 创建 Job 的请求（来自控制面）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub mode: JobMode,
    pub app: String,
    #[serde(default)]
    pub root_dir: String,
    #[serde(default)]
    pub task: String,
    /// 仅 learn_demo 使用；为空时按应用名与当前时间生成
    #[serde(default)]
    pub demo_name: Option<String>,
    #[serde(default)]
    pub doc_source: DocSource,
    #[serde(default)]
    pub allow_no_docs: bool,
}

impl JobRequest {
    pub fn new(mode: JobMode, app: impl Into<String>) -> Self {
        Self {
            mode,
            app: app.into(),
            root_dir: String::new(),
            task: String::new(),
            demo_name: None,
            doc_source: DocSource::default(),
            allow_no_docs: false,
        }
    }

    pub fn with_demo_name(mut self, demo_name: impl Into<String>) -> Self {
        self.demo_name = Some(demo_name.into());
        self
    }

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = task.into();
        self
    }

    pub fn with_root_dir(mut self, root_dir: impl Into<String>) -> Self {
        self.root_dir = root_dir.into();
        self
    }

    pub fn with_doc_source(mut self, doc_source: DocSource, allow_no_docs: bool) -> Self {
        self.doc_source = doc_source;
        self.allow_no_docs = allow_no_docs;
        self
    }
}

/// 一次用户发起的探索 / 部署流程
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    pub mode: JobMode,
    pub app_name: String,
    pub root_dir: String,
    pub task: String,
    /// 仅 learn_demo 有值
    pub demo_name: Option<String>,
    pub doc_source: DocSource,
    pub allow_no_docs: bool,
    pub status: JobStatus,
    /// 毫秒时间戳
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub stop_requested: bool,
    /// 只追加的日志（子进程输出 + 生命周期事件）
    pub logs: Vec<String>,
    /// 停止信号：请求停止时取消，worker 据此终止当前子进程
    #[serde(skip)]
    pub(crate) stop_token: CancellationToken,
}

impl Job {
    pub fn new(mode: JobMode, app_name: impl Into<String>, root_dir: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            mode,
            app_name: app_name.into(),
            root_dir: root_dir.into(),
            task: String::new(),
            demo_name: None,
            doc_source: DocSource::default(),
            allow_no_docs: false,
            status: JobStatus::Queued,
            created_at: now_millis(),
            started_at: None,
            finished_at: None,
            stop_requested: false,
            logs: Vec::new(),
            stop_token: CancellationToken::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    /// 进入终态并记录完成时间
    pub fn finish(&mut self, status: JobStatus) {
        self.status = status;
        self.finished_at = Some(now_millis());
    }

    pub fn log(&mut self, line: impl Into<String>) {
        self.logs.push(line.into());
    }

    pub fn status_view(&self) -> JobStatusView {
        JobStatusView {
            id: self.id.clone(),
            mode: self.mode,
            status: self.status,
            logs: self.logs.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// 控制面轮询用的状态快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub id: JobId,
    pub mode: JobMode,
    pub status: JobStatus,
    pub logs: Vec<String>,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
}

/// 停止请求成功时的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// 尚未启动，已直接进入 stopped
    StoppedBeforeStart,
    /// 已发出停止请求，当前命令退出后进入 stopped
    StopRequested,
    /// 之前已请求过停止
    AlreadyStopping,
}

impl StopOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            StopOutcome::StoppedBeforeStart => "Job stopped before execution",
            StopOutcome::StopRequested => "Stop requested",
            StopOutcome::AlreadyStopping => "Stop already requested",
        }
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
