//! 任务引擎：Job 注册表与生命周期
//!
//! - **job**: Job 记录、模式、状态机
//! - **command**: 脚本命令模型与通用参数
//! - **catalog**: 按模式生成命令流水线
//! - **store**: 锁保护的 Job 表
//! - **runner**: 后台 worker（子进程、日志流、协作式停止）
//! - **engine**: 控制面入口（创建、查询、停止）

pub mod catalog;
pub mod command;
pub mod engine;
pub mod job;
pub mod runner;
pub mod store;

pub use catalog::{create_demo_name, PipelineCatalog};
pub use command::{build_common_args, normalize_app_name, ScriptCommand};
pub use engine::JobEngine;
pub use job::{DocSource, Job, JobId, JobMode, JobRequest, JobStatus, JobStatusView, StopOutcome};
pub use runner::RunnerSettings;
pub use store::JobStore;
