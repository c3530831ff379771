//! AppAgent - 手机应用智能体的控制核心
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、优雅关闭
//! - **jobs**: Job 注册表与生命周期（脚本流水线、日志流、协作式停止）
//! - **observability**: tracing 初始化
//! - **parser**: 模型回复解析（字段抽取、动作 / 反思语法）
//! - **web**: axum 控制台（feature `web`）

pub mod config;
pub mod core;
pub mod jobs;
pub mod observability;
pub mod parser;
#[cfg(feature = "web")]
pub mod web;

pub use jobs::{JobEngine, JobRequest, JobStatus};
pub use parser::{ActionCommand, ReflectionDecision};
