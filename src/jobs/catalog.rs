//! 流水线目录：按模式为 Job 生成 1～2 条脚本命令
//!
//! - run：task_executor.py + 通用参数 + 任务描述 / 文档来源 / 无文档是否继续
//! - learn_auto：self_explorer.py + 通用参数 + 任务描述
//! - learn_demo：step_recorder.py 录制演示，再由 document_generation.py 生成文档

use std::path::PathBuf;

use chrono::{DateTime, Local};

use crate::jobs::command::{build_common_args, ScriptCommand};
use crate::jobs::job::{Job, JobMode};

pub const TASK_EXECUTOR: &str = "task_executor.py";
pub const SELF_EXPLORER: &str = "self_explorer.py";
pub const STEP_RECORDER: &str = "step_recorder.py";
pub const DOCUMENT_GENERATION: &str = "document_generation.py";

/// 人工演示的目录名：`demo_<app>_%Y-%m-%d_%H-%M-%S`
pub fn create_demo_name(app: &str, now: DateTime<Local>) -> String {
    format!("demo_{}_{}", app, now.format("%Y-%m-%d_%H-%M-%S"))
}

/// 脚本位置与解释器
#[derive(Debug, Clone)]
pub struct PipelineCatalog {
    interpreter: String,
    scripts_dir: PathBuf,
}

impl PipelineCatalog {
    pub fn new(interpreter: impl Into<String>, scripts_dir: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            scripts_dir: scripts_dir.into(),
        }
    }

    fn script(&self, name: &str, args: Vec<String>) -> ScriptCommand {
        let path = self.scripts_dir.join(name);
        ScriptCommand::new(path.to_string_lossy(), args).with_interpreter(self.interpreter.as_str())
    }

    /// 为 Job 生成命令流水线
    pub fn pipeline(&self, job: &Job) -> Vec<ScriptCommand> {
        match job.mode {
            JobMode::Run => {
                let mut args = build_common_args(&job.app_name, &job.root_dir);
                args.extend([
                    "--task_desc".to_string(),
                    job.task.clone(),
                    "--doc_source".to_string(),
                    job.doc_source.as_str().to_string(),
                    "--allow_no_docs".to_string(),
                    if job.allow_no_docs { "y" } else { "n" }.to_string(),
                ]);
                vec![self.script(TASK_EXECUTOR, args)]
            }
            JobMode::LearnAuto => {
                let mut args = build_common_args(&job.app_name, &job.root_dir);
                args.extend(["--task_desc".to_string(), job.task.clone()]);
                vec![self.script(SELF_EXPLORER, args)]
            }
            JobMode::LearnDemo => {
                let demo = job.demo_name.clone().unwrap_or_default();
                let args = vec![
                    "--app".to_string(),
                    job.app_name.clone(),
                    "--demo".to_string(),
                    demo,
                    "--root_dir".to_string(),
                    job.root_dir.clone(),
                ];
                vec![
                    self.script(STEP_RECORDER, args.clone()),
                    self.script(DOCUMENT_GENERATION, args),
                ]
            }
        }
    }
}

impl Default for PipelineCatalog {
    fn default() -> Self {
        Self::new("python3", "scripts")
    }
}
