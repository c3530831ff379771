//! 任务引擎：控制面调用的全部入口
//!
//! - create_job：校验请求、生成流水线、后台启动 worker，立即返回 Job ID
//! - status / list：只读快照
//! - request_stop：协作式停止（queued 直接 stopped；running 置停止标记并通知 worker 终止子进程）
//!
//! 每个 Job 一个 tokio 任务，不做准入控制，同时运行的 Job 数量不设上限。

use std::sync::Arc;
use std::time::Duration;

use crate::config::JobsSection;
use crate::core::JobError;
use crate::jobs::catalog::{create_demo_name, PipelineCatalog};
use crate::jobs::command::{normalize_app_name, ScriptCommand};
use crate::jobs::job::{Job, JobId, JobMode, JobRequest, JobStatus, JobStatusView, StopOutcome};
use crate::jobs::runner::{run_job, RunnerSettings};
use crate::jobs::store::JobStore;

#[derive(Clone)]
pub struct JobEngine {
    store: Arc<JobStore>,
    catalog: Arc<PipelineCatalog>,
    settings: RunnerSettings,
    default_root_dir: String,
}

impl JobEngine {
    pub fn new(catalog: PipelineCatalog, settings: RunnerSettings) -> Self {
        Self {
            store: Arc::new(JobStore::new()),
            catalog: Arc::new(catalog),
            settings,
            default_root_dir: "./".to_string(),
        }
    }

    /// 从 [jobs] 配置段创建
    pub fn from_config(cfg: &JobsSection) -> Self {
        let settings = RunnerSettings {
            stop_grace: Duration::from_secs(cfg.stop_grace_secs),
            ..RunnerSettings::default()
        };
        let mut engine = Self::new(
            PipelineCatalog::new(cfg.interpreter.clone(), cfg.scripts_dir.clone()),
            settings,
        );
        engine.default_root_dir = cfg.default_root_dir.clone();
        engine
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// 校验并创建 Job，后台启动执行；不等待流水线
    pub async fn create_job(&self, request: JobRequest) -> Result<JobId, JobError> {
        let app_name = normalize_app_name(request.app.trim());
        if app_name.is_empty() {
            return Err(JobError::InvalidRequest("App name is required.".to_string()));
        }
        let task = request.task.trim().to_string();
        if request.mode.requires_task() && task.is_empty() {
            return Err(JobError::InvalidRequest(
                "Task description is required for this mode.".to_string(),
            ));
        }
        let root_dir = match request.root_dir.trim() {
            "" => self.default_root_dir.clone(),
            dir => dir.to_string(),
        };
        tokio::fs::create_dir_all(&root_dir).await?;

        let mut job = Job::new(request.mode, app_name, root_dir);
        job.task = task;
        job.doc_source = request.doc_source;
        job.allow_no_docs = request.allow_no_docs;
        if request.mode == JobMode::LearnDemo {
            let demo_name = request
                .demo_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| create_demo_name(&job.app_name, chrono::Local::now()));
            job.demo_name = Some(demo_name);
        }

        let pipeline = self.catalog.pipeline(&job);
        Ok(self.submit(job, pipeline).await)
    }

    /// 登记 Job 并以给定流水线后台执行（fire-and-forget）
    pub async fn submit(&self, job: Job, pipeline: Vec<ScriptCommand>) -> JobId {
        let job_id = job.id.clone();
        tracing::info!(job_id = %job_id, mode = %job.mode, app = %job.app_name, "job created");
        self.store.upsert(job).await;

        tokio::spawn(run_job(
            Arc::clone(&self.store),
            job_id.clone(),
            pipeline,
            self.settings,
        ));
        job_id
    }

    pub async fn status(&self, job_id: &str) -> Option<JobStatusView> {
        self.store.read(job_id, Job::status_view).await
    }

    pub async fn get(&self, job_id: &str) -> Option<Job> {
        self.store.get(job_id).await
    }

    pub async fn list(&self) -> Vec<Job> {
        self.store.list().await
    }

    /// 请求停止；未知 ID 或已结束的 Job 返回错误且不改变任何状态
    pub async fn request_stop(&self, job_id: &str) -> Result<StopOutcome, JobError> {
        let outcome = self
            .store
            .with_job(job_id, |job| match job.status {
                JobStatus::Succeeded | JobStatus::Failed | JobStatus::Stopped => {
                    Err(JobError::JobAlreadyFinished(job.status))
                }
                JobStatus::Queued => {
                    job.stop_requested = true;
                    job.stop_token.cancel();
                    job.log("Stop requested before execution.");
                    job.finish(JobStatus::Stopped);
                    Ok(StopOutcome::StoppedBeforeStart)
                }
                JobStatus::Running => {
                    job.stop_requested = true;
                    job.status = JobStatus::Stopping;
                    job.log("Stop requested by user.");
                    job.stop_token.cancel();
                    Ok(StopOutcome::StopRequested)
                }
                JobStatus::Stopping => Ok(StopOutcome::AlreadyStopping),
            })
            .await
            .ok_or_else(|| JobError::JobNotFound(job_id.to_string()))??;

        tracing::info!(job_id = %job_id, outcome = ?outcome, "stop requested");
        Ok(outcome)
    }

    /// 停止所有未结束的 Job（关闭时调用），返回发出停止请求的数量
    pub async fn stop_all(&self) -> usize {
        let mut stopped = 0;
        for job in self.store.list().await {
            if job.is_finished() {
                continue;
            }
            if let Ok(StopOutcome::StoppedBeforeStart | StopOutcome::StopRequested) =
                self.request_stop(&job.id).await
            {
                stopped += 1;
            }
        }
        stopped
    }

    /// 等待所有 Job 进入终态；超时返回 false
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.store.list().await.iter().all(Job::is_finished) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// 停止宽限期（关闭时据此等待 worker 收尾）
    pub fn stop_grace(&self) -> Duration {
        self.settings.stop_grace
    }
}

impl Default for JobEngine {
    fn default() -> Self {
        Self::new(PipelineCatalog::default(), RunnerSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::job::DocSource;

    fn engine() -> JobEngine {
        JobEngine::new(
            PipelineCatalog::new("", "scripts"),
            RunnerSettings {
                stop_grace: Duration::from_millis(500),
                drain_grace: Duration::from_millis(200),
            },
        )
    }

    /// 登记一个不会被 worker 取走的 queued Job
    async fn queued_job(engine: &JobEngine) -> JobId {
        let job = Job::new(JobMode::Run, "DemoApp", "./");
        let id = job.id.clone();
        engine.store().upsert(job).await;
        id
    }

    #[tokio::test]
    async fn test_create_job_validation() {
        let engine = engine();
        let err = engine
            .create_job(JobRequest::new(JobMode::Run, "  ").with_task("t"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "App name is required.");

        let err = engine
            .create_job(JobRequest::new(JobMode::LearnAuto, "DemoApp"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Task description is required for this mode.");
        assert!(engine.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_create_job_normalizes_and_creates_root_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("nested/root");
        let engine = engine();
        let id = engine
            .create_job(
                JobRequest::new(JobMode::LearnDemo, "My App")
                    .with_root_dir(root.to_string_lossy())
                    .with_doc_source(DocSource::None, true),
            )
            .await
            .unwrap();

        assert!(root.is_dir());
        let job = engine.get(&id).await.unwrap();
        assert_eq!(job.app_name, "MyApp");
        assert_eq!(job.doc_source, DocSource::None);
        assert!(job.demo_name.unwrap().starts_with("demo_MyApp_"));
    }

    #[tokio::test]
    async fn test_create_job_uses_given_demo_name() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = engine();
        let request = |name: &str| {
            JobRequest::new(JobMode::LearnDemo, "DemoApp")
                .with_root_dir(tmp.path().to_string_lossy())
                .with_demo_name(name)
        };

        let id = engine.create_job(request(" demo_login ")).await.unwrap();
        let job = engine.get(&id).await.unwrap();
        assert_eq!(job.demo_name.as_deref(), Some("demo_login"));

        let id = engine.create_job(request("   ")).await.unwrap();
        let job = engine.get(&id).await.unwrap();
        assert!(job.demo_name.unwrap().starts_with("demo_DemoApp_"));

        let id = engine
            .create_job(
                JobRequest::new(JobMode::Run, "DemoApp")
                    .with_task("t")
                    .with_root_dir(tmp.path().to_string_lossy())
                    .with_demo_name("ignored"),
            )
            .await
            .unwrap();
        assert_eq!(engine.get(&id).await.unwrap().demo_name, None);
    }

    #[tokio::test]
    async fn test_stop_queued_job_is_synchronous() {
        let engine = engine();
        let id = queued_job(&engine).await;

        let outcome = engine.request_stop(&id).await.unwrap();
        assert_eq!(outcome, StopOutcome::StoppedBeforeStart);

        let view = engine.status(&id).await.unwrap();
        assert_eq!(view.status, JobStatus::Stopped);
        assert!(view.finished_at.is_some());
        assert_eq!(view.logs, vec!["Stop requested before execution."]);
    }

    #[tokio::test]
    async fn test_stop_errors_change_nothing() {
        let engine = engine();
        assert!(matches!(
            engine.request_stop("nope").await,
            Err(JobError::JobNotFound(_))
        ));

        let id = queued_job(&engine).await;
        engine
            .store()
            .with_job(&id, |job| job.finish(JobStatus::Succeeded))
            .await;
        let before = engine.get(&id).await.unwrap();

        let err = engine.request_stop(&id).await.unwrap_err();
        assert!(matches!(err, JobError::JobAlreadyFinished(JobStatus::Succeeded)));
        assert_eq!(err.to_string(), "Job already finished with status: succeeded");

        let after = engine.get(&id).await.unwrap();
        assert_eq!(after.status, JobStatus::Succeeded);
        assert_eq!(after.logs, before.logs);
        assert!(!after.stop_requested);
    }

    #[tokio::test]
    async fn test_stop_running_job_twice_logs_once() {
        let engine = engine();
        let id = queued_job(&engine).await;
        engine
            .store()
            .with_job(&id, |job| job.status = JobStatus::Running)
            .await;

        let (a, b) = tokio::join!(engine.request_stop(&id), engine.request_stop(&id));
        let mut outcomes = vec![a.unwrap(), b.unwrap()];
        outcomes.sort_by_key(|o| *o == StopOutcome::AlreadyStopping);
        assert_eq!(
            outcomes,
            vec![StopOutcome::StopRequested, StopOutcome::AlreadyStopping]
        );

        let job = engine.get(&id).await.unwrap();
        assert_eq!(job.status, JobStatus::Stopping);
        assert!(job.stop_token.is_cancelled());
        assert_eq!(
            job.logs.iter().filter(|l| l.as_str() == "Stop requested by user.").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_stop_all_skips_finished() {
        let engine = engine();
        let a = queued_job(&engine).await;
        let b = queued_job(&engine).await;
        engine
            .store()
            .with_job(&b, |job| job.finish(JobStatus::Failed))
            .await;

        assert!(!engine.wait_idle(Duration::from_millis(50)).await);
        assert_eq!(engine.stop_all().await, 1);
        assert_eq!(engine.status(&a).await.unwrap().status, JobStatus::Stopped);
        assert_eq!(engine.status(&b).await.unwrap().status, JobStatus::Failed);
        assert!(engine.wait_idle(Duration::from_millis(50)).await);
    }
}
