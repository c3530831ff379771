//! 后台 worker：按顺序执行 Job 的命令流水线
//!
//! - 每条命令是独立子进程，stdout / stderr 合并按到达顺序逐行追加到 Job 日志
//! - 启动每条命令前检查停止标记；运行中收到停止请求则发送终止信号（unix 为 SIGTERM），
//!   继续读取输出直到进程退出，超过宽限期仍未退出则强制 kill
//! - 进程退出后残留输出最多再读取一小段时间，避免孙进程占住管道导致 worker 挂起

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use crate::core::JobError;
use crate::jobs::command::ScriptCommand;
use crate::jobs::job::{now_millis, JobId, JobStatus};
use crate::jobs::store::JobStore;

/// worker 的时间参数
#[derive(Debug, Clone, Copy)]
pub struct RunnerSettings {
    /// 发送终止信号后等待进程退出的时间，超时强制 kill
    pub stop_grace: Duration,
    /// 进程退出后继续读取残留输出的上限
    pub drain_grace: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            stop_grace: Duration::from_secs(10),
            drain_grace: Duration::from_secs(2),
        }
    }
}

/// 执行一个 Job 的完整流水线；只应对每个 Job 调用一次
pub(crate) async fn run_job(
    store: Arc<JobStore>,
    job_id: JobId,
    pipeline: Vec<ScriptCommand>,
    settings: RunnerSettings,
) {
    let token = store
        .with_job(&job_id, |job| {
            if job.status != JobStatus::Queued {
                return None;
            }
            job.status = JobStatus::Running;
            job.started_at = Some(now_millis());
            Some(job.stop_token.clone())
        })
        .await
        .flatten();
    let Some(token) = token else {
        tracing::info!(job_id = %job_id, "job no longer queued, worker exits");
        return;
    };
    tracing::info!(job_id = %job_id, commands = pipeline.len(), "job started");

    for command in &pipeline {
        let launch = store
            .with_job(&job_id, |job| {
                if job.stop_requested {
                    job.log("Job stopped before launching next command.");
                    job.finish(JobStatus::Stopped);
                    false
                } else {
                    job.log(format!("$ {}", command.display()));
                    true
                }
            })
            .await
            .unwrap_or(false);
        if !launch {
            tracing::info!(job_id = %job_id, "job stopped before launching next command");
            return;
        }

        let result = run_command(&store, &job_id, command, &token, settings).await;

        let proceed = store
            .with_job(&job_id, |job| {
                if job.stop_requested {
                    job.log("Job stopped by user.");
                    job.finish(JobStatus::Stopped);
                    return false;
                }
                match &result {
                    Ok(status) if status.success() => return true,
                    Ok(status) => job.log(JobError::NonZeroExit(describe_exit(status)).to_string()),
                    Err(e) => job.log(e.to_string()),
                }
                job.finish(JobStatus::Failed);
                false
            })
            .await
            .unwrap_or(false);

        if !proceed {
            let status = store.get(&job_id).await.map(|j| j.status);
            tracing::info!(job_id = %job_id, status = ?status, "job finished");
            return;
        }
    }

    store
        .with_job(&job_id, |job| {
            if job.stop_requested {
                job.log("Job stopped by user.");
                job.finish(JobStatus::Stopped);
            } else {
                job.finish(JobStatus::Succeeded);
            }
        })
        .await;
    tracing::info!(job_id = %job_id, "job finished");
}

/// 启动单条命令并读取输出直到退出
async fn run_command(
    store: &JobStore,
    job_id: &str,
    command: &ScriptCommand,
    token: &tokio_util::sync::CancellationToken,
    settings: RunnerSettings,
) -> Result<ExitStatus, JobError> {
    let argv = command.to_argv();
    let Some((program, args)) = argv.split_first() else {
        return Err(JobError::InvalidRequest("empty command".to_string()));
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| JobError::ProcessLaunchFailure {
            program: program.clone(),
            source,
        })?;
    tracing::info!(job_id = %job_id, pid = ?child.id(), command = %command.display(), "command launched");

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_lines(stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_lines(stderr, tx.clone()));
    }
    drop(tx);

    let mut exit: Option<ExitStatus> = None;
    let mut output_open = true;
    let mut terminate_sent = false;
    let mut kill_at: Option<Instant> = None;
    let mut drain_until: Option<Instant> = None;

    while exit.is_none() || output_open {
        tokio::select! {
            line = rx.recv(), if output_open => match line {
                Some(line) => {
                    store.with_job(job_id, |job| job.log(line)).await;
                }
                None => output_open = false,
            },
            status = child.wait(), if exit.is_none() => {
                exit = Some(status?);
                kill_at = None;
                drain_until = Some(Instant::now() + settings.drain_grace);
            }
            _ = token.cancelled(), if !terminate_sent && exit.is_none() => {
                terminate_sent = true;
                kill_at = Some(Instant::now() + settings.stop_grace);
                match terminate(&mut child) {
                    Ok(()) => {
                        tracing::info!(job_id = %job_id, "sent terminate signal");
                        store.with_job(job_id, |job| job.log("Sent terminate signal.")).await;
                    }
                    Err(e) => tracing::warn!(job_id = %job_id, error = %e, "terminate signal failed"),
                }
            }
            _ = until(kill_at), if kill_at.is_some() => {
                kill_at = None;
                tracing::warn!(job_id = %job_id, grace = ?settings.stop_grace, "process ignored terminate signal, killing");
                if let Err(e) = child.start_kill() {
                    tracing::warn!(job_id = %job_id, error = %e, "kill failed");
                }
                let secs = settings.stop_grace.as_secs_f32();
                store
                    .with_job(job_id, |job| {
                        job.log(format!("Process still running {:.1}s after terminate signal; killed.", secs))
                    })
                    .await;
            }
            _ = until(drain_until), if drain_until.is_some() && output_open => {
                tracing::warn!(job_id = %job_id, "output still open after process exit, detaching");
                break;
            }
        }
    }

    match exit {
        Some(status) => Ok(status),
        None => Ok(child.wait().await?),
    }
}

/// 逐行转发子进程输出；非 UTF-8 字节按有损方式转换
async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\n', '\r'])
                    .to_string();
                if tx.send(line).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "reading process output failed");
                break;
            }
        }
    }
}

/// deadline 为 None 时永不完成
async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// 请求进程退出（尽力而为，不阻塞）
#[cfg(unix)]
fn terminate(child: &mut Child) -> std::io::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return Ok(());
    };
    let pid = i32::try_from(pid).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(std::io::Error::from)
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) -> std::io::Result<()> {
    child.start_kill()
}

fn describe_exit(status: &ExitStatus) -> String {
    if let Some(code) = status.code() {
        return code.to_string();
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("signal {}", signal);
        }
    }
    status.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::job::{Job, JobMode};

    async fn store_with(job: Job) -> (Arc<JobStore>, JobId) {
        let store = Arc::new(JobStore::new());
        let id = job.id.clone();
        store.upsert(job).await;
        (store, id)
    }

    #[tokio::test]
    async fn test_stop_flag_prevents_next_launch() {
        let mut job = Job::new(JobMode::LearnDemo, "DemoApp", "./");
        job.stop_requested = true;
        let (store, id) = store_with(job).await;

        let pipeline = vec![ScriptCommand::new("/nonexistent/never-launched", Vec::<String>::new())];
        run_job(Arc::clone(&store), id.clone(), pipeline, RunnerSettings::default()).await;

        let job = store.get(&id).await.unwrap();
        assert_eq!(job.status, JobStatus::Stopped);
        assert!(job.started_at.is_some());
        assert!(job.finished_at.is_some());
        assert_eq!(job.logs, vec!["Job stopped before launching next command."]);
    }

    #[tokio::test]
    async fn test_worker_ignores_job_that_is_not_queued() {
        let mut job = Job::new(JobMode::Run, "DemoApp", "./");
        job.finish(JobStatus::Stopped);
        let (store, id) = store_with(job).await;

        run_job(
            Arc::clone(&store),
            id.clone(),
            vec![ScriptCommand::new("sh", ["-c", "echo never"])],
            RunnerSettings::default(),
        )
        .await;

        let job = store.get(&id).await.unwrap();
        assert_eq!(job.status, JobStatus::Stopped);
        assert!(job.started_at.is_none());
        assert!(job.logs.is_empty());
    }

    #[test]
    fn test_non_zero_exit_message() {
        assert_eq!(
            JobError::NonZeroExit("2".into()).to_string(),
            "Command exited with status 2."
        );
    }
}
