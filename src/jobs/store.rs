//! Job 存储：读写锁保护的内存表
//!
//! 对外只暴露窄接口：get / upsert / with_job / list。Job 的状态、日志、停止标记
//! 只在 with_job 的闭包中修改，worker 与停止请求之间不会看到撕裂的中间状态。
//! 不持久化，进程重启即清空。

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::jobs::job::{Job, JobId};

#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入或整体替换
    pub async fn upsert(&self, job: Job) {
        self.jobs.write().await.insert(job.id.clone(), job);
    }

    /// 快照（克隆）
    pub async fn get(&self, id: &str) -> Option<Job> {
        self.jobs.read().await.get(id).cloned()
    }

    /// 在读锁内读取 Job；id 不存在时返回 None
    pub async fn read<R>(&self, id: &str, f: impl FnOnce(&Job) -> R) -> Option<R> {
        self.jobs.read().await.get(id).map(f)
    }

    /// 在写锁内修改 Job；id 不存在时返回 None
    pub async fn with_job<R>(&self, id: &str, f: impl FnOnce(&mut Job) -> R) -> Option<R> {
        let mut jobs = self.jobs.write().await;
        jobs.get_mut(id).map(f)
    }

    /// 全部 Job 快照，最新创建的在前
    pub async fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}
