//! AppAgent Web 控制台
//!
//! 入口：加载配置、初始化日志、创建任务引擎并启动 axum 服务。
//! 用法：`appagent [config.toml]`，环境变量 APPAGENT__* 可覆盖配置。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use appagent::{
    config::load_config,
    core::ShutdownManager,
    jobs::JobEngine,
    observability, web,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;
    observability::init(&cfg.log.level);

    let engine = JobEngine::from_config(&cfg.jobs);
    tracing::info!(
        interpreter = %cfg.jobs.interpreter,
        scripts_dir = %cfg.jobs.scripts_dir.display(),
        "job engine ready"
    );

    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();

    let app = web::router(engine.clone());
    let addr = cfg.web.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("AppAgent Web UI: http://{}", addr);

    let token = shutdown.token();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await
        .context("Web server failed")?;

    tracing::info!(reason = ?shutdown.reason(), "web server stopped, stopping jobs");
    let stopped = engine.stop_all().await;
    let idle = engine
        .wait_idle(engine.stop_grace() + std::time::Duration::from_secs(3))
        .await;
    tracing::info!(stopped, idle, "shutdown complete");
    Ok(())
}
