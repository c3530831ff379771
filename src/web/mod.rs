//! Web 控制台：启动 / 查看 / 停止 Job
//!
//! 路由：
//! - `GET /`：启动表单 + 最近的 Job
//! - `POST /start`：表单提交，成功后 303 跳转到 `/jobs/:id`
//! - `GET /jobs/:id`：Job 页面（轮询状态与日志）
//! - `GET /jobs/:id/status`：JSON 状态快照
//! - `POST /jobs/:id/stop`：请求停止
//! - `GET /api/health`

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;

use crate::core::JobError;
use crate::jobs::{DocSource, Job, JobEngine, JobMode, JobRequest, JobStatusView};

pub struct AppState {
    pub engine: JobEngine,
}

/// 构建路由（main 与测试共用）
pub fn router(engine: JobEngine) -> Router {
    let state = Arc::new(AppState { engine });
    Router::new()
        .route("/", get(index))
        .route("/start", post(start_job))
        .route("/jobs/:id", get(job_page))
        .route("/jobs/:id/status", get(job_status))
        .route("/jobs/:id/stop", post(stop_job))
        .route("/api/health", get(|| async { "OK" }))
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

impl IntoResponse for JobError {
    fn into_response(self) -> Response {
        let status = match &self {
            JobError::JobNotFound(_) => StatusCode::NOT_FOUND,
            JobError::JobAlreadyFinished(_) => StatusCode::CONFLICT,
            JobError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            JobError::ProcessLaunchFailure { .. } | JobError::NonZeroExit(_) | JobError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        error_response(status, self.to_string())
    }
}

/// 启动表单；复选框未勾选时浏览器不提交该字段
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StartForm {
    pub mode: String,
    pub app: String,
    pub task: String,
    pub root_dir: String,
    pub demo_name: String,
    pub doc_source: String,
    pub allow_no_docs: Option<String>,
}

impl StartForm {
    fn into_request(self) -> Result<JobRequest, JobError> {
        let mode: JobMode = self.mode.parse()?;
        let doc_source: DocSource = self.doc_source.parse()?;
        let allow_no_docs = matches!(
            self.allow_no_docs.as_deref().map(str::trim),
            Some("y" | "yes" | "on" | "true" | "1")
        );
        let mut request = JobRequest::new(mode, self.app)
            .with_task(self.task)
            .with_root_dir(self.root_dir)
            .with_doc_source(doc_source, allow_no_docs);
        if !self.demo_name.trim().is_empty() {
            request = request.with_demo_name(self.demo_name);
        }
        Ok(request)
    }
}

async fn start_job(
    State(state): State<Arc<AppState>>,
    Form(form): Form<StartForm>,
) -> Result<Redirect, JobError> {
    let request = form.into_request()?;
    let job_id = state.engine.create_job(request).await.map_err(|e| {
        tracing::warn!(error = %e, "start job rejected");
        e
    })?;
    Ok(Redirect::to(&format!("/jobs/{}", job_id)))
}

async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusView>, JobError> {
    state
        .engine
        .status(&job_id)
        .await
        .map(Json)
        .ok_or(JobError::JobNotFound(job_id))
}

async fn stop_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<serde_json::Value>, JobError> {
    let outcome = state.engine.request_stop(&job_id).await?;
    Ok(Json(serde_json::json!({
        "ok": true,
        "message": outcome.message(),
    })))
}

async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let jobs = state.engine.list().await;
    Html(render_index(&jobs))
}

async fn job_page(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Html<String>, Response> {
    match state.engine.get(&job_id).await {
        Some(job) => Ok(Html(render_job(&job))),
        None => Err((StatusCode::NOT_FOUND, Html("<h1>Job not found</h1>".to_string())).into_response()),
    }
}

/// 转义用户输入，防止注入页面
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn format_millis(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|t| {
            t.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_default()
}

const STYLE: &str = "body{font-family:sans-serif;max-width:960px;margin:2em auto;padding:0 1em}\
table{border-collapse:collapse;width:100%}td,th{border:1px solid #ccc;padding:4px 8px;text-align:left}\
label{display:block;margin:.5em 0}pre{background:#111;color:#ddd;padding:1em;max-height:60vh;overflow:auto}";

fn render_index(jobs: &[Job]) -> String {
    let rows: String = jobs
        .iter()
        .map(|job| {
            format!(
                "<tr><td><a href=\"/jobs/{id}\">{short}</a></td><td>{mode}</td><td>{app}</td><td>{task}</td><td>{status}</td><td>{created}</td></tr>",
                id = escape_html(&job.id),
                short = escape_html(job.id.get(..8).unwrap_or(&job.id)),
                mode = job.mode,
                app = escape_html(&job.app_name),
                task = escape_html(&job.task),
                status = job.status,
                created = format_millis(job.created_at),
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>AppAgent</title><style>{style}</style></head>
<body>
<h1>AppAgent</h1>
<form method="post" action="/start">
  <label>Mode
    <select name="mode">
      <option value="learn_auto">Exploration: autonomous</option>
      <option value="learn_demo">Exploration: human demonstration</option>
      <option value="run">Deployment: run task</option>
    </select>
  </label>
  <label>App <input name="app" required></label>
  <label>Task <input name="task" size="60"></label>
  <label>Root dir <input name="root_dir" placeholder="./"></label>
  <label>Demo name <input name="demo_name" placeholder="generated when empty"></label>
  <label>Docs
    <select name="doc_source">
      <option value="auto_select">ask script</option>
      <option value="auto">autonomous exploration</option>
      <option value="demo">human demonstration</option>
      <option value="none">none</option>
    </select>
  </label>
  <label><input type="checkbox" name="allow_no_docs" value="y"> continue without docs</label>
  <button type="submit">Start</button>
</form>
<h2>Jobs</h2>
<table>
<tr><th>ID</th><th>Mode</th><th>App</th><th>Task</th><th>Status</th><th>Created</th></tr>
{rows}
</table>
</body></html>"#,
        style = STYLE,
        rows = rows,
    )
}

fn render_job(job: &Job) -> String {
    let logs = escape_html(&job.logs.join("\n"));
    let id = escape_html(&job.id);
    format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Job {id}</title><style>{style}</style></head>
<body>
<p><a href="/">&larr; back</a></p>
<h1>{mode}: {app}</h1>
<p>Task: {task}</p>
<p>Status: <strong id="status">{status}</strong>
  <button id="stop" onclick="stopJob()">Stop</button></p>
<pre id="logs">{logs}</pre>
<script>
const jobId = "{id}";
const finished = ["succeeded", "failed", "stopped"];
async function refresh() {{
  const res = await fetch(`/jobs/${{jobId}}/status`);
  if (!res.ok) return;
  const view = await res.json();
  document.getElementById("status").textContent = view.status;
  const pre = document.getElementById("logs");
  pre.textContent = view.logs.join("\n");
  pre.scrollTop = pre.scrollHeight;
  if (finished.includes(view.status)) {{
    document.getElementById("stop").disabled = true;
  }} else {{
    setTimeout(refresh, 1000);
  }}
}}
async function stopJob() {{
  const res = await fetch(`/jobs/${{jobId}}/stop`, {{ method: "POST" }});
  const body = await res.json();
  if (!res.ok) alert(body.error);
}}
refresh();
</script>
</body></html>"#,
        id = id,
        style = STYLE,
        mode = job.mode,
        app = escape_html(&job.app_name),
        task = escape_html(&job.task),
        status = job.status,
        logs = logs,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{JobStatus, PipelineCatalog, RunnerSettings};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;

    fn engine() -> JobEngine {
        JobEngine::new(
            PipelineCatalog::new("", "/nonexistent/scripts"),
            RunnerSettings::default(),
        )
    }

    async fn queued(engine: &JobEngine) -> String {
        let mut job = Job::new(JobMode::Run, "<b>Demo</b>", "./");
        job.task = "say \"hi\"".into();
        let id = job.id.clone();
        engine.store().upsert(job).await;
        id
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post(uri: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#x27;Jerry&#x27;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_start_form_into_request() {
        let form = StartForm {
            mode: "run".into(),
            app: "Demo".into(),
            task: "t".into(),
            doc_source: "demo".into(),
            allow_no_docs: Some("y".into()),
            ..StartForm::default()
        };
        let request = form.into_request().unwrap();
        assert_eq!(request.mode, JobMode::Run);
        assert_eq!(request.demo_name, None);
        assert_eq!(request.doc_source, DocSource::Demo);
        assert!(request.allow_no_docs);

        let demo = StartForm {
            mode: "learn_demo".into(),
            app: "Demo".into(),
            demo_name: "demo_login".into(),
            ..StartForm::default()
        };
        assert_eq!(
            demo.into_request().unwrap().demo_name.as_deref(),
            Some("demo_login")
        );

        let bad = StartForm {
            mode: "deploy".into(),
            ..StartForm::default()
        };
        assert!(matches!(bad.into_request(), Err(JobError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_health() {
        let response = router(engine()).oneshot(get_req("/api/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn test_start_redirects_to_job_page() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = engine();
        let body = format!(
            "mode=learn_auto&app=My+App&task=open+settings&root_dir={}",
            tmp.path().display()
        );
        let request = Request::builder()
            .method("POST")
            .uri("/start")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();

        let response = router(engine.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
        let id = location.strip_prefix("/jobs/").unwrap();

        let job = engine.get(id).await.unwrap();
        assert_eq!(job.app_name, "MyApp");
        assert_eq!(job.task, "open settings");
    }

    #[tokio::test]
    async fn test_start_rejects_missing_task() {
        let request = Request::builder()
            .method("POST")
            .uri("/start")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("mode=run&app=Demo"))
            .unwrap();
        let response = router(engine()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Task description is required for this mode.");
    }

    #[tokio::test]
    async fn test_status_and_not_found() {
        let engine = engine();
        let id = queued(&engine).await;
        let app = router(engine);

        let response = app
            .clone()
            .oneshot(get_req(&format!("/jobs/{}/status", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "queued");
        assert_eq!(json["mode"], "run");

        let response = app.oneshot(get_req("/jobs/missing/status")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stop_maps_errors() {
        let engine = engine();
        let id = queued(&engine).await;
        let app = router(engine.clone());

        let response = app
            .clone()
            .oneshot(post(&format!("/jobs/{}/stop", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["ok"], true);
        assert_eq!(json["message"], "Job stopped before execution");
        assert_eq!(engine.status(&id).await.unwrap().status, JobStatus::Stopped);

        let response = app
            .clone()
            .oneshot(post(&format!("/jobs/{}/stop", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app.oneshot(post("/jobs/missing/stop")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_pages_escape_user_input() {
        let engine = engine();
        let id = queued(&engine).await;
        let app = router(engine);

        let response = app.clone().oneshot(get_req("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = String::from_utf8(
            to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec(),
        )
        .unwrap();
        assert!(html.contains("&lt;b&gt;Demo&lt;/b&gt;"));
        assert!(!html.contains("<b>Demo</b>"));

        let response = app
            .clone()
            .oneshot(get_req(&format!("/jobs/{}", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = String::from_utf8(
            to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec(),
        )
        .unwrap();
        assert!(html.contains("say &quot;hi&quot;"));

        let response = app.oneshot(get_req("/jobs/missing")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
