use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::core::{
    self,
    error::LzwError,
    job::{Direction, JobSettings, MaxBits, Upload},
    runner::{Engine, ProcessEngine},
    workspace::Workspace,
};

pub mod page;
pub mod session;


use page::{Notice, PanelView};
use session::{resolve_session, session_cookie, SessionState, SessionStore};

pub struct AppState {
    pub workspace: Arc<Workspace>,
    pub engine: Arc<dyn Engine>,
    pub sessions: SessionStore,
    /// Held for the duration of an engine run; jobs never overlap.
    pub job_gate: Arc<Mutex<()>>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(workspace: Workspace, engine: Arc<dyn Engine>, max_upload_bytes: usize) -> Self {
        Self {
            workspace: Arc::new(workspace),
            engine,
            sessions: SessionStore::new(),
            job_gate: Arc::new(Mutex::new(())),
            max_upload_bytes,
        }
    }
}

pub async fn serve(settings: &Settings) -> anyhow::Result<()> {
    let workspace = Workspace::new(&settings.workspace_root);
    workspace.ensure_all()?;
    let engine = ProcessEngine::new(&settings.engine_path).with_timeout(settings.engine_timeout());
    let state = AppState::new(workspace, Arc::new(engine), settings.max_upload_bytes);
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(
        %addr,
        workspace = %settings.workspace_root.display(),
        engine = %settings.engine_path.display(),
        "control panel listening"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let limit = state.max_upload_bytes;
    Router::new()
        .route("/", get(panel))
        .route("/jobs", post(submit_job))
        .route("/result", get(result_summary))
        .route("/result/artifact", get(download_artifact))
        .route("/result/stats", get(stats_report))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn panel(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (session, minted) = resolve_session(&headers);
    let view = build_view(state.sessions.snapshot(session), None).await;
    respond(StatusCode::OK, view, session, minted)
}

async fn submit_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let (session, minted) = resolve_session(&headers);

    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err((status, message)) => {
            warn!(%message, "unreadable job form");
            let view = build_view(state.sessions.snapshot(session), Some(Notice::Error(message))).await;
            return respond(status, view, session, minted);
        }
    };

    let settings = match form.settings() {
        Ok(settings) => settings,
        Err(err) => return reject(&state, session, minted, err).await,
    };
    // A fresh session only gets an entry once it has a job to show.
    if !minted {
        state.sessions.remember_settings(session, settings);
    }

    let (job, upload) = match core::prepare(form.upload, settings) {
        Ok(prepared) => prepared,
        Err(err) => return reject(&state, session, minted, err).await,
    };

    // The worker owns the gate and the cache write, so a client that goes
    // away mid-run neither lets another job in early nor loses the result.
    let gate = Arc::clone(&state.job_gate).lock_owned().await;
    let worker = Arc::clone(&state);
    let outcome = tokio::task::spawn_blocking(move || {
        let _gate = gate;
        let result = core::execute(&worker.workspace, worker.engine.as_ref(), &job, &upload.bytes);
        let succeeded = result.succeeded;
        worker.sessions.record(session, settings, result);
        succeeded
    })
    .await;

    let notice = match outcome {
        Ok(true) => Notice::Success("Process completed successfully.".to_string()),
        Ok(false) => Notice::Error("The engine reported an error.".to_string()),
        Err(err) => {
            error!(%err, "job worker panicked");
            let view = build_view(
                state.sessions.snapshot(session),
                Some(Notice::Error("the job could not be completed".to_string())),
            )
            .await;
            return respond(StatusCode::INTERNAL_SERVER_ERROR, view, session, minted);
        }
    };

    let view = build_view(state.sessions.snapshot(session), Some(notice)).await;
    respond(StatusCode::OK, view, session, minted)
}

async fn result_summary(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (session, minted) = resolve_session(&headers);
    let snapshot = state.sessions.snapshot(session);
    let response = Json(snapshot.cache.current().cloned()).into_response();
    with_cookie(response, session, minted)
}

async fn download_artifact(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (session, _) = resolve_session(&headers);
    let cache = state.sessions.snapshot(session).cache;

    let read = tokio::task::spawn_blocking(move || cache.read_artifact()).await;
    match read {
        Ok(Ok(Some((name, bytes)))) => {
            let mut headers = HeaderMap::new();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            );
            let disposition = format!("attachment; filename=\"{}\"", name.replace(['"', '\\'], "_"));
            if let Ok(value) = HeaderValue::from_str(&disposition) {
                headers.insert(header::CONTENT_DISPOSITION, value);
            }
            (StatusCode::OK, headers, bytes).into_response()
        }
        Ok(Ok(None)) => (StatusCode::NOT_FOUND, "no result available").into_response(),
        Ok(Err(err @ LzwError::ArtifactMissing { .. })) => {
            warn!(%err, "download requested for a missing artifact");
            (StatusCode::NOT_FOUND, err.to_string()).into_response()
        }
        Ok(Err(err)) => {
            error!(%err, "failed to read artifact");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
        Err(err) => {
            error!(%err, "artifact reader panicked");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn stats_report(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (session, _) = resolve_session(&headers);
    let cache = state.sessions.snapshot(session).cache;

    let read = tokio::task::spawn_blocking(move || cache.read_stats()).await;
    match read {
        Ok(Ok(Some(report))) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            report.text(),
        )
            .into_response(),
        Ok(Ok(None)) => (StatusCode::NOT_FOUND, "no stats report available").into_response(),
        Ok(Err(err)) => {
            error!(%err, "failed to read stats report");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
        Err(err) => {
            error!(%err, "stats reader panicked");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn reject(state: &AppState, session: Uuid, minted: bool, err: LzwError) -> Response {
    let status = if err.is_rejection() {
        warn!(%err, "submission rejected");
        StatusCode::BAD_REQUEST
    } else {
        error!(%err, "submission failed");
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let notice = match err {
        LzwError::MissingInput => Notice::Warning("Please upload a file.".to_string()),
        other => Notice::Error(other.to_string()),
    };
    let view = build_view(state.sessions.snapshot(session), Some(notice)).await;
    respond(status, view, session, minted)
}

async fn build_view(snapshot: SessionState, notice: Option<Notice>) -> PanelView {
    let SessionState { cache, last_settings } = snapshot;
    let Some(result) = cache.current().cloned() else {
        return PanelView {
            settings: last_settings,
            notice,
            ..PanelView::default()
        };
    };

    let (artifact_size, stats) = tokio::task::spawn_blocking(move || {
        let artifact_size = cache
            .current()
            .and_then(|r| r.result_path.as_ref())
            .and_then(|path| std::fs::metadata(path).ok())
            .map(|meta| meta.len());
        let stats = cache.read_stats().unwrap_or_else(|err| {
            warn!(%err, "stats report unreadable");
            None
        });
        (artifact_size, stats)
    })
    .await
    .unwrap_or_default();

    PanelView {
        settings: last_settings,
        notice,
        result: Some(result),
        artifact_size,
        stats,
    }
}

fn respond(status: StatusCode, view: PanelView, session: Uuid, minted: bool) -> Response {
    let response = (status, Html(page::render_panel(&view))).into_response();
    with_cookie(response, session, minted)
}

fn with_cookie(mut response: Response, session: Uuid, minted: bool) -> Response {
    if minted {
        response
            .headers_mut()
            .insert(header::SET_COOKIE, session_cookie(session));
    }
    response
}

#[derive(Debug, Default)]
struct JobForm {
    direction: Option<String>,
    max_bits: Option<String>,
    fixed: bool,
    stats: bool,
    upload: Option<Upload>,
}

impl JobForm {
    fn settings(&self) -> Result<JobSettings, LzwError> {
        let direction = match self.direction.as_deref() {
            Some(raw) => raw.parse::<Direction>()?,
            None => Direction::Compress,
        };
        let max_bits = match self.max_bits.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                let value = raw
                    .parse::<u32>()
                    .map_err(|_| LzwError::invalid(format!("max bits must be a number, got '{raw}'")))?;
                MaxBits::new(value)?
            }
            _ => MaxBits::default(),
        };
        Ok(JobSettings {
            direction,
            max_bits,
            fixed_table: self.fixed,
            collect_stats: self.stats,
        })
    }
}

async fn read_form(mut multipart: Multipart) -> Result<JobForm, (StatusCode, String)> {
    let mut form = JobForm::default();

    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|err| (err.status(), err.body_text()))?;
        let Some(field) = field else {
            break;
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field
                    .file_name()
                    .map(client_file_name)
                    .unwrap_or_default();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| (err.status(), err.body_text()))?;
                // Browsers send an empty part when no file was chosen.
                if !filename.is_empty() {
                    form.upload = Some(Upload::new(filename, bytes.to_vec()));
                }
            }
            "direction" | "max_bits" | "fixed" | "stats" => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| (err.status(), err.body_text()))?;
                match name.as_str() {
                    "direction" => form.direction = Some(value),
                    "max_bits" => form.max_bits = Some(value),
                    "fixed" => form.fixed = is_checked(&value),
                    _ => form.stats = is_checked(&value),
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Some browsers send the full client-side path; only the last component matters.
fn client_file_name(raw: &str) -> String {
    raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim().to_string()
}

fn is_checked(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "on" | "true" | "1" | "yes")
}
