//! Thin HTTP entry point. Authenticates requests, deserializes JSON into
//! the core's [`contest_judge::Submission`], and calls straight into the
//! judge pipeline — it does not implement sandboxing, heartbeat reporting,
//! or test-case persistence itself (named external collaborators).

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::error;

use contest_judge::config::JudgeConfig;
use contest_judge::sandbox::native::NativeSandbox;
use contest_judge::sandbox::Sandbox;
use contest_judge::types::{InlineTestCase, IoFilenames, IoMode, SpjSource, Submission, TestCaseSource};
use contest_judge::{languages, JudgeError};

struct AppState {
    config: Arc<JudgeConfig>,
    sandbox: Arc<dyn Sandbox>,
}

#[derive(Debug, Deserialize)]
struct InlineCaseRequest {
    input: String,
    output: String,
}

#[derive(Debug, Deserialize)]
struct IoModeRequest {
    io_mode: String,
    input: Option<String>,
    output: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JudgeRequest {
    language: String,
    src: String,
    max_cpu_time: i64,
    max_memory: i64,
    #[serde(default)]
    io_mode: Option<IoModeRequest>,
    #[serde(default)]
    test_case_id: Option<String>,
    #[serde(default)]
    test_case: Option<Vec<InlineCaseRequest>>,
    #[serde(default)]
    spj_version: Option<String>,
    #[serde(default)]
    spj_src: Option<String>,
    #[serde(default)]
    output: bool,
    #[serde(default = "default_true")]
    include_sample: bool,
}

fn default_true() -> bool {
    true
}

impl TryFrom<JudgeRequest> for Submission {
    type Error = JudgeError;

    fn try_from(req: JudgeRequest) -> Result<Self, Self::Error> {
        let has_id = req.test_case_id.is_some();
        let has_inline = req.test_case.is_some();
        if has_id == has_inline {
            return Err(JudgeError::JudgeClientError("invalid parameter".into()));
        }

        let test_cases = if let Some(id) = req.test_case_id {
            TestCaseSource::BundleId(id)
        } else {
            TestCaseSource::Inline(
                req.test_case
                    .unwrap_or_default()
                    .into_iter()
                    .map(|c| InlineTestCase { input: c.input, output: c.output })
                    .collect(),
            )
        };

        let (io_mode, io_filenames) = match req.io_mode {
            Some(m) if m.io_mode == "file" => {
                let input = m.input.ok_or_else(|| JudgeError::JudgeClientError("file io_mode requires input".into()))?;
                let output = m.output.ok_or_else(|| JudgeError::JudgeClientError("file io_mode requires output".into()))?;
                (IoMode::File, Some(IoFilenames { input, output }))
            }
            _ => (IoMode::Stdio, None),
        };

        Ok(Submission {
            language: req.language,
            source: req.src,
            max_cpu_time_ms: req.max_cpu_time,
            max_memory_bytes: req.max_memory,
            io_mode,
            io_filenames,
            test_cases,
            spj: req.spj_version.map(|version| SpjSource { version, src: req.spj_src }),
            capture_output: req.output,
            include_samples: req.include_sample,
        })
    }
}

#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    err: Option<&'static str>,
    data: T,
}

fn error_response(e: JudgeError) -> Response {
    error!(kind = e.kind_name(), message = %e.message(), "judge request failed");
    let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ApiResponse { err: Some(e.kind_name()), data: e.message() })).into_response()
}

async fn verify_token(config: &JudgeConfig, headers: &HeaderMap) -> Result<(), JudgeError> {
    let provided = headers
        .get("X-Judge-Server-Token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if provided != config.token_sha256 {
        return Err(JudgeError::TokenVerificationFailed("invalid token".into()));
    }
    Ok(())
}

async fn ping(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(e) = verify_token(&state.config, &headers).await {
        return error_response(e);
    }
    let hostname = nix::unistd::gethostname()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    let cpu_core = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    let body = serde_json::json!({
        "hostname": hostname,
        "cpu": 0.0,
        "cpu_core": cpu_core,
        "memory": 0.0,
        "judger_version": env!("CARGO_PKG_VERSION"),
        "action": "pong",
    });
    Json(ApiResponse { err: None, data: body }).into_response()
}

async fn judge(State(state): State<Arc<AppState>>, headers: HeaderMap, body: axum::body::Bytes) -> Response {
    if let Err(e) = verify_token(&state.config, &headers).await {
        return error_response(e);
    }
    let req: JudgeRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return error_response(JudgeError::JudgeClientError(e.to_string())),
    };
    let submission: Submission = match req.try_into() {
        Ok(s) => s,
        Err(e) => return error_response(e),
    };

    match contest_judge::judge(state.sandbox.clone(), state.config.clone(), submission).await {
        Ok(results) => Json(ApiResponse { err: None, data: results }).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct CompileSpjRequest {
    spj_version: String,
    src: String,
}

async fn compile_spj(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(req): Json<CompileSpjRequest>) -> Response {
    if let Err(e) = verify_token(&state.config, &headers).await {
        return error_response(e);
    }
    let config = state.config.clone();
    let sandbox = state.sandbox.clone();
    let result = tokio::task::spawn_blocking(move || {
        contest_judge::spj_compile::ensure_compiled(
            sandbox.as_ref(),
            &config,
            &req.spj_version,
            contest_judge::spj_compile::SpjLang::Cpp,
            Some(&req.src),
        )
    })
    .await;

    match result {
        Ok(Ok(())) => Json(ApiResponse { err: None, data: "success" }).into_response(),
        Ok(Err(e)) => error_response(e),
        Err(e) => error_response(JudgeError::JudgeClientError(format!("spj compile task panicked: {e}"))),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    languages::init_languages()?;
    let config = Arc::new(JudgeConfig::from_env()?);
    let sandbox: Arc<dyn Sandbox> = Arc::new(NativeSandbox::new());
    let state = Arc::new(AppState { config, sandbox });

    let app = Router::new()
        .route("/ping", post(ping))
        .route("/judge", post(judge))
        .route("/compile_spj", post(compile_spj))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
    tracing::info!("judge server listening on 0.0.0.0:8080");
    axum::serve(listener, app).await?;
    Ok(())
}
