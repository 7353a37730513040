//! Judge Orchestrator: the top-level entry point. Resolves the language,
//! acquires a workspace, compiles if needed, loads or materializes the
//! test-case manifest, and fans execution out across a worker pool sized
//! by CPU count.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::JudgeConfig;
use crate::error::{JudgeError, JudgeResult};
use crate::executor::{self, ExecutionContext};
use crate::languages::{self, LanguageProfile};
use crate::sandbox::Sandbox;
use crate::spj_compile::{self, SpjLang};
use crate::testcase_store;
use crate::types::{RunResult, Submission, TestCaseSource, Verdict};
use crate::workspace::Workspace;

/// Judges one submission end to end, returning the per-case results.
pub async fn judge(sandbox: Arc<dyn Sandbox>, config: Arc<JudgeConfig>, submission: Submission) -> JudgeResult<Vec<RunResult>> {
    let profile = languages::get_language(&submission.language)?;
    let submission_id = Uuid::new_v4().simple().to_string();
    let workspace = Workspace::acquire(&config, &submission_id)?;

    let spj_version = submission.spj.as_ref().map(|s| s.version.clone());
    if let Some(spj) = &submission.spj {
        let exe_path = spj_compile::artifact_path(&config, &spj.version);
        if !exe_path.exists() {
            let sandbox = sandbox.clone();
            let config2 = config.clone();
            let version = spj.version.clone();
            let src = spj.src.clone();
            tokio::task::spawn_blocking(move || {
                spj_compile::ensure_compiled(sandbox.as_ref(), &config2, &version, SpjLang::Cpp, src.as_deref())
            })
            .await
            .map_err(|e| JudgeError::JudgeClientError(format!("spj compile task panicked: {e}")))??;
        }
    }

    let exe_path = write_and_compile(sandbox.as_ref(), &config, &profile, workspace.path(), &submission.source)?;

    let (bundle_dir, manifest) = resolve_test_cases(&config, &workspace, &submission_id, &submission)?;

    info!(submission_id = %submission_id, language = %submission.language, cases = manifest.test_cases.len(), "dispatching test cases");

    let mut cases: Vec<_> = manifest.test_cases.into_iter().collect();
    if !submission.include_samples {
        cases.retain(|(_, c)| !c.is_sample);
    }

    let worker_count = config.worker_count.max(1);
    let semaphore = Arc::new(tokio::sync::Semaphore::new(worker_count));
    let mut handles = Vec::with_capacity(cases.len());

    for (case_id, case) in cases {
        let sandbox = sandbox.clone();
        let config = config.clone();
        let profile = profile.clone();
        let exe_path = exe_path.clone();
        let workspace_dir = workspace.path().to_path_buf();
        let bundle_dir = bundle_dir.clone();
        let io_mode = submission.io_mode;
        let io_filenames = submission.io_filenames.clone();
        let spj_version = spj_version.clone();
        let capture_output = submission.capture_output;
        let permit = semaphore.clone().acquire_owned().await.map_err(|e| {
            JudgeError::JudgeClientError(format!("worker pool closed: {e}"))
        })?;

        let handle_case_id = case_id.clone();
        let is_sample = case.is_sample;
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let ctx = ExecutionContext {
                sandbox: sandbox.as_ref(),
                config: &config,
                profile: &profile,
                exe_path: &exe_path,
                workspace_dir: &workspace_dir,
                max_cpu_ms: submission.max_cpu_time_ms,
                max_memory_bytes: submission.max_memory_bytes,
                io_mode,
                io_filenames: io_filenames.as_ref(),
                spj_version: spj_version.as_deref(),
                spj_lang: "cpp",
                capture_output,
            };
            executor::run_case(&ctx, &bundle_dir, &case_id, &case)
        });
        handles.push((handle_case_id, is_sample, handle));
    }

    // Per-case failures never abort the batch: a case whose sandbox
    // invocation itself errors out (staging failure, panic, ...) surfaces
    // as a SystemError RunResult for that case instead of failing the
    // whole submission.
    let mut results = Vec::with_capacity(handles.len());
    for (case_id, is_sample, handle) in handles {
        let error_kind = match handle.await {
            Ok(Ok(result)) => {
                results.push(result);
                continue;
            }
            Ok(Err(e)) => e.to_string(),
            Err(e) => format!("executor task panicked: {e}"),
        };
        results.push(RunResult {
            test_case: case_id,
            verdict: Verdict::SystemError,
            cpu_time_ms: 0,
            real_time_ms: 0,
            memory_bytes: 0,
            exit_code: -1,
            signal: 0,
            is_sample,
            output_md5: None,
            output: None,
            spj_output: None,
            error_kind: Some(error_kind),
        });
    }

    Ok(results)
}

fn write_and_compile(
    sandbox: &dyn Sandbox,
    config: &JudgeConfig,
    profile: &LanguageProfile,
    workspace_dir: &std::path::Path,
    source: &str,
) -> JudgeResult<PathBuf> {
    if profile.compiled {
        let src_path = workspace_dir.join(&profile.source_filename);
        crate::workspace::write_owned(&src_path, source.as_bytes(), config.compiler_uid, 0, 0o400)?;
        let exe_path = crate::compiler::compile(sandbox, config, profile, &src_path, workspace_dir)?;
        crate::workspace::hand_off_best_effort(&exe_path, config.run_uid, 0, 0o500);
        Ok(exe_path)
    } else {
        let exe_path = workspace_dir.join(&profile.exe_filename);
        std::fs::write(&exe_path, source.as_bytes())
            .map_err(|e| JudgeError::JudgeClientError(format!("failed to write source: {e}")))?;
        Ok(exe_path)
    }
}

fn resolve_test_cases(
    config: &JudgeConfig,
    workspace: &Workspace,
    submission_id: &str,
    submission: &Submission,
) -> JudgeResult<(PathBuf, crate::types::Manifest)> {
    match &submission.test_cases {
        TestCaseSource::BundleId(id) => {
            let dir = testcase_store::bundle_dir(config, id);
            let manifest = testcase_store::load_manifest(&dir)?;
            Ok((dir, manifest))
        }
        TestCaseSource::Inline(cases) => {
            let dir = workspace.path().join(format!("submission_{submission_id}"));
            let is_spj = submission.spj.is_some();
            if cases.is_empty() {
                warn!("inline test case list is empty");
            }
            let manifest = testcase_store::materialize_inline(&dir, cases, is_spj)?;
            Ok((dir, manifest))
        }
    }
}
