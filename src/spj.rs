//! SPJ Driver: stages copies of the case input and expected output under
//! the SPJ user, runs the checker, and interprets its exit code.

use std::path::Path;

use crate::config::JudgeConfig;
use crate::error::{JudgeError, JudgeResult};
use crate::languages::{self, LanguageProfile};
use crate::sandbox::{RunSpec, Sandbox, SeccompPolicy, UNLIMITED};
use crate::types::SandboxOutcome;
use crate::workspace;

const SPJ_AC: i32 = 0;
const SPJ_WA: i32 = 1;
const SPJ_ERROR: i32 = -1;

const SPJ_CPU_MULTIPLIER: i64 = 3;
const SPJ_REAL_MULTIPLIER: i64 = 9;
const SPJ_MEMORY_MULTIPLIER: i64 = 3;
const SPJ_STACK_BYTES: i64 = 128 * 1024 * 1024;
const SPJ_OUTPUT_CAP_BYTES: i64 = 1024 * 1024 * 1024;

/// The checker-execution half of [`LanguageProfile`] — checkers are always
/// C/C++, so only the command template and seccomp policy vary.
fn spj_run_profile(lang: &str) -> JudgeResult<LanguageProfile> {
    languages::spj_compile_profile(lang)
}

/// Outcome of running the SPJ checker against one test case.
pub enum SpjVerdict {
    Accepted,
    WrongAnswer,
    Error,
}

/// Runs the checker for `version` against `input_path`/`answer_path`,
/// comparing against `user_output_path`. The input and answer files are
/// first staged into `workspace_dir` under the SPJ user so the checker
/// never needs read access to the raw test-case bundle directory.
/// `user_output_path` is chowned to the SPJ user as a side effect, per the
/// workspace handoff invariant.
#[allow(clippy::too_many_arguments)]
pub fn run(
    sandbox: &dyn Sandbox,
    config: &JudgeConfig,
    lang: &str,
    version: &str,
    workspace_dir: &Path,
    case_id: &str,
    input_path: &Path,
    answer_path: &Path,
    user_output_path: &Path,
    submission_max_cpu_ms: i64,
    submission_max_memory_bytes: i64,
) -> JudgeResult<SpjVerdict> {
    let exe_path = crate::spj_compile::artifact_path(config, version);
    if !exe_path.exists() {
        return Err(JudgeError::JudgeClientError("spj exe not found".into()));
    }

    workspace::hand_off(workspace_dir, config.spj_uid, 0, 0o711)?;
    workspace::hand_off(user_output_path, config.spj_uid, 0, 0o740)?;

    let staged_input = workspace_dir.join(format!("std{case_id}.in"));
    let staged_answer = workspace_dir.join(format!("std{case_id}.out"));
    std::fs::copy(input_path, &staged_input)
        .map_err(|e| JudgeError::JudgeClientError(format!("failed to stage spj input: {e}")))?;
    std::fs::copy(answer_path, &staged_answer)
        .map_err(|e| JudgeError::JudgeClientError(format!("failed to stage spj answer: {e}")))?;
    workspace::hand_off(&staged_input, config.spj_uid, 0, 0o440)?;
    workspace::hand_off(&staged_answer, config.spj_uid, 0, 0o440)?;

    let profile = spj_run_profile(lang)?;
    let command = profile
        .execute_cmd_template
        .replace("{exe_path}", &exe_path.to_string_lossy())
        .replace("{in_file_path}", &staged_input.to_string_lossy())
        .replace("{user_out_file_path}", &user_output_path.to_string_lossy())
        .replace("{ans_file_path}", &staged_answer.to_string_lossy());
    let argv = crate::compiler::split_command(&command)?;
    let (exe, args) = argv.split_first().ok_or_else(|| JudgeError::JudgeClientError("empty spj command".into()))?;

    let spec = RunSpec {
        max_cpu_time_ms: submission_max_cpu_ms * SPJ_CPU_MULTIPLIER,
        max_real_time_ms: submission_max_cpu_ms * SPJ_REAL_MULTIPLIER,
        max_memory_bytes: submission_max_memory_bytes * SPJ_MEMORY_MULTIPLIER,
        max_stack_bytes: SPJ_STACK_BYTES,
        max_output_bytes: SPJ_OUTPUT_CAP_BYTES,
        max_process_number: UNLIMITED,
        exe_path: exe.clone(),
        args: args.to_vec(),
        env: vec![format!("PATH={}", std::env::var("PATH").unwrap_or_default())],
        input_path: staged_input.to_string_lossy().to_string(),
        output_path: "/tmp/spj.out".into(),
        error_path: "/tmp/spj.out".into(),
        log_path: config.log_base.join("judger.log").to_string_lossy().to_string(),
        seccomp_policy: Some(SeccompPolicy::CCpp),
        uid: config.spj_uid,
        gid: 0,
        memory_limit_check_only: false,
    };

    let report = sandbox.run(&spec);

    let exit_code = match report.outcome {
        SandboxOutcome::Success => report.exit_code,
        SandboxOutcome::RuntimeError if report.signal == 0 && (report.exit_code == SPJ_WA || report.exit_code == SPJ_ERROR) => {
            // The checker signaled WA/error via a nonzero exit rather than
            // a clean return; preserved as specified, see open question on
            // the exit_code == -1 ambiguity.
            report.exit_code
        }
        _ => SPJ_ERROR,
    };

    Ok(match exit_code {
        SPJ_AC => SpjVerdict::Accepted,
        SPJ_WA => SpjVerdict::WrongAnswer,
        _ => SpjVerdict::Error,
    })
}
