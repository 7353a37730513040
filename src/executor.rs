//! Run Executor: stages I/O, invokes the sandbox once for a single test
//! case, and composes the final per-case verdict.

use std::path::Path;

use crate::comparator;
use crate::config::{JudgeConfig, DEFAULT_STACK_BYTES, MAX_RESP_BYTES, MIN_OUTPUT_SIZE_BYTES};
use crate::error::JudgeResult;
use crate::languages::LanguageProfile;
use crate::sandbox::{RunSpec, Sandbox, UNLIMITED};
use crate::spj::{self, SpjVerdict};
use crate::types::{IoMode, RunResult, SandboxOutcome, TestCase, Verdict};
use crate::workspace;

fn sandbox_outcome_to_verdict(outcome: SandboxOutcome) -> Verdict {
    match outcome {
        SandboxOutcome::Success => Verdict::Accepted, // overwritten by comparator/SPJ below
        SandboxOutcome::CpuTimeLimitExceeded => Verdict::CpuTimeLimitExceeded,
        SandboxOutcome::RealTimeLimitExceeded => Verdict::RealTimeLimitExceeded,
        SandboxOutcome::MemoryLimitExceeded => Verdict::MemoryLimitExceeded,
        SandboxOutcome::RuntimeError => Verdict::RuntimeError,
        SandboxOutcome::SystemError => Verdict::SystemError,
    }
}

/// Everything [`run_case`] needs beyond the per-case test data.
pub struct ExecutionContext<'a> {
    pub sandbox: &'a dyn Sandbox,
    pub config: &'a JudgeConfig,
    pub profile: &'a LanguageProfile,
    pub exe_path: &'a Path,
    pub workspace_dir: &'a Path,
    pub max_cpu_ms: i64,
    pub max_memory_bytes: i64,
    pub io_mode: IoMode,
    pub io_filenames: Option<&'a crate::types::IoFilenames>,
    pub spj_version: Option<&'a str>,
    pub spj_lang: &'a str,
    pub capture_output: bool,
}

/// Runs one test case end to end and returns its [`RunResult`].
pub fn run_case(
    ctx: &ExecutionContext,
    bundle_dir: &Path,
    case_id: &str,
    case: &TestCase,
) -> JudgeResult<RunResult> {
    let input_path = bundle_dir.join(&case.input_name);

    let (real_input_path, real_output_path, real_error_path, user_output_path) = if ctx.io_mode == IoMode::File {
        let io_names = ctx
            .io_filenames
            .ok_or_else(|| crate::error::JudgeError::JudgeClientError("file io mode requires io_filenames".into()))?;
        let case_dir = ctx.workspace_dir.join(case_id);
        std::fs::create_dir_all(&case_dir)
            .map_err(|e| crate::error::JudgeError::JudgeClientError(format!("failed to create case dir: {e}")))?;
        workspace::hand_off(&case_dir, ctx.config.run_uid, ctx.config.run_gid, 0o711)?;
        std::fs::copy(&input_path, case_dir.join(&io_names.input))
            .map_err(|e| crate::error::JudgeError::JudgeClientError(format!("failed to stage input: {e}")))?;
        let stdio = case_dir.join("stdio.txt");
        let user_output = case_dir.join(&io_names.output);
        // Defensive duplication preserved from the reference implementation:
        // stdin is redirected to the original input path in addition to the
        // declared input filename being copied into the case directory.
        (input_path.clone(), stdio.clone(), stdio, user_output)
    } else {
        let out = ctx.workspace_dir.join(format!("{case_id}.out"));
        (input_path.clone(), out.clone(), out.clone(), out)
    };

    let command = ctx
        .profile
        .execute_cmd_template
        .replace("{exe_path}", &ctx.exe_path.to_string_lossy())
        .replace("{exe_dir}", &ctx.exe_path.parent().map(|p| p.to_string_lossy().to_string()).unwrap_or_default())
        .replace("{max_memory}", &(ctx.max_memory_bytes / 1024).to_string());
    let argv = crate::compiler::split_command(&command)?;
    let (exe, args) = argv.split_first().ok_or_else(|| {
        crate::error::JudgeError::JudgeClientError("empty execute command".into())
    })?;

    let mut env = ctx.profile.env.clone();
    env.push(format!("PATH={}", std::env::var("PATH").unwrap_or_default()));

    let max_output = std::cmp::max((case.output_size as i64) * 2, MIN_OUTPUT_SIZE_BYTES);

    let spec = RunSpec {
        max_cpu_time_ms: ctx.max_cpu_ms,
        max_real_time_ms: ctx.max_cpu_ms * 3,
        max_memory_bytes: ctx.max_memory_bytes,
        max_stack_bytes: DEFAULT_STACK_BYTES,
        max_output_bytes: max_output,
        max_process_number: UNLIMITED,
        exe_path: exe.clone(),
        args: args.to_vec(),
        env,
        input_path: real_input_path.to_string_lossy().to_string(),
        output_path: real_output_path.to_string_lossy().to_string(),
        error_path: real_error_path.to_string_lossy().to_string(),
        log_path: ctx.config.log_base.join("judger.log").to_string_lossy().to_string(),
        seccomp_policy: ctx.profile.seccomp_policy(ctx.io_mode),
        uid: ctx.config.run_uid,
        gid: ctx.config.run_gid,
        memory_limit_check_only: ctx.profile.memory_check_only,
    };

    let report = ctx.sandbox.run(&spec);

    let mut result = RunResult {
        test_case: case_id.to_string(),
        verdict: sandbox_outcome_to_verdict(report.outcome),
        cpu_time_ms: report.cpu_time_ms,
        real_time_ms: report.real_time_ms,
        memory_bytes: report.memory_bytes,
        exit_code: report.exit_code,
        signal: report.signal,
        is_sample: case.is_sample,
        output_md5: None,
        output: None,
        spj_output: None,
        error_kind: None,
    };

    if report.outcome == SandboxOutcome::Success {
        if !user_output_path.exists() {
            result.verdict = Verdict::WrongAnswer;
        } else if let Some(version) = ctx.spj_version {
            let answer_path = bundle_dir.join(&case.output_name);
            match spj::run(
                ctx.sandbox,
                ctx.config,
                ctx.spj_lang,
                version,
                ctx.workspace_dir,
                case_id,
                &input_path,
                &answer_path,
                &user_output_path,
                ctx.max_cpu_ms,
                ctx.max_memory_bytes,
            )? {
                SpjVerdict::Accepted => result.verdict = Verdict::Accepted,
                SpjVerdict::WrongAnswer => result.verdict = Verdict::WrongAnswer,
                SpjVerdict::Error => {
                    result.verdict = Verdict::SystemError;
                    result.error_kind = Some("spj_error".into());
                }
            }
        } else {
            let (md5, verdict) = comparator::compare(&user_output_path, case)?;
            result.output_md5 = Some(md5);
            result.verdict = verdict;
        }
    }

    if ctx.capture_output {
        if let Ok(bytes) = std::fs::read(&user_output_path) {
            let capped = if bytes.len() > MAX_RESP_BYTES { &bytes[..MAX_RESP_BYTES] } else { &bytes[..] };
            let text = backslash_replace_decode(capped).replace('\0', "");
            result.output = Some(text);
        }
    }

    Ok(result)
}

/// Decodes `bytes` as UTF-8, escaping each invalid byte as literal `\xHH`
/// text rather than substituting U+FFFD. Matches Python's
/// `errors="backslashreplace"`.
fn backslash_replace_decode(mut bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(valid);
                break;
            }
            Err(e) => {
                let valid_up_to = e.valid_up_to();
                out.push_str(std::str::from_utf8(&bytes[..valid_up_to]).unwrap());
                let bad_byte = bytes[valid_up_to];
                out.push_str(&format!("\\x{bad_byte:02x}"));
                let skip = valid_up_to + e.error_len().unwrap_or(1);
                bytes = &bytes[skip..];
            }
        }
    }
    out
}
