//! Integration tests driving the compiler/executor/comparator chain together
//! through a scripted sandbox, standing in for a real `gcc` invocation and a
//! real forked process. Exercises stdio-mode cases only: file-mode and SPJ
//! staging both perform real `chown` calls that require the uid/gid layout
//! a production host has and a test runner does not.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;

use contest_judge::comparator;
use contest_judge::compiler;
use contest_judge::config::JudgeConfig;
use contest_judge::executor::{self, ExecutionContext};
use contest_judge::languages::LanguageProfile;
use contest_judge::sandbox::{RunReport, RunSpec, Sandbox, SeccompPolicy};
use contest_judge::testcase_store;
use contest_judge::types::{IoMode, SandboxOutcome, TestCase};
use contest_judge::JudgeError;

/// One scripted sandbox invocation: the report to return, plus bytes to
/// drop at the run spec's output path first — standing in for what a real
/// forked process would have written to its redirected stdout/stderr
/// before the parent ever sees a `RunReport`.
struct ScriptedCall {
    report: RunReport,
    write_output: Option<Vec<u8>>,
}

struct ScriptedSandbox {
    calls: Mutex<VecDeque<ScriptedCall>>,
}

impl ScriptedSandbox {
    fn new(reports: Vec<ScriptedCall>) -> Self {
        ScriptedSandbox { calls: Mutex::new(reports.into()) }
    }
}

impl Sandbox for ScriptedSandbox {
    fn run(&self, spec: &RunSpec) -> RunReport {
        let call = self.calls.lock().unwrap().pop_front().expect("unscripted sandbox call");
        if let Some(bytes) = call.write_output {
            std::fs::write(&spec.output_path, bytes).expect("scripted sandbox write");
        }
        call.report
    }
}

fn report(outcome: SandboxOutcome, exit_code: i32) -> ScriptedCall {
    ScriptedCall {
        report: RunReport { outcome, cpu_time_ms: 5, real_time_ms: 6, memory_bytes: 4096, exit_code, signal: 0 },
        write_output: None,
    }
}

fn report_with_output(outcome: SandboxOutcome, exit_code: i32, output: &[u8]) -> ScriptedCall {
    ScriptedCall {
        report: RunReport { outcome, cpu_time_ms: 5, real_time_ms: 6, memory_bytes: 4096, exit_code, signal: 0 },
        write_output: Some(output.to_vec()),
    }
}

fn test_config(base: &std::path::Path) -> JudgeConfig {
    let uid = nix::unistd::Uid::current().as_raw();
    let gid = nix::unistd::Gid::current().as_raw();
    JudgeConfig {
        workspace_base: base.join("run"),
        test_case_dir: base.join("test_case"),
        spj_dir: base.join("spj"),
        log_base: base.join("log"),
        token_sha256: "unused".into(),
        worker_count: 1,
        debug: true,
        compiler_uid: uid,
        compiler_gid: gid,
        run_uid: uid,
        run_gid: gid,
        spj_uid: uid,
        spj_gid: gid,
    }
}

fn py_profile() -> LanguageProfile {
    // Interpreted profile: no compile step, execute_cmd_template only needs
    // placeholders the executor substitutes itself.
    contest_judge_test_support::profile_from_toml(
        r#"
tag = "py_test"
source_filename = "main.py"
exe_filename = "main.py"
compiled = false
execute_cmd = "python3 {exe_path}"
memory_check_only = true
"#,
    )
}

fn c_profile() -> LanguageProfile {
    contest_judge_test_support::profile_from_toml(
        r#"
tag = "c_test"
source_filename = "main.c"
exe_filename = "main"
compiled = true
compile_cmd = "gcc {src_path} -o {exe_path}"
execute_cmd = "{exe_path}"
compile_cpu_ms = 3000
compile_real_ms = 10000
compile_mem_bytes = 268435456
"#,
    )
}

/// Parses a single `[[language]]` body (without the table header) using the
/// crate's own TOML schema, so these tests stay in lockstep with any field
/// additions to the registry instead of hand-building `LanguageProfile`.
mod contest_judge_test_support {
    use contest_judge::languages::LanguageProfile;

    pub fn profile_from_toml(body: &str) -> LanguageProfile {
        let wrapped = format!("[[language]]\n{body}");
        contest_judge::languages::parse_profiles(&wrapped)
            .expect("valid test profile")
            .into_values()
            .next()
            .expect("one profile")
    }
}

fn case(id: &str, output: &[u8]) -> TestCase {
    let (output_md5, stripped_output_md5) = comparator::compute_expected_hashes(output);
    TestCase {
        input_name: format!("{id}.in"),
        output_name: format!("{id}.out"),
        input_size: 0,
        output_size: output.len() as u64,
        output_md5,
        stripped_output_md5,
        is_sample: false,
    }
}

#[test]
fn compile_error_surfaces_compiler_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::create_dir_all(&config.workspace_base).unwrap();
    let profile = c_profile();
    let src = config.workspace_base.join("main.c");
    std::fs::write(&src, b"int main() { return ").unwrap();

    let sandbox = ScriptedSandbox::new(vec![report_with_output(
        SandboxOutcome::RuntimeError,
        1,
        b"main.c:1:22: error: expected '}'",
    )]);

    let err = compiler::compile(&sandbox, &config, &profile, &src, &config.workspace_base).unwrap_err();
    match err {
        JudgeError::CompileError(msg) => assert!(msg.contains("expected")),
        other => panic!("expected CompileError, got {other:?}"),
    }
}

#[test]
fn compile_runtime_error_when_no_diagnostics_written() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::create_dir_all(&config.workspace_base).unwrap();
    let profile = c_profile();
    let src = config.workspace_base.join("main.c");
    std::fs::write(&src, b"int main() { return 0; }").unwrap();

    let sandbox = ScriptedSandbox::new(vec![report(SandboxOutcome::SystemError, -1)]);

    let err = compiler::compile(&sandbox, &config, &profile, &src, &config.workspace_base).unwrap_err();
    assert!(matches!(err, JudgeError::CompilerRuntimeError(_)));
}

#[test]
fn compile_success_returns_exe_path() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::create_dir_all(&config.workspace_base).unwrap();
    let profile = c_profile();
    let src = config.workspace_base.join("main.c");
    std::fs::write(&src, b"int main() { return 0; }").unwrap();

    let sandbox = ScriptedSandbox::new(vec![report(SandboxOutcome::Success, 0)]);
    let exe = compiler::compile(&sandbox, &config, &profile, &src, &config.workspace_base).unwrap();
    assert_eq!(exe, config.workspace_base.join("main"));
    assert!(!config.workspace_base.join("compiler.out").exists());
}

fn stdio_ctx<'a>(
    sandbox: &'a dyn Sandbox,
    config: &'a JudgeConfig,
    profile: &'a LanguageProfile,
    exe_path: &'a PathBuf,
    workspace_dir: &'a std::path::Path,
) -> ExecutionContext<'a> {
    ExecutionContext {
        sandbox,
        config,
        profile,
        exe_path,
        workspace_dir,
        max_cpu_ms: 1000,
        max_memory_bytes: 256 * 1024 * 1024,
        io_mode: IoMode::Stdio,
        io_filenames: None,
        spj_version: None,
        spj_lang: "cpp",
        capture_output: true,
    }
}

#[test]
fn accepted_case_through_comparator() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::create_dir_all(&config.workspace_base).unwrap();
    let bundle = config.workspace_base.join("bundle");
    std::fs::create_dir_all(&bundle).unwrap();
    std::fs::write(bundle.join("1.in"), b"3 4\n").unwrap();
    let tc = case("1", b"7\n");

    // A real sandboxed run would leave its stdout here; stand in for it.
    std::fs::write(config.workspace_base.join("1.out"), b"7\n").unwrap();

    let profile = py_profile();
    let exe = config.workspace_base.join("main.py");
    let sandbox = ScriptedSandbox::new(vec![report(SandboxOutcome::Success, 0)]);
    let ctx = stdio_ctx(&sandbox, &config, &profile, &exe, &config.workspace_base);

    let result = executor::run_case(&ctx, &bundle, "1", &tc).unwrap();
    assert_eq!(result.verdict, contest_judge::Verdict::Accepted);
    assert_eq!(result.output.as_deref(), Some("7\n"));
}

#[test]
fn wrong_answer_case_through_comparator() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::create_dir_all(&config.workspace_base).unwrap();
    let bundle = config.workspace_base.join("bundle");
    std::fs::create_dir_all(&bundle).unwrap();
    std::fs::write(bundle.join("1.in"), b"3 4\n").unwrap();
    let tc = case("1", b"7\n");
    std::fs::write(config.workspace_base.join("1.out"), b"8\n").unwrap();

    let profile = py_profile();
    let exe = config.workspace_base.join("main.py");
    let sandbox = ScriptedSandbox::new(vec![report(SandboxOutcome::Success, 0)]);
    let ctx = stdio_ctx(&sandbox, &config, &profile, &exe, &config.workspace_base);

    let result = executor::run_case(&ctx, &bundle, "1", &tc).unwrap();
    assert_eq!(result.verdict, contest_judge::Verdict::WrongAnswer);
}

#[test]
fn presentation_error_case_through_comparator() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::create_dir_all(&config.workspace_base).unwrap();
    let bundle = config.workspace_base.join("bundle");
    std::fs::create_dir_all(&bundle).unwrap();
    std::fs::write(bundle.join("1.in"), b"3 4\n").unwrap();
    let tc = case("1", b"7\n");
    std::fs::write(config.workspace_base.join("1.out"), b" 7 \n").unwrap();

    let profile = py_profile();
    let exe = config.workspace_base.join("main.py");
    let sandbox = ScriptedSandbox::new(vec![report(SandboxOutcome::Success, 0)]);
    let ctx = stdio_ctx(&sandbox, &config, &profile, &exe, &config.workspace_base);

    let result = executor::run_case(&ctx, &bundle, "1", &tc).unwrap();
    assert_eq!(result.verdict, contest_judge::Verdict::PresentationError);
}

#[test]
fn cpu_time_limit_exceeded_short_circuits_comparison() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::create_dir_all(&config.workspace_base).unwrap();
    let bundle = config.workspace_base.join("bundle");
    std::fs::create_dir_all(&bundle).unwrap();
    std::fs::write(bundle.join("1.in"), b"").unwrap();
    let tc = case("1", b"ignored\n");
    // No "1.out" written — a real sandbox under a CPU-time kill wouldn't
    // necessarily produce complete output either, and the verdict should
    // never reach the comparator for a non-Success outcome.

    let profile = py_profile();
    let exe = config.workspace_base.join("main.py");
    let sandbox = ScriptedSandbox::new(vec![report(SandboxOutcome::CpuTimeLimitExceeded, -1)]);
    let ctx = stdio_ctx(&sandbox, &config, &profile, &exe, &config.workspace_base);

    let result = executor::run_case(&ctx, &bundle, "1", &tc).unwrap();
    assert_eq!(result.verdict, contest_judge::Verdict::CpuTimeLimitExceeded);
}

#[test]
fn missing_output_file_after_success_is_wrong_answer() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::create_dir_all(&config.workspace_base).unwrap();
    let bundle = config.workspace_base.join("bundle");
    std::fs::create_dir_all(&bundle).unwrap();
    std::fs::write(bundle.join("1.in"), b"").unwrap();
    let tc = case("1", b"7\n");
    // Sandbox reports Success but never actually produced "1.out".

    let profile = py_profile();
    let exe = config.workspace_base.join("main.py");
    let sandbox = ScriptedSandbox::new(vec![report(SandboxOutcome::Success, 0)]);
    let ctx = stdio_ctx(&sandbox, &config, &profile, &exe, &config.workspace_base);

    let result = executor::run_case(&ctx, &bundle, "1", &tc).unwrap();
    assert_eq!(result.verdict, contest_judge::Verdict::WrongAnswer);
}

#[test]
fn load_manifest_then_run_case_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::create_dir_all(&config.workspace_base).unwrap();
    let bundle = config.test_case_dir.join("problem-1");
    let cases = vec![
        contest_judge::types::InlineTestCase { input: "1 2\n".into(), output: "3\n".into() },
    ];
    let manifest = testcase_store::materialize_inline(&bundle, &cases, false).unwrap();
    let reloaded = testcase_store::load_manifest(&bundle).unwrap();
    assert_eq!(reloaded.test_case_number, manifest.test_case_number);

    let tc = reloaded.test_cases.get("1").unwrap().clone();
    std::fs::write(config.workspace_base.join("1.out"), b"3\n").unwrap();

    let profile = py_profile();
    let exe = config.workspace_base.join("main.py");
    let sandbox = ScriptedSandbox::new(vec![report(SandboxOutcome::Success, 0)]);
    let ctx = stdio_ctx(&sandbox, &config, &profile, &exe, &config.workspace_base);

    let result = executor::run_case(&ctx, &bundle, "1", &tc).unwrap();
    assert_eq!(result.verdict, contest_judge::Verdict::Accepted);
}

#[test]
fn seccomp_policy_resolution_prefers_file_io_variant() {
    let profile = contest_judge_test_support::profile_from_toml(
        r#"
tag = "cpp_test"
source_filename = "main.cpp"
exe_filename = "main"
compiled = true
compile_cmd = "g++ {src_path} -o {exe_path}"
execute_cmd = "{exe_path}"
seccomp_stdio = "c_cpp"
seccomp_file_io = "c_cpp_file_io"
"#,
    );
    assert_eq!(profile.seccomp_policy(IoMode::Stdio), Some(SeccompPolicy::CCpp));
    assert_eq!(profile.seccomp_policy(IoMode::File), Some(SeccompPolicy::CCppFileIo));
}
