use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Terminal classification of one test-case run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    WrongAnswer,
    PresentationError,
    CpuTimeLimitExceeded,
    RealTimeLimitExceeded,
    MemoryLimitExceeded,
    RuntimeError,
    SystemError,
}

/// How a submission's I/O is wired to the judged program.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IoMode {
    Stdio,
    File,
}

/// Declared input/output filenames for file-I/O mode problems.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoFilenames {
    pub input: String,
    pub output: String,
}

/// A checker source to compile for special-judge problems.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpjSource {
    pub version: String,
    /// Present only when the artifact for `version` has not been compiled yet.
    pub src: Option<String>,
}

/// A test case supplied inline in the judge request rather than preloaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineTestCase {
    pub input: String,
    pub output: String,
}

/// Where the judge pipeline should source its test cases from.
#[derive(Debug, Clone)]
pub enum TestCaseSource {
    /// Read a preloaded bundle from `<test_case_dir>/<id>`.
    BundleId(String),
    /// Materialize a fresh bundle from inline pairs.
    Inline(Vec<InlineTestCase>),
}

/// One submission to judge.
#[derive(Debug, Clone)]
pub struct Submission {
    pub language: String,
    pub source: String,
    pub max_cpu_time_ms: i64,
    pub max_memory_bytes: i64,
    pub io_mode: IoMode,
    pub io_filenames: Option<IoFilenames>,
    pub test_cases: TestCaseSource,
    pub spj: Option<SpjSource>,
    pub capture_output: bool,
    pub include_samples: bool,
}

/// One entry of a test-case bundle manifest (`info`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub input_name: String,
    pub output_name: String,
    pub input_size: u64,
    pub output_size: u64,
    pub output_md5: String,
    pub stripped_output_md5: String,
    #[serde(default)]
    pub is_sample: bool,
}

/// The `info` manifest of a test-case bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub test_case_number: usize,
    pub spj: bool,
    pub test_cases: BTreeMap<String, TestCase>,
}

/// A classified reason a sandboxed run did not reach SUCCESS, distinct from
/// the Verdict so Run Executor / SPJ Driver share one vocabulary with the
/// sandbox collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SandboxOutcome {
    Success,
    CpuTimeLimitExceeded,
    RealTimeLimitExceeded,
    MemoryLimitExceeded,
    RuntimeError,
    SystemError,
}

/// Result of one test case's run, as returned to the judge caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub test_case: String,
    pub verdict: Verdict,
    pub cpu_time_ms: i64,
    pub real_time_ms: i64,
    pub memory_bytes: i64,
    pub exit_code: i32,
    pub signal: i32,
    pub is_sample: bool,
    pub output_md5: Option<String>,
    pub output: Option<String>,
    pub spj_output: Option<String>,
    pub error_kind: Option<String>,
}
