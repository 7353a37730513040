use std::path::PathBuf;

use nix::unistd::{Gid, Group, Uid, User};

use crate::error::{JudgeError, JudgeResult};

/// Maximum bytes read off a user-output file when computing comparison hashes.
pub const MAX_READ_BYTES: usize = 64 * 1024 * 1024;
/// Maximum bytes of output echoed back in a RunResult when capture is requested.
pub const MAX_RESP_BYTES: usize = 16 * 1024;
/// Floor applied to the sandbox's max_output_size cap for a run.
pub const MIN_OUTPUT_SIZE_BYTES: i64 = 16 * 1024 * 1024;
/// Stack limit applied to every sandboxed run (compile, execute, spj).
pub const DEFAULT_STACK_BYTES: i64 = 128 * 1024 * 1024;

/// Process-wide configuration resolved from the environment at startup.
#[derive(Debug, Clone)]
pub struct JudgeConfig {
    /// Root directory under which per-submission workspaces are created.
    pub workspace_base: PathBuf,
    /// Root directory holding preloaded test-case bundles, one per id.
    pub test_case_dir: PathBuf,
    /// Directory holding SPJ sources and compiled checker artifacts.
    pub spj_dir: PathBuf,
    /// Directory for sandbox/compile log files.
    pub log_base: PathBuf,
    /// sha256 hex digest of the shared auth token.
    pub token_sha256: String,
    /// Number of parallel workers in the per-submission test-case pool.
    pub worker_count: usize,
    /// If true, workspaces are retained after judging instead of removed.
    pub debug: bool,

    pub compiler_uid: u32,
    pub compiler_gid: u32,
    pub run_uid: u32,
    pub run_gid: u32,
    pub spj_uid: u32,
    pub spj_gid: u32,
}

fn resolve_user(name: &str) -> JudgeResult<u32> {
    User::from_name(name)
        .map_err(|e| JudgeError::JudgeClientError(format!("failed to resolve user {name}: {e}")))?
        .map(|u| u.uid.as_raw())
        .ok_or_else(|| JudgeError::JudgeClientError(format!("user {name} not found")))
}

fn resolve_group(name: &str) -> JudgeResult<u32> {
    Group::from_name(name)
        .map_err(|e| JudgeError::JudgeClientError(format!("failed to resolve group {name}: {e}")))?
        .map(|g| g.gid.as_raw())
        .ok_or_else(|| JudgeError::JudgeClientError(format!("group {name} not found")))
}

impl JudgeConfig {
    /// Loads configuration from environment variables (after `dotenvy::dotenv()`).
    ///
    /// Falls back to the current process uid/gid for the compiler/run/spj
    /// accounts when the `code`/`compiler`/`spj` system users are absent —
    /// this keeps the binary runnable in a dev container without the full
    /// production account layout, at the cost of losing privilege
    /// separation between trust domains.
    pub fn from_env() -> JudgeResult<Self> {
        let token = std::env::var("TOKEN")
            .map_err(|_| JudgeError::JudgeClientError("env 'TOKEN' not found".into()))?;
        let token_sha256 = {
            use sha2::{Digest, Sha256};
            let mut hasher = Sha256::new();
            hasher.update(token.as_bytes());
            hex::encode(hasher.finalize())
        };

        let fallback_uid = Uid::current().as_raw();
        let fallback_gid = Gid::current().as_raw();

        let (compiler_uid, compiler_gid) = match (resolve_user("compiler"), resolve_group("compiler")) {
            (Ok(u), Ok(g)) => (u, g),
            _ => (fallback_uid, fallback_gid),
        };
        let (run_uid, run_gid) = match (resolve_user("code"), resolve_group("code")) {
            (Ok(u), Ok(g)) => (u, g),
            _ => (fallback_uid, fallback_gid),
        };
        let (spj_uid, spj_gid) = match (resolve_user("spj"), resolve_group("spj")) {
            (Ok(u), Ok(g)) => (u, g),
            _ => (fallback_uid, fallback_gid),
        };

        Ok(JudgeConfig {
            workspace_base: std::env::var("JUDGER_WORKSPACE_BASE")
                .unwrap_or_else(|_| "/judger/run".into())
                .into(),
            test_case_dir: std::env::var("TEST_CASE_DIR")
                .unwrap_or_else(|_| "/test_case".into())
                .into(),
            spj_dir: std::env::var("SPJ_DIR").unwrap_or_else(|_| "/judger/spj".into()).into(),
            log_base: std::env::var("LOG_BASE").unwrap_or_else(|_| "/log".into()).into(),
            token_sha256,
            worker_count: std::env::var("MAX_WORKER_NUM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)),
            debug: std::env::var("judger_debug").as_deref() == Ok("1"),
            compiler_uid,
            compiler_gid,
            run_uid,
            run_gid,
            spj_uid,
            spj_gid,
        })
    }
}
