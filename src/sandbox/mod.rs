//! The native sandbox: the single primitive the rest of the pipeline drives
//! to run an untrusted or semi-trusted process under resource and syscall
//! limits. Everything downstream of `Sandbox::run` only ever sees a
//! `RunReport`; how the isolation is actually achieved is this module's
//! concern alone.

pub mod native;
pub mod seccomp;

#[cfg(test)]
pub mod mock;

use crate::types::SandboxOutcome;

/// A named seccomp policy understood by [`seccomp::load_rules`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeccompPolicy {
    CCpp,
    CCppFileIo,
    Golang,
    Node,
    General,
}

impl SeccompPolicy {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "c_cpp" => Some(Self::CCpp),
            "c_cpp_file_io" => Some(Self::CCppFileIo),
            "golang" => Some(Self::Golang),
            "node" => Some(Self::Node),
            "general" => Some(Self::General),
            _ => None,
        }
    }
}

/// `-1` sentinel for "no limit" fields, matching the sandbox collaborator's
/// documented contract.
pub const UNLIMITED: i64 = -1;

/// One sandboxed invocation's full parameter set.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub max_cpu_time_ms: i64,
    pub max_real_time_ms: i64,
    pub max_memory_bytes: i64,
    pub max_stack_bytes: i64,
    pub max_output_bytes: i64,
    pub max_process_number: i64,
    pub exe_path: String,
    pub args: Vec<String>,
    pub env: Vec<String>,
    pub input_path: String,
    pub output_path: String,
    pub error_path: String,
    pub log_path: String,
    pub seccomp_policy: Option<SeccompPolicy>,
    pub uid: u32,
    pub gid: u32,
    pub memory_limit_check_only: bool,
}

/// Result of one sandboxed invocation.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: SandboxOutcome,
    pub cpu_time_ms: i64,
    pub real_time_ms: i64,
    pub memory_bytes: i64,
    pub exit_code: i32,
    pub signal: i32,
}

/// The sandbox contract the judge pipeline depends on. Abstracted as a
/// trait so the pipeline can be exercised in tests against
/// [`mock::MockSandbox`] without forking real processes.
pub trait Sandbox: Send + Sync {
    fn run(&self, spec: &RunSpec) -> RunReport;
}
