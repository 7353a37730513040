//! A scripted [`super::Sandbox`] used by the pipeline's own test suite so
//! compiler/executor/SPJ-driver behavior can be exercised without forking
//! real processes or depending on gcc/seccomp being present in CI.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::{RunReport, RunSpec, Sandbox};
use crate::types::SandboxOutcome;

pub struct MockSandbox {
    scripted: Mutex<VecDeque<RunReport>>,
}

impl MockSandbox {
    pub fn new(reports: Vec<RunReport>) -> Self {
        MockSandbox { scripted: Mutex::new(reports.into()) }
    }

    pub fn success(exit_code: i32) -> RunReport {
        RunReport {
            outcome: SandboxOutcome::Success,
            cpu_time_ms: 10,
            real_time_ms: 12,
            memory_bytes: 1024 * 1024,
            exit_code,
            signal: 0,
        }
    }
}

impl Sandbox for MockSandbox {
    fn run(&self, _spec: &RunSpec) -> RunReport {
        let mut guard = self.scripted.lock().unwrap_or_else(|e| e.into_inner());
        guard.pop_front().unwrap_or_else(|| RunReport {
            outcome: SandboxOutcome::SystemError,
            cpu_time_ms: 0,
            real_time_ms: 0,
            memory_bytes: 0,
            exit_code: -1,
            signal: 0,
        })
    }
}
