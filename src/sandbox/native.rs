//! Fork/exec based sandbox backend: the one concrete implementation of
//! [`super::Sandbox`] this crate ships. Grounded directly on the
//! judger-rs reference implementation's child/runner split — a watchdog
//! thread enforces wall-clock time by `SIGKILL`, rlimits enforce CPU time,
//! stack, output size and (unless `memory_limit_check_only`) address
//! space, and `wait4` rusage yields the final accounting.

use std::ffi::CString;
use std::fs::File;
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nix::libc;
use nix::sys::resource::{setrlimit, Resource};
use nix::unistd::{execve, fork, setgid, setuid, ForkResult, Gid, Pid, Uid};

use super::{RunReport, RunSpec, Sandbox};
use crate::types::SandboxOutcome;

/// The fork/exec sandbox backend.
pub struct NativeSandbox;

impl NativeSandbox {
    pub fn new() -> Self {
        NativeSandbox
    }
}

impl Default for NativeSandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Sandbox for NativeSandbox {
    fn run(&self, spec: &RunSpec) -> RunReport {
        match run_inner(spec) {
            Ok(report) => report,
            Err(_) => RunReport {
                outcome: SandboxOutcome::SystemError,
                cpu_time_ms: 0,
                real_time_ms: 0,
                memory_bytes: 0,
                exit_code: -1,
                signal: 0,
            },
        }
    }
}

fn run_inner(spec: &RunSpec) -> Result<RunReport, ()> {
    // SAFETY: fork() is unsafe because the child may only call
    // async-signal-safe functions before exec; child_process() below is
    // restricted to nix/libc wrappers around such calls.
    match unsafe { fork() }.map_err(|_| ())? {
        ForkResult::Child => {
            // The child never returns past this point: either execve
            // replaces it, or it exits with a failure status.
            let code = match child_process(spec) {
                Ok(()) => 0,
                Err(_) => 127,
            };
            unsafe { libc::_exit(code) };
        }
        ForkResult::Parent { child } => parent_watch(spec, child),
    }
}

fn child_process(spec: &RunSpec) -> Result<(), ()> {
    if spec.max_stack_bytes != super::UNLIMITED {
        setrlimit(Resource::RLIMIT_STACK, spec.max_stack_bytes as u64, spec.max_stack_bytes as u64)
            .map_err(|_| ())?;
    }
    if spec.max_memory_bytes != super::UNLIMITED && !spec.memory_limit_check_only {
        let limit = (spec.max_memory_bytes * 2) as u64;
        setrlimit(Resource::RLIMIT_AS, limit, limit).map_err(|_| ())?;
    }
    if spec.max_cpu_time_ms != super::UNLIMITED {
        let secs = (spec.max_cpu_time_ms / 1000 + 1) as u64;
        setrlimit(Resource::RLIMIT_CPU, secs, secs).map_err(|_| ())?;
    }
    if spec.max_process_number != super::UNLIMITED {
        let n = spec.max_process_number as u64;
        setrlimit(Resource::RLIMIT_NPROC, n, n).map_err(|_| ())?;
    }
    if spec.max_output_bytes != super::UNLIMITED {
        let n = spec.max_output_bytes as u64;
        setrlimit(Resource::RLIMIT_FSIZE, n, n).map_err(|_| ())?;
    }

    let input = File::open(&spec.input_path).map_err(|_| ())?;
    let output = File::create(&spec.output_path).map_err(|_| ())?;
    let error = if spec.error_path == spec.output_path {
        None
    } else {
        Some(File::create(&spec.error_path).map_err(|_| ())?)
    };

    if unsafe { libc::dup2(input.as_raw_fd(), 0) } == -1 {
        return Err(());
    }
    if unsafe { libc::dup2(output.as_raw_fd(), 1) } == -1 {
        return Err(());
    }
    let err_fd = error.as_ref().map(|f| f.as_raw_fd()).unwrap_or_else(|| output.as_raw_fd());
    if unsafe { libc::dup2(err_fd, 2) } == -1 {
        return Err(());
    }

    setgid(Gid::from_raw(spec.gid)).map_err(|_| ())?;
    setuid(Uid::from_raw(spec.uid)).map_err(|_| ())?;

    if let Some(policy) = spec.seccomp_policy {
        super::seccomp::load_rules(policy)?;
    }

    let exe = CString::new(spec.exe_path.clone()).map_err(|_| ())?;
    let mut argv = vec![exe.clone()];
    for a in &spec.args {
        argv.push(CString::new(a.as_str()).map_err(|_| ())?);
    }
    let envp: Vec<CString> = spec
        .env
        .iter()
        .map(|e| CString::new(e.as_str()).unwrap_or_default())
        .collect();

    execve(&exe, &argv, &envp).map_err(|_| ())?;
    unreachable!("execve only returns on error, which is mapped above")
}

fn parent_watch(spec: &RunSpec, child: Pid) -> Result<RunReport, ()> {
    let killed = Arc::new(AtomicBool::new(false));
    let watchdog_killed = killed.clone();
    let real_time_ms = spec.max_real_time_ms;
    let child_raw = child.as_raw();

    let watchdog = if real_time_ms != super::UNLIMITED {
        Some(std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(real_time_ms as u64));
            if !watchdog_killed.load(Ordering::SeqCst) {
                unsafe {
                    libc::kill(child_raw, libc::SIGKILL);
                }
            }
        }))
    } else {
        None
    };

    let mut status: libc::c_int = 0;
    let mut rusage: libc::rusage = unsafe { std::mem::zeroed() };
    let wait_start = std::time::Instant::now();
    let ret = unsafe { libc::wait4(child_raw, &mut status, 0, &mut rusage) };
    killed.store(true, Ordering::SeqCst);
    if let Some(handle) = watchdog {
        let _ = handle.join();
    }
    if ret == -1 {
        return Err(());
    }

    let real_time_ms = wait_start.elapsed().as_millis() as i64;
    let cpu_time_ms = (rusage.ru_utime.tv_sec * 1000
        + rusage.ru_utime.tv_usec / 1000
        + rusage.ru_stime.tv_sec * 1000
        + rusage.ru_stime.tv_usec / 1000) as i64;
    let memory_bytes = rusage.ru_maxrss * 1024;

    let exited = libc::WIFEXITED(status);
    let exit_code = if exited { libc::WEXITSTATUS(status) } else { 0 };
    let signaled = libc::WIFSIGNALED(status);
    let signal = if signaled { libc::WTERMSIG(status) } else { 0 };

    let outcome = classify(spec, exited, exit_code, signaled, signal, cpu_time_ms, real_time_ms, memory_bytes);

    Ok(RunReport {
        outcome,
        cpu_time_ms,
        real_time_ms,
        memory_bytes,
        exit_code,
        signal,
    })
}

#[allow(clippy::too_many_arguments)]
fn classify(
    spec: &RunSpec,
    exited: bool,
    exit_code: i32,
    signaled: bool,
    signal: i32,
    cpu_time_ms: i64,
    real_time_ms: i64,
    memory_bytes: i64,
) -> SandboxOutcome {
    if spec.max_real_time_ms != super::UNLIMITED && real_time_ms >= spec.max_real_time_ms {
        return SandboxOutcome::RealTimeLimitExceeded;
    }
    if spec.max_cpu_time_ms != super::UNLIMITED && cpu_time_ms >= spec.max_cpu_time_ms {
        return SandboxOutcome::CpuTimeLimitExceeded;
    }
    if !spec.memory_limit_check_only
        && spec.max_memory_bytes != super::UNLIMITED
        && memory_bytes > spec.max_memory_bytes
    {
        return SandboxOutcome::MemoryLimitExceeded;
    }
    if signaled {
        // SIGSEGV/SIGKILL under an AS rlimit close to the cap usually means
        // the allocator hit the wall rather than a genuine crash; rusage
        // already reflects that, so surface it as MLE when plausible.
        if (signal == libc::SIGSEGV || signal == libc::SIGKILL)
            && !spec.memory_limit_check_only
            && spec.max_memory_bytes != super::UNLIMITED
            && memory_bytes as f64 > spec.max_memory_bytes as f64 * 0.95
        {
            return SandboxOutcome::MemoryLimitExceeded;
        }
        return SandboxOutcome::RuntimeError;
    }
    if exited && exit_code != 0 {
        return SandboxOutcome::RuntimeError;
    }
    SandboxOutcome::Success
}
