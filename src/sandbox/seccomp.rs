//! Syscall filter policies applied to the sandboxed child just before
//! `execve`. Policy shapes are grounded on the judger-rs reference
//! implementation's rule set, re-expressed against this crate's
//! [`super::SeccompPolicy`] names.

use libseccomp::{ScmpAction, ScmpArgCompare, ScmpCompareOp, ScmpFilterContext, ScmpSyscall};
use nix::libc;

use super::SeccompPolicy;

/// Installs the named policy in the current (post-fork, pre-exec) process.
/// Must be called after `setuid`/`setgid` and before `execve`.
pub fn load_rules(policy: SeccompPolicy) -> Result<(), ()> {
    match policy {
        SeccompPolicy::CCpp => c_cpp_rules(false),
        SeccompPolicy::CCppFileIo => c_cpp_rules(true),
        SeccompPolicy::Golang => golang_rules(),
        SeccompPolicy::Node => node_rules(),
        SeccompPolicy::General => general_rules(),
    }
}

fn allow_all(filter: &mut ScmpFilterContext, names: &[&str]) -> Result<(), ()> {
    for name in names {
        let syscall = ScmpSyscall::from_name(name).map_err(|_| ())?;
        filter.add_rule(ScmpAction::Allow, syscall).map_err(|_| ())?;
    }
    Ok(())
}

const BASE_SYSCALLS: &[&str] = &[
    "access",
    "arch_prctl",
    "brk",
    "clock_gettime",
    "close",
    "exit_group",
    "faccessat",
    "fstat",
    "futex",
    "getrandom",
    "lseek",
    "mmap",
    "mprotect",
    "munmap",
    "newfstatat",
    "pread64",
    "prlimit64",
    "read",
    "readlink",
    "readv",
    "rseq",
    "set_robust_list",
    "set_tid_address",
    "write",
    "writev",
    "execve",
];

fn c_cpp_rules(allow_write_file: bool) -> Result<(), ()> {
    let mut filter = ScmpFilterContext::new(ScmpAction::KillProcess).map_err(|_| ())?;
    allow_all(&mut filter, BASE_SYSCALLS)?;

    if allow_write_file {
        allow_all(&mut filter, &["open", "openat", "dup", "dup2", "dup3"])?;
    } else {
        let open_sys = ScmpSyscall::from_name("open").map_err(|_| ())?;
        let cmp_open = ScmpArgCompare::new(
            1,
            ScmpCompareOp::MaskedEqual((libc::O_WRONLY | libc::O_RDWR) as u64),
            0,
        );
        filter
            .add_rule_conditional(ScmpAction::Allow, open_sys, &[cmp_open])
            .map_err(|_| ())?;

        let openat_sys = ScmpSyscall::from_name("openat").map_err(|_| ())?;
        let cmp_openat = ScmpArgCompare::new(
            2,
            ScmpCompareOp::MaskedEqual((libc::O_WRONLY | libc::O_RDWR) as u64),
            0,
        );
        filter
            .add_rule_conditional(ScmpAction::Allow, openat_sys, &[cmp_openat])
            .map_err(|_| ())?;
    }

    filter.load().map_err(|_| ())
}

fn general_rules() -> Result<(), ()> {
    // Interpreted runtimes (Python, the JVM) need too broad a syscall
    // surface to whitelist like c_cpp_rules does, but "general" is meant
    // to be the tightest policy, not the loosest: default-allow, then kill
    // on the syscalls a sandboxed submission has no legitimate use for.
    let mut filter = ScmpFilterContext::new(ScmpAction::Allow).map_err(|_| ())?;

    for name in ["fork", "vfork", "socket", "kill", "execveat"] {
        let syscall = ScmpSyscall::from_name(name).map_err(|_| ())?;
        filter.add_rule(ScmpAction::KillProcess, syscall).map_err(|_| ())?;
    }

    let open_sys = ScmpSyscall::from_name("open").map_err(|_| ())?;
    filter
        .add_rule_conditional(
            ScmpAction::KillProcess,
            open_sys,
            &[ScmpArgCompare::new(1, ScmpCompareOp::MaskedEqual(libc::O_WRONLY as u64), libc::O_WRONLY as u64)],
        )
        .map_err(|_| ())?;
    filter
        .add_rule_conditional(
            ScmpAction::KillProcess,
            open_sys,
            &[ScmpArgCompare::new(1, ScmpCompareOp::MaskedEqual(libc::O_RDWR as u64), libc::O_RDWR as u64)],
        )
        .map_err(|_| ())?;

    let openat_sys = ScmpSyscall::from_name("openat").map_err(|_| ())?;
    filter
        .add_rule_conditional(
            ScmpAction::KillProcess,
            openat_sys,
            &[ScmpArgCompare::new(2, ScmpCompareOp::MaskedEqual(libc::O_WRONLY as u64), libc::O_WRONLY as u64)],
        )
        .map_err(|_| ())?;
    filter
        .add_rule_conditional(
            ScmpAction::KillProcess,
            openat_sys,
            &[ScmpArgCompare::new(2, ScmpCompareOp::MaskedEqual(libc::O_RDWR as u64), libc::O_RDWR as u64)],
        )
        .map_err(|_| ())?;

    filter.load().map_err(|_| ())
}

fn golang_rules() -> Result<(), ()> {
    let mut filter = ScmpFilterContext::new(ScmpAction::KillProcess).map_err(|_| ())?;
    allow_all(&mut filter, BASE_SYSCALLS)?;
    allow_all(
        &mut filter,
        &[
            "clone", "rt_sigaction", "rt_sigprocmask", "sigaltstack", "gettid", "sched_getaffinity",
            "epoll_create1", "epoll_ctl", "epoll_pwait", "openat", "pipe2", "nanosleep",
        ],
    )?;
    filter.load().map_err(|_| ())
}

fn node_rules() -> Result<(), ()> {
    let mut filter = ScmpFilterContext::new(ScmpAction::KillProcess).map_err(|_| ())?;
    allow_all(&mut filter, BASE_SYSCALLS)?;
    allow_all(
        &mut filter,
        &[
            "openat", "epoll_create1", "epoll_ctl", "epoll_pwait", "eventfd2", "clone", "madvise",
            "statx", "ioctl", "pipe2", "getcwd",
        ],
    )?;
    filter.load().map_err(|_| ())
}
