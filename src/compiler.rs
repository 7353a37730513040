//! Compiler Driver: invokes the sandbox on a language's compile command and
//! classifies the outcome as a successful artifact, a [`JudgeError::CompileError`]
//! (user's fault, diagnostics attached) or a [`JudgeError::CompilerRuntimeError`]
//! (sandbox-level failure).

use std::path::Path;

use crate::config::{JudgeConfig, DEFAULT_STACK_BYTES};
use crate::error::{JudgeError, JudgeResult};
use crate::languages::LanguageProfile;
use crate::sandbox::{RunSpec, Sandbox, UNLIMITED};
use crate::types::SandboxOutcome;

const COMPILE_OUTPUT_CAP_BYTES: i64 = 20 * 1024 * 1024;

fn format_template(template: &str, src_path: &str, exe_dir: &str, exe_path: &str) -> String {
    template
        .replace("{src_path}", src_path)
        .replace("{exe_dir}", exe_dir)
        .replace("{exe_path}", exe_path)
}

/// Splits a command string into argv by POSIX shell word rules, without
/// invoking a shell. Shared with the Run Executor and SPJ Driver so every
/// command template (compile, execute, checker) is tokenized the same way.
pub(crate) fn split_command(command: &str) -> JudgeResult<Vec<String>> {
    shell_words::split(command).map_err(|e| JudgeError::JudgeClientError(format!("bad command: {e}")))
}

/// Compiles `src_path` using `profile`'s compile command, placing the
/// artifact in `output_dir`. Returns the artifact path on success.
pub fn compile(
    sandbox: &dyn Sandbox,
    config: &JudgeConfig,
    profile: &LanguageProfile,
    src_path: &Path,
    output_dir: &Path,
) -> JudgeResult<std::path::PathBuf> {
    let template = profile
        .compile_cmd_template
        .as_deref()
        .ok_or_else(|| JudgeError::JudgeClientError("profile has no compile command".into()))?;

    let exe_path = output_dir.join(&profile.exe_filename);
    let src_path_s = src_path.to_string_lossy().to_string();
    let exe_dir_s = output_dir.to_string_lossy().to_string();
    let exe_path_s = exe_path.to_string_lossy().to_string();

    let command = format_template(template, &src_path_s, &exe_dir_s, &exe_path_s);
    let argv = split_command(&command)?;
    let (exe, args) = argv.split_first().ok_or_else(|| {
        JudgeError::JudgeClientError("empty compile command".into())
    })?;

    let compiler_out = output_dir.join("compiler.out");
    let compiler_out_s = compiler_out.to_string_lossy().to_string();

    let mut env = profile.env.clone();
    env.push(format!("PATH={}", std::env::var("PATH").unwrap_or_default()));

    let spec = RunSpec {
        max_cpu_time_ms: profile.compile_cpu_ms,
        max_real_time_ms: profile.compile_real_ms,
        max_memory_bytes: profile.compile_mem_bytes,
        max_stack_bytes: DEFAULT_STACK_BYTES,
        max_output_bytes: COMPILE_OUTPUT_CAP_BYTES,
        max_process_number: UNLIMITED,
        exe_path: exe.clone(),
        args: args.to_vec(),
        env,
        // compiler.out also serves as stdin: a harmless, non-tty, regular
        // file source (some compilers issue ioctls /dev/null rejects).
        input_path: compiler_out_s.clone(),
        output_path: compiler_out_s.clone(),
        error_path: compiler_out_s.clone(),
        log_path: config.log_base.join("compile.log").to_string_lossy().to_string(),
        seccomp_policy: None,
        uid: config.compiler_uid,
        gid: config.compiler_gid,
        memory_limit_check_only: false,
    };

    // compiler.out must exist before it is used as stdin.
    std::fs::write(&compiler_out, b"")
        .map_err(|e| JudgeError::JudgeClientError(format!("failed to create compiler.out: {e}")))?;

    let report = sandbox.run(&spec);

    if report.outcome != SandboxOutcome::Success {
        let diagnostics = std::fs::read_to_string(&compiler_out).unwrap_or_default();
        let _ = std::fs::remove_file(&compiler_out);
        let trimmed = diagnostics.trim();
        if !trimmed.is_empty() {
            return Err(JudgeError::CompileError(trimmed.to_string()));
        }
        return Err(JudgeError::CompilerRuntimeError(format!(
            "compiler sandbox outcome: {:?}, exit_code={}, signal={}",
            report.outcome, report.exit_code, report.signal
        )));
    }

    let _ = std::fs::remove_file(&compiler_out);
    Ok(exe_path)
}

/// Minimal POSIX shell word splitter (no quoting edge cases beyond basic
/// single/double quotes and backslash escapes), used so compile/execute/SPJ
/// command templates can be tokenized without a shell in the loop.
mod shell_words {
    pub fn split(s: &str) -> Result<Vec<String>, String> {
        let mut words = Vec::new();
        let mut current = String::new();
        let mut in_word = false;
        let mut chars = s.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                ' ' | '\t' | '\n' => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                '\'' => {
                    in_word = true;
                    for c2 in chars.by_ref() {
                        if c2 == '\'' {
                            break;
                        }
                        current.push(c2);
                    }
                }
                '"' => {
                    in_word = true;
                    while let Some(c2) = chars.next() {
                        if c2 == '"' {
                            break;
                        }
                        if c2 == '\\' {
                            if let Some(&next) = chars.peek() {
                                if next == '"' || next == '\\' {
                                    current.push(chars.next().unwrap());
                                    continue;
                                }
                            }
                        }
                        current.push(c2);
                    }
                }
                '\\' => {
                    in_word = true;
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                }
                _ => {
                    in_word = true;
                    current.push(c);
                }
            }
        }
        if in_word {
            words.push(current);
        }
        Ok(words)
    }
}

#[cfg(test)]
mod tests {
    use super::shell_words;

    #[test]
    fn splits_plain_command() {
        let v = shell_words::split("gcc -O2 main.c -o main").unwrap();
        assert_eq!(v, vec!["gcc", "-O2", "main.c", "-o", "main"]);
    }

    #[test]
    fn splits_quoted_argument() {
        let v = shell_words::split(r#"java -cp "a b" Main"#).unwrap();
        assert_eq!(v, vec!["java", "-cp", "a b", "Main"]);
    }
}
