//! SPJ Compile Path: compiles a checker source once per `spj_version` and
//! caches the artifact by version string (not by content hash) under the
//! SPJ executable directory.

use crate::compiler;
use crate::config::JudgeConfig;
use crate::error::{JudgeError, JudgeResult};
use crate::languages;
use crate::sandbox::Sandbox;
use crate::workspace;

/// Checker source language. Only C and C++ checkers are supported, mirroring
/// the registry's `spj_compile_profile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpjLang {
    C,
    Cpp,
}

impl SpjLang {
    fn extension(self) -> &'static str {
        match self {
            SpjLang::C => "c",
            SpjLang::Cpp => "cpp",
        }
    }

    fn registry_key(self) -> &'static str {
        match self {
            SpjLang::C => "c",
            SpjLang::Cpp => "cpp",
        }
    }
}

/// Path to the compiled checker artifact for `version`, whether or not it
/// exists yet.
pub fn artifact_path(config: &JudgeConfig, version: &str) -> std::path::PathBuf {
    config.spj_dir.join(format!("spj-{version}"))
}

/// Ensures a compiled checker exists for `version`. If the artifact is
/// already present this is a no-op success. Otherwise `src` must be
/// provided; on failure a [`JudgeError::SpjCompileError`] is raised
/// (relabeled from the underlying [`JudgeError::CompileError`]).
pub fn ensure_compiled(
    sandbox: &dyn Sandbox,
    config: &JudgeConfig,
    version: &str,
    lang: SpjLang,
    src: Option<&str>,
) -> JudgeResult<()> {
    let exe_path = artifact_path(config, version);
    if exe_path.exists() {
        return Ok(());
    }

    let src = src.ok_or_else(|| JudgeError::JudgeClientError("spj source required to compile".into()))?;
    let src_path = config.spj_dir.join(format!("spj-{version}.{}", lang.extension()));

    std::fs::create_dir_all(&config.spj_dir)
        .map_err(|e| JudgeError::JudgeClientError(format!("failed to create spj dir: {e}")))?;

    if !src_path.exists() {
        workspace::write_owned(&src_path, src.as_bytes(), config.compiler_uid, 0, 0o400)?;
    }

    let profile = languages::spj_compile_profile(lang.registry_key())?;
    let result = compiler::compile(sandbox, config, &profile, &src_path, &config.spj_dir);

    match result {
        Ok(artifact) => {
            workspace::hand_off(&artifact, config.spj_uid, 0, 0o500)?;
            Ok(())
        }
        Err(JudgeError::CompileError(msg)) => Err(JudgeError::SpjCompileError(msg)),
        Err(other) => Err(other),
    }
}
