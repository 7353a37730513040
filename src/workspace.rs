//! Workspace Manager: scoped acquisition of a unique per-submission
//! directory with guaranteed cleanup, plus the uid/gid/mode handoff
//! sequences between the compiler, runner and SPJ trust domains.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use nix::unistd::{chown, Gid, Uid};

use crate::config::JudgeConfig;
use crate::error::{JudgeError, JudgeResult};

/// A scoped handle to a submission's working directory. The directory is
/// removed when this handle is dropped, unless the config runs in debug
/// mode — mirroring the original `InitSubmissionEnv` context manager.
pub struct Workspace {
    path: PathBuf,
    keep: bool,
}

impl Workspace {
    /// Creates `<workspace_base>/<submission_id>`, owned by the compiler
    /// user, mode 0711 so the runner and SPJ users can traverse it.
    pub fn acquire(config: &JudgeConfig, submission_id: &str) -> JudgeResult<Self> {
        let path = config.workspace_base.join(submission_id);
        std::fs::create_dir_all(&path)
            .map_err(|e| JudgeError::JudgeClientError(format!("failed to create runtime dir: {e}")))?;
        chown(&path, Some(Uid::from_raw(config.compiler_uid)), Some(Gid::from_raw(config.run_gid)))
            .map_err(|e| JudgeError::JudgeClientError(format!("failed to chown runtime dir: {e}")))?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o711))
            .map_err(|e| JudgeError::JudgeClientError(format!("failed to chmod runtime dir: {e}")))?;
        Ok(Workspace { path, keep: config.debug })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.keep {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }
}

/// Writes `bytes` at `path`, owned by `uid`/`gid`, with the given mode.
/// Used for the source-file (compiler, 0400) and artifact (runner, 0500)
/// ownership handoffs described in the data model.
pub fn write_owned(path: &Path, bytes: &[u8], uid: u32, gid: u32, mode: u32) -> JudgeResult<()> {
    std::fs::write(path, bytes).map_err(|e| JudgeError::JudgeClientError(format!("failed to write {path:?}: {e}")))?;
    hand_off(path, uid, gid, mode)
}

/// Re-chowns/chmods an existing path, e.g. the compiled artifact moving
/// from the compiler user to the runner user.
pub fn hand_off(path: &Path, uid: u32, gid: u32, mode: u32) -> JudgeResult<()> {
    chown(path, Some(Uid::from_raw(uid)), Some(Gid::from_raw(gid)))
        .map_err(|e| JudgeError::JudgeClientError(format!("failed to chown {path:?}: {e}")))?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| JudgeError::JudgeClientError(format!("failed to chmod {path:?}: {e}")))?;
    Ok(())
}

/// `hand_off` that tolerates a missing target — needed because e.g. Java's
/// declared exe_path does not match the actual `.class` file on disk.
pub fn hand_off_best_effort(path: &Path, uid: u32, gid: u32, mode: u32) {
    let _ = hand_off(path, uid, gid, mode);
}
