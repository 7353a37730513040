use thiserror::Error;

/// The taxonomy of errors the judge pipeline can raise, each carrying the
/// HTTP status class its caller should report.
#[derive(Debug, Error)]
pub enum JudgeError {
    /// User code failed to compile; the payload is the compiler's diagnostics.
    #[error("compile error: {0}")]
    CompileError(String),

    /// The sandbox itself failed during compilation (not a user bug).
    #[error("compiler runtime error: {0}")]
    CompilerRuntimeError(String),

    /// The special judge checker failed to compile.
    #[error("spj compile error: {0}")]
    SpjCompileError(String),

    /// Bundle missing, manifest malformed, SPJ binary missing, workspace
    /// setup failed, or inconsistent request arguments.
    #[error("judge client error: {0}")]
    JudgeClientError(String),

    /// The request's `X-Judge-Server-Token` header did not match.
    #[error("token verification failed: {0}")]
    TokenVerificationFailed(String),

    /// Raised by the heartbeat/service-discovery collaborator; never
    /// constructed inside this crate, kept for taxonomy completeness.
    #[error("judge service error: {0}")]
    JudgeServiceError(String),
}

impl JudgeError {
    /// HTTP status class this error should be reported under.
    pub fn status_code(&self) -> u16 {
        match self {
            JudgeError::CompileError(_) => 400,
            JudgeError::TokenVerificationFailed(_) => 403,
            _ => 500,
        }
    }

    /// The bare variant name, as surfaced in the `err` field of responses.
    pub fn kind_name(&self) -> &'static str {
        match self {
            JudgeError::CompileError(_) => "CompileError",
            JudgeError::CompilerRuntimeError(_) => "CompilerRuntimeError",
            JudgeError::SpjCompileError(_) => "SPJCompileError",
            JudgeError::JudgeClientError(_) => "JudgeClientError",
            JudgeError::TokenVerificationFailed(_) => "TokenVerificationFailed",
            JudgeError::JudgeServiceError(_) => "JudgeServiceError",
        }
    }

    /// The message payload, stripped of the variant wrapper.
    pub fn message(&self) -> String {
        match self {
            JudgeError::CompileError(m)
            | JudgeError::CompilerRuntimeError(m)
            | JudgeError::SpjCompileError(m)
            | JudgeError::JudgeClientError(m)
            | JudgeError::TokenVerificationFailed(m)
            | JudgeError::JudgeServiceError(m) => m.clone(),
        }
    }
}

pub type JudgeResult<T> = Result<T, JudgeError>;
