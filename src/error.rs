use thiserror::Error;

/// Failure kinds the top level must tell apart.
///
/// Everything else travels as a plain `anyhow::Error` and ends up as an
/// internal-error report.
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("{0} is a symlink")]
    Cheating(String),
    #[error("missing option ({0})")]
    MissingOption(String),
    #[error("unknown compiler id ({0})")]
    UnknownCompiler(String),
    #[error("invalid compiler_id ({0})")]
    CompilerNotAllowed(String),
    #[error("could not find suitable compiler")]
    NoSuitableCompiler,
    #[error("cannot find {0}")]
    MissingSolution(String),
    #[error("monitor {0} is not setuid root")]
    MonitorNotInstalled(String),
    #[error("{0} missing")]
    MissingArtifact(String),
    #[error("wrong checker ({0})")]
    UnknownChecker(String),
    #[error("external checker exceeded {0} seconds")]
    CheckerTimeout(f64),
}

impl JudgeError {
    /// Whether an error chain was caused by a detected integrity violation.
    pub fn is_cheating(err: &anyhow::Error) -> bool {
        err.chain().any(|cause| {
            matches!(
                cause.downcast_ref::<JudgeError>(),
                Some(JudgeError::Cheating(_))
            )
        })
    }
}
