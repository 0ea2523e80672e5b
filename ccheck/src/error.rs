use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Toolchain not found: {0}")]
    ToolchainUnavailable(String),

    #[error("Compilation failed: {0}")]
    CompilationFailed(String),

    #[error("Failed to launch {path}: {reason}")]
    ExecutionLaunchFailed { path: PathBuf, reason: String },

    #[error("Timed out after {:.1} seconds", .limit.as_secs_f64())]
    Timeout {
        limit: Duration,
        stdout: String,
        stderr: String,
    },

    #[error("Malformed test case: {0}")]
    MalformedTestCase(String),

    #[error("Invalid artifact name: {0:?}")]
    InvalidArtifactName(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}
