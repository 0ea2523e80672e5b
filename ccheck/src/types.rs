use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{compiler::TOOLCHAIN_NOT_FOUND, error::Error};

/// One declarative test: run the binary with `arguments`, expect `expected_output`
/// on stdout and `expected_exit_code` as the exit status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// 1-based position in the sequence the caller submitted
    pub number: usize,
    /// Positional arguments, argv[1] onwards
    pub arguments: Vec<String>,
    pub expected_output: String,
    pub expected_exit_code: i32,
}

/// Outcome of compiling one source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationResult {
    pub source_path: PathBuf,
    pub succeeded: bool,
    /// Present iff `succeeded`
    pub binary_path: Option<PathBuf>,
    /// Combined compiler stdout and stderr, possibly empty
    pub diagnostics: String,
}

impl CompilationResult {
    pub(crate) fn failed(source_path: PathBuf, diagnostics: String) -> Self {
        Self {
            source_path,
            succeeded: false,
            binary_path: None,
            diagnostics,
        }
    }

    /// The compiled binary, or the reason there is none
    pub fn binary(&self) -> crate::Result<&Path> {
        match &self.binary_path {
            Some(path) if self.succeeded => Ok(path),
            _ if self.diagnostics.starts_with(TOOLCHAIN_NOT_FOUND) => {
                Err(Error::ToolchainUnavailable(self.diagnostics.clone()))
            }
            _ => Err(Error::CompilationFailed(self.diagnostics.clone())),
        }
    }
}

/// Outcome of running one binary against one test case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub test_case_index: usize,
    pub passed: bool,
    pub actual_output: String,
    /// Summary line for the transcript
    pub message: String,
    /// Captured stderr, trimmed
    #[serde(default)]
    pub stderr: String,
}

/// The single object handed back to the caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub transcript_lines: Vec<String>,
    pub overall_passed: bool,
}

impl RunReport {
    /// Transcript lines joined with newlines
    pub fn transcript(&self) -> String {
        self.transcript_lines.join("\n")
    }
}

/// Test-case records as they arrive from the caller, resolved once at the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTestCaseInput {
    /// Newline-delimited JSON records
    TextBlob(String),
    /// One entry per record, either JSON text or an already-decoded JSON value
    RecordSequence(Vec<serde_json::Value>),
}

impl From<&str> for RawTestCaseInput {
    fn from(text: &str) -> Self {
        RawTestCaseInput::TextBlob(text.to_string())
    }
}

impl From<Vec<String>> for RawTestCaseInput {
    fn from(records: Vec<String>) -> Self {
        RawTestCaseInput::RecordSequence(
            records.into_iter().map(serde_json::Value::String).collect(),
        )
    }
}

/// Resource limits applied to every test execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// Maximum CPU time (seconds)
    pub cpu_time: Option<u64>,
    /// Maximum size of any file the program writes (bytes)
    pub file_size: Option<u64>,
    /// Maximum address space (bytes), Linux only
    pub memory: Option<u64>,
    /// Bytes kept from each of stdout and stderr; the rest is drained and dropped
    pub max_output_bytes: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            cpu_time: Some(10),
            file_size: Some(10 * 1024 * 1024), // 10MB
            memory: None,
            max_output_bytes: 1024 * 1024, // 1MB
        }
    }
}

pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
