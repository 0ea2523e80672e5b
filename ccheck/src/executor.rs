use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    error::Error,
    sandbox::{ProcessOutput, Sandbox},
    ExecutionResult, ResourceLimits, TestCase,
};

/// Runs a compiled binary against test cases, one at a time
#[derive(Debug, Clone)]
pub struct Executor {
    timeout: Duration,
    limits: ResourceLimits,
}

impl Executor {
    pub fn new(timeout: Duration, limits: ResourceLimits) -> Self {
        Self { timeout, limits }
    }

    /// Run `binary_path` with the test's arguments and judge the outcome.
    ///
    /// Launch failures, timeouts and malformed arguments all come back as a failed
    /// result with a message saying which of them happened.
    pub async fn run(&self, binary_path: &Path, test_case: &TestCase) -> ExecutionResult {
        let index = test_case.number;
        let described = describe_input(test_case);

        if let Some(bad) = test_case.arguments.iter().find(|arg| arg.contains('\0')) {
            let e = Error::MalformedTestCase(format!("argument {:?} contains a NUL byte", bad));
            warn!("Test case {}: {}", index, e);
            return ExecutionResult {
                test_case_index: index,
                passed: false,
                actual_output: String::new(),
                message: format!("MALFORMED TEST CASE: {}, Got nothing: {}", described, e),
                stderr: String::new(),
            };
        }

        // Files the program creates land in a throwaway directory, never in the build root.
        let scratch = match tempfile::Builder::new().prefix("ccheck-scratch-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                return ExecutionResult {
                    test_case_index: index,
                    passed: false,
                    actual_output: String::new(),
                    message: format!(
                        "EXECUTION ERROR: {}, Got no output: could not create working directory: {}",
                        described, e
                    ),
                    stderr: String::new(),
                };
            }
        };
        let sandbox = Sandbox::new(scratch.path()).with_limits(self.limits.clone());
        let args: Vec<OsString> = test_case.arguments.iter().map(OsString::from).collect();

        debug!("Running {:?} for test case {}", binary_path, index);
        match sandbox.execute(binary_path, &args, self.timeout).await {
            Ok(output) => {
                debug!("Test case {} finished in {:?}", index, output.elapsed);
                judge(test_case, &described, output)
            }
            Err(Error::Timeout {
                limit,
                stdout,
                stderr,
            }) => {
                let partial = stdout.trim().to_string();
                let mut message = format!(
                    "TIMEOUT: {}, Got no result: program exceeded {} seconds and was killed.",
                    described,
                    limit.as_secs_f64()
                );
                if !partial.is_empty() {
                    message.push_str(&format!(" Partial output: '{}'", partial));
                }
                ExecutionResult {
                    test_case_index: index,
                    passed: false,
                    actual_output: partial,
                    message,
                    stderr: stderr.trim().to_string(),
                }
            }
            Err(e) => ExecutionResult {
                test_case_index: index,
                passed: false,
                actual_output: String::new(),
                message: format!("EXECUTION ERROR: {}, Got no output: {}", described, e),
                stderr: String::new(),
            },
        }
    }
}

/// Trimmed stdout must equal the trimmed expectation exactly
pub(crate) fn outputs_match(actual: &str, expected: &str) -> bool {
    actual.trim() == expected.trim()
}

fn describe_input(test_case: &TestCase) -> String {
    format!(
        "Arguments {:?}, Expected '{}'",
        test_case.arguments, test_case.expected_output
    )
}

fn judge(test_case: &TestCase, described: &str, output: ProcessOutput) -> ExecutionResult {
    let actual = output.stdout.trim().to_string();
    let output_ok = outputs_match(&actual, &test_case.expected_output);
    let exit_code = output.exit_code();
    let exit_ok = exit_code == Some(test_case.expected_exit_code);

    let message = if output_ok && exit_ok {
        format!("PASSED: {}, Got '{}'", described, actual)
    } else {
        let mut details = Vec::new();
        if !output_ok {
            details.push(format!(
                "Output Mismatch: Expected '{}', Got '{}'.",
                test_case.expected_output.trim(),
                actual
            ));
        }
        if !exit_ok {
            let got = match (exit_code, output.signal()) {
                (Some(code), _) => code.to_string(),
                (None, Some(signal)) => format!("termination by signal {}", signal),
                (None, None) => "no exit code".to_string(),
            };
            details.push(format!(
                "Exit Code Mismatch: Expected {}, Got {}.",
                test_case.expected_exit_code, got
            ));
        }
        format!("FAILED: {}, Got '{}'. {}", described, actual, details.join(" "))
    };

    ExecutionResult {
        test_case_index: test_case.number,
        passed: output_ok && exit_ok,
        actual_output: actual,
        message,
        stderr: output.stderr.trim().to_string(),
    }
}
