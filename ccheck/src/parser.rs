use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::{RawTestCaseInput, TestCase};

/// Wire shape of one test-case record. Both the current
/// `{"args": [...], "output": "...", "exit_code": 0}` form and the older
/// single-argument `{"input": "...", "output": "..."}` form are accepted.
#[derive(Debug, Deserialize)]
struct TestCaseRecord {
    #[serde(default, alias = "arguments")]
    args: Option<Vec<String>>,
    #[serde(default)]
    input: Option<String>,
    #[serde(alias = "expected_output", alias = "expectedOutput")]
    output: String,
    #[serde(default, alias = "expected_exit_code", alias = "expectedExitCode")]
    exit_code: i32,
}

impl TestCaseRecord {
    fn into_test_case(self, number: usize) -> TestCase {
        let arguments = match (self.args, self.input) {
            (Some(args), _) => args,
            (None, Some(input)) => vec![input],
            (None, None) => Vec::new(),
        };
        TestCase {
            number,
            arguments,
            expected_output: self.output,
            expected_exit_code: self.exit_code,
        }
    }
}

/// Turns caller-supplied records into an ordered list of [`TestCase`]s.
///
/// Records that fail to decode are logged and skipped; the survivors keep their
/// relative order and their 1-based position in the submitted sequence.
#[derive(Debug, Default, Clone, Copy)]
pub struct TestCaseParser;

impl TestCaseParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, raw: &RawTestCaseInput) -> Vec<TestCase> {
        match raw {
            RawTestCaseInput::TextBlob(text) => text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .enumerate()
                .filter_map(|(idx, line)| decode_text(line, idx + 1))
                .collect(),
            RawTestCaseInput::RecordSequence(records) => records
                .iter()
                .enumerate()
                .filter_map(|(idx, record)| decode_value(record, idx + 1))
                .collect(),
        }
    }
}

/// Shorthand for `TestCaseParser::new().parse(raw)`
pub fn parse(raw: &RawTestCaseInput) -> Vec<TestCase> {
    TestCaseParser::new().parse(raw)
}

fn decode_text(line: &str, number: usize) -> Option<TestCase> {
    match serde_json::from_str::<TestCaseRecord>(line) {
        Ok(record) => Some(record.into_test_case(number)),
        Err(e) => {
            warn!(
                "Skipping test case {}: could not parse {:?}: {}",
                number, line, e
            );
            None
        }
    }
}

fn decode_value(record: &Value, number: usize) -> Option<TestCase> {
    match record {
        Value::String(text) => decode_text(text.trim(), number),
        other => match TestCaseRecord::deserialize(other) {
            Ok(record) => Some(record.into_test_case(number)),
            Err(e) => {
                warn!("Skipping test case {}: {}: {}", number, other, e);
                None
            }
        },
    }
}
