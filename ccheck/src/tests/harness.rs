use super::{
    fixtures::{
        c_programs::{
            prints, FORKS_AND_WAITS, MAKES_DIRECTORY, REVERSE, SYNTAX_ERROR, WRITES_STDERR,
        },
        records::REVERSE_SUITE,
    },
    utils::{
        defaults::test_config,
        sources::{build_base_is_clean, write_program},
    },
};
use crate::{toolchain::skip_if_not_available, Harness, RawTestCaseInput, SourceLayout};
use assert_fs::prelude::*;
use assert_fs::TempDir;
use serde_json::json;
use std::time::Instant;
use tokio::time::Duration;

#[tokio::test]
async fn test_all_tests_pass() {
    if skip_if_not_available(&["gcc"]) {
        return;
    }
    let src = TempDir::new().unwrap();
    let base = TempDir::new().unwrap();
    write_program(&src, "reverse", REVERSE);

    let harness = Harness::new(test_config(base.path()));
    let report = harness
        .run(src.path(), &RawTestCaseInput::from(REVERSE_SUITE))
        .await;

    assert!(report.overall_passed, "{}", report.transcript());
    assert_eq!(report.transcript_lines.last().unwrap(), "All tests PASSED!");
    assert!(report
        .transcript_lines
        .contains(&"--- Running Test Case 3 for reverse ---".to_string()));
    assert!(build_base_is_clean(base.path()));
}

#[tokio::test]
async fn test_compile_failure_skips_tests_but_not_other_files() {
    if skip_if_not_available(&["gcc"]) {
        return;
    }
    let src = TempDir::new().unwrap();
    let base = TempDir::new().unwrap();
    write_program(&src, "a_broken", SYNTAX_ERROR);
    write_program(&src, "b_reverse", REVERSE);

    let harness = Harness::new(test_config(base.path()));
    let report = harness
        .run(src.path(), &RawTestCaseInput::from(REVERSE_SUITE))
        .await;
    let transcript = report.transcript();

    assert!(!report.overall_passed);
    assert!(transcript.contains("Compilation FAILED for"));
    assert!(!transcript.contains("Test Case 1 for a_broken"));
    assert!(transcript.contains("Compilation successful for b_reverse."));
    assert!(transcript.contains("--- Running Test Case 1 for b_reverse ---"));

    // files are processed in name order
    let broken = transcript.find("a_broken.c").unwrap();
    let reverse = transcript.find("b_reverse.c").unwrap();
    assert!(broken < reverse);

    assert_eq!(report.transcript_lines.last().unwrap(), "Some tests FAILED.");
    assert!(build_base_is_clean(base.path()));
}

#[tokio::test]
async fn test_one_failing_case_downgrades_verdict() {
    if skip_if_not_available(&["gcc"]) {
        return;
    }
    let src = TempDir::new().unwrap();
    let base = TempDir::new().unwrap();
    write_program(&src, "reverse", REVERSE);

    let tests = RawTestCaseInput::from(vec![
        r#"{"args":["abc"],"output":"cba"}"#.to_string(),
        r#"{"args":["abc"],"output":"abc"}"#.to_string(),
        r#"{"args":["xy"],"output":"yx"}"#.to_string(),
    ]);
    let report = Harness::new(test_config(base.path()))
        .run(src.path(), &tests)
        .await;

    assert!(!report.overall_passed);
    let verdicts: Vec<_> = report
        .transcript_lines
        .iter()
        .filter(|l| l.starts_with("PASSED") || l.starts_with("FAILED"))
        .map(|l| &l[..6])
        .collect();
    assert_eq!(verdicts, vec!["PASSED", "FAILED", "PASSED"]);
}

#[tokio::test]
async fn test_test_numbers_follow_submitted_positions() {
    if skip_if_not_available(&["gcc"]) {
        return;
    }
    let src = TempDir::new().unwrap();
    let base = TempDir::new().unwrap();
    write_program(&src, "reverse", REVERSE);

    let tests = RawTestCaseInput::from(vec![
        r#"{"args":["ab"],"output":"ba"}"#.to_string(),
        "{broken".to_string(),
        r#"{"args":["cd"],"output":"dc"}"#.to_string(),
    ]);
    let report = Harness::new(test_config(base.path()))
        .run(src.path(), &tests)
        .await;
    let transcript = report.transcript();

    assert!(report.overall_passed, "{}", transcript);
    assert!(transcript.contains("Test Case 1 for reverse"));
    assert!(!transcript.contains("Test Case 2 for reverse"));
    assert!(transcript.contains("Test Case 3 for reverse"));
}

#[tokio::test]
async fn test_stderr_is_reported() {
    if skip_if_not_available(&["gcc"]) {
        return;
    }
    let src = TempDir::new().unwrap();
    let base = TempDir::new().unwrap();
    write_program(&src, "noisy", WRITES_STDERR);

    let report = Harness::new(test_config(base.path()))
        .run(src.path(), &RawTestCaseInput::from(r#"{"output":"ok"}"#))
        .await;

    assert!(report.overall_passed);
    assert!(report
        .transcript_lines
        .contains(&"noisy - Test 1 generated stderr: debug line".to_string()));
}

#[tokio::test]
async fn test_no_valid_test_cases() {
    let src = TempDir::new().unwrap();
    let base = TempDir::new().unwrap();
    write_program(&src, "reverse", REVERSE);

    let report = Harness::new(test_config(base.path()))
        .run(src.path(), &RawTestCaseInput::from("not json\n{also not}"))
        .await;

    assert!(!report.overall_passed);
    assert_eq!(report.transcript(), "No valid test cases found to run.");
    assert!(build_base_is_clean(base.path()));
}

#[tokio::test]
async fn test_no_source_files() {
    let src = TempDir::new().unwrap();
    let base = TempDir::new().unwrap();
    src.child("README.md").write_str("nothing to compile").unwrap();

    let report = Harness::new(test_config(base.path()))
        .run(src.path(), &RawTestCaseInput::from(REVERSE_SUITE))
        .await;

    assert!(!report.overall_passed);
    assert!(report.transcript().starts_with("No .c files found in"));
    assert!(build_base_is_clean(base.path()));
}

#[tokio::test]
async fn test_missing_source_dir_is_fatal_but_cleaned_up() {
    let base = TempDir::new().unwrap();
    let report = Harness::new(test_config(base.path()))
        .run(
            &base.path().join("no-such-dir"),
            &RawTestCaseInput::from(REVERSE_SUITE),
        )
        .await;

    assert!(!report.overall_passed);
    assert!(report.transcript().contains("FATAL ERROR during test execution"));
    assert_eq!(report.transcript_lines.last().unwrap(), "Some tests FAILED.");
    assert!(build_base_is_clean(base.path()));
}

#[tokio::test]
async fn test_program_dirs_layout() {
    if skip_if_not_available(&["gcc"]) {
        return;
    }
    let src = TempDir::new().unwrap();
    let base = TempDir::new().unwrap();
    src.child("alice/main.c").write_str(REVERSE).unwrap();
    src.child("bob/main.c").write_str(REVERSE).unwrap();

    let config = test_config(base.path()).with_layout(SourceLayout::ProgramDirs);
    let report = Harness::new(config)
        .run(src.path(), &RawTestCaseInput::from(REVERSE_SUITE))
        .await;
    let transcript = report.transcript();

    assert!(report.overall_passed, "{}", transcript);
    assert!(transcript.contains("Compilation successful for alice."));
    assert!(transcript.contains("Compilation successful for bob."));
    assert!(build_base_is_clean(base.path()));
}

#[tokio::test]
async fn test_concurrent_runs_do_not_interfere() {
    if skip_if_not_available(&["gcc"]) {
        return;
    }
    let base = TempDir::new().unwrap();
    let src_a = TempDir::new().unwrap();
    let src_b = TempDir::new().unwrap();
    // same file names, different behavior
    write_program(&src_a, "prog", &prints("from-a"));
    write_program(&src_b, "prog", &prints("from-b"));

    let harness_a = Harness::new(test_config(base.path()));
    let harness_b = Harness::new(test_config(base.path()));
    let tests_a = RawTestCaseInput::from(r#"{"output":"from-a"}"#);
    let tests_b = RawTestCaseInput::from(r#"{"output":"from-b"}"#);

    let (report_a, report_b) = tokio::join!(
        harness_a.run(src_a.path(), &tests_a),
        harness_b.run(src_b.path(), &tests_b),
    );

    assert!(report_a.overall_passed, "{}", report_a.transcript());
    assert!(report_b.overall_passed, "{}", report_b.transcript());
    assert!(build_base_is_clean(base.path()));
}

#[tokio::test]
async fn test_cancellation_kills_and_cleans_up() {
    if skip_if_not_available(&["gcc"]) {
        return;
    }
    let src = TempDir::new().unwrap();
    let base = TempDir::new().unwrap();
    let markers = TempDir::new().unwrap();
    let marker = markers.path().join("child-survived");
    write_program(&src, "forker", FORKS_AND_WAITS);

    let config = test_config(base.path()).with_run_timeout(Duration::from_secs(60));
    let harness = Harness::new(config);
    let tests = RawTestCaseInput::RecordSequence(vec![json!({
        "args": [marker.to_string_lossy()],
        "output": "",
    })]);

    let start = Instant::now();
    let report = harness
        .run_until(
            src.path(),
            &tests,
            tokio::time::sleep(Duration::from_secs(2)),
        )
        .await;

    assert!(start.elapsed() < Duration::from_secs(30));
    assert!(!report.overall_passed);
    assert!(report.transcript().contains("cancelled"));
    assert!(build_base_is_clean(base.path()));

    // the forked child would have created the marker by now
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(!marker.exists(), "forked child outlived the cancelled run");
}

#[tokio::test]
async fn test_program_created_directories_do_not_survive_the_run() {
    if skip_if_not_available(&["gcc"]) {
        return;
    }
    let src = TempDir::new().unwrap();
    let base = TempDir::new().unwrap();
    write_program(&src, "mkdirs", MAKES_DIRECTORY);

    let report = Harness::new(test_config(base.path()))
        .run(src.path(), &RawTestCaseInput::from(r#"{"output":"ok"}"#))
        .await;

    assert!(report.overall_passed, "{}", report.transcript());
    assert!(build_base_is_clean(base.path()));
    assert!(!src.path().join("scratch").exists());
}

#[tokio::test]
async fn test_missing_toolchain_fails_each_file() {
    let src = TempDir::new().unwrap();
    let base = TempDir::new().unwrap();
    write_program(&src, "one", REVERSE);
    write_program(&src, "two", REVERSE);

    let mut config = test_config(base.path());
    config.compiler = "ccheck-no-such-cc".to_string();
    let report = Harness::new(config)
        .run(src.path(), &RawTestCaseInput::from(REVERSE_SUITE))
        .await;
    let transcript = report.transcript();

    assert!(!report.overall_passed);
    assert_eq!(transcript.matches(crate::TOOLCHAIN_NOT_FOUND).count(), 2);
    assert!(!transcript.contains("Running Test Case"));
    assert!(build_base_is_clean(base.path()));
}
