use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use crate::{
    artifacts::ArtifactStore,
    compiler::Compiler,
    config::{HarnessConfig, SourceLayout},
    executor::Executor,
    parser::TestCaseParser,
    toolchain::{CToolchain, Toolchain},
    RawTestCaseInput, Result, RunReport, TestCase,
};

const PROGRAM_DIR_ENTRY: &str = "main.c";

/// One candidate program found in the source directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceProgram {
    pub name: String,
    pub source_path: PathBuf,
}

enum Flow {
    NoSources,
    Graded,
}

/// Accumulates transcript lines and the overall verdict. The verdict only ever
/// goes from passing to failing.
struct Transcript {
    lines: Vec<String>,
    passed: bool,
}

impl Transcript {
    fn new() -> Self {
        Self {
            lines: Vec::new(),
            passed: true,
        }
    }

    fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// One entry per diagnostic line, under a header; nothing when empty
    fn push_compiler_output(&mut self, diagnostics: &str) {
        if diagnostics.is_empty() {
            return;
        }
        self.push("Compiler Output:");
        self.lines.extend(diagnostics.lines().map(str::to_string));
    }

    fn fail(&mut self) {
        self.passed = false;
    }

    /// A run in which nothing could be graded
    fn degenerate(message: String) -> RunReport {
        RunReport {
            transcript_lines: vec![message],
            overall_passed: false,
        }
    }

    fn finish(mut self) -> RunReport {
        self.push("");
        self.push("--- Test Summary ---");
        self.push(if self.passed {
            "All tests PASSED!"
        } else {
            "Some tests FAILED."
        });
        RunReport {
            transcript_lines: self.lines,
            overall_passed: self.passed,
        }
    }
}

/// Drives compile and execute for every program in a source directory
pub struct Harness {
    config: HarnessConfig,
    parser: TestCaseParser,
    compiler: Compiler,
    executor: Executor,
}

impl Harness {
    /// A harness that compiles with the C toolchain named in `config`
    pub fn new(config: HarnessConfig) -> Self {
        let toolchain = CToolchain::from_config(&config);
        Self::with_toolchain(config, Box::new(toolchain))
    }

    pub fn with_toolchain(config: HarnessConfig, toolchain: Box<dyn Toolchain>) -> Self {
        let compiler = Compiler::new(toolchain, config.compile_timeout);
        let executor = Executor::new(config.run_timeout, config.limits.clone());
        Self {
            config,
            parser: TestCaseParser::new(),
            compiler,
            executor,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Grade every program in `source_dir` against `raw_tests`
    pub async fn run(&self, source_dir: &Path, raw_tests: &RawTestCaseInput) -> RunReport {
        self.run_until(source_dir, raw_tests, std::future::pending())
            .await
    }

    /// Like [`run`](Self::run), but stops early once `shutdown` resolves. The
    /// running subprocess is killed and the build directory is still removed.
    pub async fn run_until<F>(
        &self,
        source_dir: &Path,
        raw_tests: &RawTestCaseInput,
        shutdown: F,
    ) -> RunReport
    where
        F: Future<Output = ()>,
    {
        let mut store = ArtifactStore::for_run(&self.config.build_base);

        let test_cases = self.parser.parse(raw_tests);
        if test_cases.is_empty() {
            store.purge_all();
            return Transcript::degenerate("No valid test cases found to run.".to_string());
        }
        info!(
            "Grading {:?} with {} test case(s), build root {:?}",
            source_dir,
            test_cases.len(),
            store.root()
        );

        let mut transcript = Transcript::new();
        let outcome = tokio::select! {
            result = self.grade(&store, source_dir, &test_cases, &mut transcript) => Some(result),
            _ = shutdown => None,
        };

        store.purge_all();

        match outcome {
            Some(Ok(Flow::Graded)) => {}
            Some(Ok(Flow::NoSources)) => {
                let message = match self.config.layout {
                    SourceLayout::Flat => format!(
                        "No .{} files found in '{}'.",
                        self.compiler.source_extension(),
                        source_dir.display()
                    ),
                    SourceLayout::ProgramDirs => format!(
                        "No program directories containing {} found in '{}'.",
                        PROGRAM_DIR_ENTRY,
                        source_dir.display()
                    ),
                };
                return Transcript::degenerate(message);
            }
            Some(Err(e)) => {
                warn!("Run aborted: {}", e);
                transcript.push(format!("FATAL ERROR during test execution: {}", e));
                transcript.fail();
            }
            None => {
                warn!("Run cancelled");
                transcript.push("Run cancelled before all tests completed.");
                transcript.fail();
            }
        }

        let report = transcript.finish();
        info!("Run finished, overall passed: {}", report.overall_passed);
        report
    }

    async fn grade(
        &self,
        store: &ArtifactStore,
        source_dir: &Path,
        test_cases: &[TestCase],
        transcript: &mut Transcript,
    ) -> Result<Flow> {
        let programs = discover(
            source_dir,
            self.config.layout,
            self.compiler.source_extension(),
        )
        .await?;
        if programs.is_empty() {
            return Ok(Flow::NoSources);
        }
        info!("Found {} program(s) to test", programs.len());

        let mut taken = HashSet::new();
        for program in &programs {
            let binary_name = unique_binary_name(&program.name, &mut taken);
            transcript.push("");
            transcript.push(format!(
                "--- Processing C File: {} ---",
                program.source_path.display()
            ));

            let compiled = self
                .compiler
                .compile(store, &program.source_path, &binary_name)
                .await;
            let diagnostics = compiled.diagnostics.trim();

            let binary_path = match compiled.binary() {
                Ok(path) => path,
                Err(e) => {
                    warn!("{}: {}", program.name, e);
                    transcript.push(format!(
                        "Compilation FAILED for {}.",
                        program.source_path.display()
                    ));
                    transcript.push_compiler_output(diagnostics);
                    transcript.fail();
                    continue;
                }
            };

            transcript.push(format!("Compilation successful for {}.", program.name));
            transcript.push_compiler_output(diagnostics);

            for test_case in test_cases {
                transcript.push("");
                transcript.push(format!(
                    "--- Running Test Case {} for {} ---",
                    test_case.number, program.name
                ));
                let result = self.executor.run(binary_path, test_case).await;
                transcript.push(result.message);
                if !result.stderr.is_empty() {
                    transcript.push(format!(
                        "{} - Test {} generated stderr: {}",
                        program.name, test_case.number, result.stderr
                    ));
                }
                if !result.passed {
                    transcript.fail();
                }
            }
        }

        Ok(Flow::Graded)
    }
}

/// List candidate programs in lexicographic order of their names
pub(crate) async fn discover(
    source_dir: &Path,
    layout: SourceLayout,
    extension: &str,
) -> Result<Vec<SourceProgram>> {
    let mut programs = Vec::new();
    let mut entries = fs::read_dir(source_dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Skipping {:?}: {}", path, e);
                continue;
            }
        };

        let found = match layout {
            SourceLayout::Flat => {
                let matches = metadata.is_file()
                    && path.extension().is_some_and(|ext| ext == extension);
                matches
                    .then(|| path.file_stem())
                    .flatten()
                    .map(|stem| (stem.to_string_lossy().into_owned(), path.clone()))
            }
            SourceLayout::ProgramDirs => {
                let main = path.join(PROGRAM_DIR_ENTRY);
                (metadata.is_dir() && main.is_file())
                    .then(|| path.file_name())
                    .flatten()
                    .map(|dir| (dir.to_string_lossy().into_owned(), main))
            }
        };

        if let Some((name, source_path)) = found {
            programs.push(SourceProgram { name, source_path });
        }
    }

    programs.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.source_path.cmp(&b.source_path))
    });
    Ok(programs)
}

/// `<name>_exe`, restricted to a safe alphabet and made unique within the run
fn unique_binary_name(program_name: &str, taken: &mut HashSet<String>) -> String {
    let safe: String = program_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let base = format!("{}_exe", safe);

    let mut candidate = base.clone();
    let mut n = 2;
    while !taken.insert(candidate.clone()) {
        candidate = format!("{}_{}", base, n);
        n += 1;
    }
    candidate
}
