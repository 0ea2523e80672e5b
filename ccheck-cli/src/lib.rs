use anyhow::{Context, Result};
use ccheck::{HarnessConfig, RawTestCaseInput, RunReport, SourceLayout};
use clap::Parser;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory holding the C programs to grade
    pub source_dir: PathBuf,

    /// Test-case file (JSON lines, or a JSON array of records); stdin when omitted or "-"
    #[arg(short, long)]
    pub tests: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Per-test time limit in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Per-compilation time limit in seconds
    #[arg(long)]
    pub compile_timeout: Option<u64>,

    /// Parent directory for per-run build directories
    #[arg(long)]
    pub build_root: Option<PathBuf>,

    /// C compiler to invoke
    #[arg(long)]
    pub compiler: Option<String>,

    /// Source layout: "flat" or "program-dirs"
    #[arg(long)]
    pub layout: Option<SourceLayout>,

    /// Print the report as JSON instead of the plain transcript
    #[arg(long)]
    pub json: bool,
}

/// JSON shape printed with `--json`
#[derive(Debug, Serialize)]
pub struct ReportOutput<'a> {
    pub passed: bool,
    pub message: String,
    pub lines: &'a [String],
}

impl<'a> From<&'a RunReport> for ReportOutput<'a> {
    fn from(report: &'a RunReport) -> Self {
        Self {
            passed: report.overall_passed,
            message: report.transcript(),
            lines: &report.transcript_lines,
        }
    }
}

/// Config file (if any) with command-line overrides applied
pub fn build_config(args: &Args) -> Result<HarnessConfig> {
    let mut config = match &args.config {
        Some(path) => HarnessConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => HarnessConfig::default(),
    };

    if let Some(secs) = args.timeout {
        config.run_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = args.compile_timeout {
        config.compile_timeout = Duration::from_secs(secs);
    }
    if let Some(root) = &args.build_root {
        config.build_base = root.clone();
    }
    if let Some(compiler) = &args.compiler {
        config.compiler = compiler.clone();
    }
    if let Some(layout) = args.layout {
        config.layout = layout;
    }

    config.validate()?;
    Ok(config)
}

/// Read test-case records from `path`, or stdin for `None` / "-"
pub fn read_tests(path: Option<&Path>) -> Result<RawTestCaseInput> {
    let text = match path {
        Some(p) if p != Path::new("-") => std::fs::read_to_string(p)
            .with_context(|| format!("Failed to read tests from {}", p.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read tests from stdin")?;
            buf
        }
    };
    Ok(decode_tests(text))
}

/// A JSON array or string document is taken as-is; anything else is JSON lines
pub fn decode_tests(text: String) -> RawTestCaseInput {
    match text.trim_start().chars().next() {
        Some('[') | Some('"') => serde_json::from_str(&text)
            .unwrap_or(RawTestCaseInput::TextBlob(text)),
        _ => RawTestCaseInput::TextBlob(text),
    }
}
