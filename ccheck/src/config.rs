use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::{error::Error, types::duration_serde, ResourceLimits, Result};

/// How candidate programs are laid out in the source directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceLayout {
    /// Every `*.c` file directly inside the directory is its own program
    #[default]
    Flat,
    /// Every immediate subdirectory holding a `main.c` is a program named after the subdirectory
    ProgramDirs,
}

impl FromStr for SourceLayout {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "flat" => Ok(SourceLayout::Flat),
            "program-dirs" => Ok(SourceLayout::ProgramDirs),
            _ => Err(format!("Unsupported source layout: {}", s)),
        }
    }
}

/// Harness settings, usually loaded from `ccheck.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Compiler executable, resolved on PATH
    pub compiler: String,
    /// Flags passed before the source file
    pub compiler_flags: Vec<String>,
    /// Optional `-std=` value, e.g. "c11"
    pub c_standard: Option<String>,
    /// Wall-clock limit for one compilation
    #[serde(with = "duration_serde")]
    pub compile_timeout: Duration,
    /// Wall-clock limit for one test execution
    #[serde(with = "duration_serde")]
    pub run_timeout: Duration,
    /// Parent of the per-run build directories
    pub build_base: PathBuf,
    pub layout: SourceLayout,
    pub limits: ResourceLimits,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            compiler: "gcc".to_string(),
            compiler_flags: vec!["-Wall".to_string(), "-Wextra".to_string()],
            c_standard: None,
            compile_timeout: Duration::from_secs(30),
            run_timeout: Duration::from_secs(5),
            build_base: std::env::temp_dir().join("ccheck-build"),
            layout: SourceLayout::Flat,
            limits: ResourceLimits::default(),
        }
    }
}

impl HarnessConfig {
    /// Load settings from a TOML file; absent keys keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        let config: HarnessConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.compiler.trim().is_empty() {
            return Err(Error::Config("compiler must not be empty".to_string()));
        }
        if self.run_timeout.is_zero() {
            return Err(Error::Config("run_timeout must be positive".to_string()));
        }
        if self.compile_timeout.is_zero() {
            return Err(Error::Config("compile_timeout must be positive".to_string()));
        }
        Ok(())
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    pub fn with_build_base(mut self, build_base: impl Into<PathBuf>) -> Self {
        self.build_base = build_base.into();
        self
    }

    pub fn with_layout(mut self, layout: SourceLayout) -> Self {
        self.layout = layout;
        self
    }
}
