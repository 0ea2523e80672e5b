//! Native toolchains that turn one source file into one executable

mod c;

pub use c::CToolchain;

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use which::which;

use crate::{error::Error, sandbox::Sandbox, ProcessOutput, Result};

/// Trait for compilers the harness can drive
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Executable name or path of the compiler
    fn program(&self) -> &str;

    /// Extension of the source files this toolchain accepts, without the dot
    fn source_extension(&self) -> &str;

    /// Full argument vector for compiling `source` into `output`
    fn compile_args(&self, source: &Path, output: &Path) -> Vec<OsString>;

    /// Locate the compiler on PATH
    fn resolve(&self) -> Result<PathBuf> {
        which(self.program()).map_err(|e| {
            Error::ToolchainUnavailable(format!("'{}' could not be resolved: {}", self.program(), e))
        })
    }

    /// Run the compiler. A non-zero exit is reported through the returned
    /// [`ProcessOutput`], not as an error.
    async fn compile(
        &self,
        sandbox: &Sandbox,
        source: &Path,
        output: &Path,
        timeout: Duration,
    ) -> Result<ProcessOutput> {
        let program = self.resolve()?;
        let args = self.compile_args(source, output);
        sandbox.execute(&program, &args, timeout).await
    }
}

#[cfg(test)]
pub(crate) fn skip_if_not_available(tools: &[&str]) -> bool {
    let missing: Vec<_> = tools
        .iter()
        .filter(|tool| which(tool).is_err())
        .map(|s| (*s).to_string())
        .collect();

    if !missing.is_empty() {
        eprintln!("Skipping test: {} not available", missing.join(", "));
        return true;
    }
    false
}
