//! # ccheck
//!
//! A build-and-test harness for learner-submitted C programs. Every source file
//! found in a directory is compiled with a native toolchain and the resulting
//! binary is run once per declarative test case. The outcome is a [`RunReport`]
//! holding a human-readable transcript and an overall verdict.
//!
//! Compiled artifacts live in a per-run build directory that is removed when the
//! run ends, whatever the outcome.

mod artifacts;
mod compiler;
mod config;
mod error;
mod executor;
mod harness;
mod parser;
mod sandbox;
mod toolchain;
mod types;

#[cfg(test)]
mod tests;

pub use artifacts::ArtifactStore;
pub use compiler::{Compiler, TOOLCHAIN_NOT_FOUND};
pub use config::{HarnessConfig, SourceLayout};
pub use error::Error;
pub use executor::Executor;
pub use harness::{Harness, SourceProgram};
pub use parser::{parse, TestCaseParser};
pub use sandbox::{ProcessOutput, Sandbox};
pub use toolchain::{CToolchain, Toolchain};
pub use types::{
    CompilationResult, ExecutionResult, RawTestCaseInput, ResourceLimits, RunReport, TestCase,
};

/// Result type for harness operations
pub type Result<T> = std::result::Result<T, Error>;
