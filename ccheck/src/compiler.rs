use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{
    artifacts::ArtifactStore, error::Error, sandbox::Sandbox, toolchain::Toolchain,
    CompilationResult,
};

/// Prefixed to diagnostics when the compiler itself cannot be found, so callers can
/// tell broken grading infrastructure apart from code that does not compile.
pub const TOOLCHAIN_NOT_FOUND: &str = "[toolchain not found]";

/// Compiles one source file at a time into the artifact directory
pub struct Compiler {
    toolchain: Box<dyn Toolchain>,
    timeout: Duration,
}

impl Compiler {
    pub fn new(toolchain: Box<dyn Toolchain>, timeout: Duration) -> Self {
        Self { toolchain, timeout }
    }

    pub fn source_extension(&self) -> &str {
        self.toolchain.source_extension()
    }

    /// Compile `source_path` into `binary_name` inside `store`.
    ///
    /// Never fails: every problem is folded into the returned result. On failure no
    /// file is left at the binary path.
    pub async fn compile(
        &self,
        store: &ArtifactStore,
        source_path: &Path,
        binary_name: &str,
    ) -> CompilationResult {
        let source = source_path.to_path_buf();

        let binary_path = match store.allocate(binary_name) {
            Ok(path) => path,
            Err(e) => return CompilationResult::failed(source, e.to_string()),
        };
        if let Err(e) = store.ensure().await {
            return CompilationResult::failed(
                source,
                format!("Failed to create build directory: {}", e),
            );
        }
        // A stale binary from an earlier attempt must not pass as this compile's output.
        remove_quietly(&binary_path).await;

        info!("Compiling {:?} to {:?}", source_path, binary_path);
        let sandbox = Sandbox::new(store.root())
            .with_env("PATH", std::env::var_os("PATH").unwrap_or_default())
            .with_env("LC_ALL", "C");

        // The compiler runs inside the build directory, so relative paths would break.
        let absolute_source =
            std::path::absolute(source_path).unwrap_or_else(|_| source_path.to_path_buf());
        let outcome = self
            .toolchain
            .compile(&sandbox, &absolute_source, &binary_path, self.timeout)
            .await;

        match outcome {
            Ok(output) if output.status.success() && binary_path.is_file() => {
                debug!("Compilation of {:?} succeeded", source_path);
                CompilationResult {
                    source_path: source,
                    succeeded: true,
                    binary_path: Some(binary_path),
                    diagnostics: output.stdout + &output.stderr,
                }
            }
            Ok(output) => {
                warn!(
                    "Compilation of {:?} failed with {}",
                    source_path, output.status
                );
                remove_quietly(&binary_path).await;
                let mut diagnostics = output.stdout + &output.stderr;
                if output.status.success() {
                    diagnostics.push_str("\nCompiler reported success but produced no binary.");
                }
                CompilationResult::failed(source, diagnostics)
            }
            Err(Error::ToolchainUnavailable(reason)) => {
                warn!("Toolchain unavailable: {}", reason);
                CompilationResult::failed(source, format!("{} {}", TOOLCHAIN_NOT_FOUND, reason))
            }
            Err(Error::ExecutionLaunchFailed { path, reason }) => {
                remove_quietly(&binary_path).await;
                CompilationResult::failed(
                    source,
                    format!(
                        "{} failed to launch {}: {}",
                        TOOLCHAIN_NOT_FOUND,
                        path.display(),
                        reason
                    ),
                )
            }
            Err(Error::Timeout {
                limit,
                stdout,
                stderr,
            }) => {
                remove_quietly(&binary_path).await;
                let mut diagnostics = stdout + &stderr;
                if !diagnostics.is_empty() {
                    diagnostics.push('\n');
                }
                diagnostics.push_str(&format!(
                    "Compilation timed out after {} seconds.",
                    limit.as_secs_f64()
                ));
                CompilationResult::failed(source, diagnostics)
            }
            Err(e) => {
                remove_quietly(&binary_path).await;
                CompilationResult::failed(source, format!("Compilation error: {}", e))
            }
        }
    }
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {:?}: {}", path, e),
    }
}
