pub mod defaults {
    use crate::HarnessConfig;
    use std::path::Path;
    use tokio::time::Duration;

    pub fn default_timeout() -> Duration {
        Duration::from_secs(5)
    }

    pub fn short_timeout() -> Duration {
        Duration::from_secs(2)
    }

    pub fn test_config(build_base: &Path) -> HarnessConfig {
        HarnessConfig::default()
            .with_build_base(build_base)
            .with_run_timeout(default_timeout())
    }
}

pub mod sources {
    use crate::{
        toolchain::CToolchain, ArtifactStore, CompilationResult, Compiler, HarnessConfig,
    };
    use assert_fs::prelude::*;
    use assert_fs::TempDir;
    use std::path::Path;

    /// Write `code` as `<name>.c` into `dir`
    pub fn write_program(dir: &TempDir, name: &str, code: &str) {
        dir.child(format!("{}.c", name)).write_str(code).unwrap();
    }

    /// Compile one program into `store` with the default C toolchain
    pub async fn compile_program(
        store: &ArtifactStore,
        source_dir: &TempDir,
        name: &str,
        code: &str,
    ) -> CompilationResult {
        write_program(source_dir, name, code);
        let config = HarnessConfig::default();
        let compiler = Compiler::new(
            Box::new(CToolchain::from_config(&config)),
            config.compile_timeout,
        );
        compiler
            .compile(
                store,
                &source_dir.path().join(format!("{}.c", name)),
                &format!("{}_exe", name),
            )
            .await
    }

    /// True when no run directory is left under `base`
    pub fn build_base_is_clean(base: &Path) -> bool {
        match std::fs::read_dir(base) {
            Ok(entries) => entries.count() == 0,
            Err(_) => true,
        }
    }
}
