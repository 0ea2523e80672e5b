use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;

use crate::{toolchain::Toolchain, HarnessConfig};

/// A gcc-compatible C compiler
#[derive(Debug, Clone)]
pub struct CToolchain {
    compiler: String,
    flags: Vec<String>,
    std_version: Option<String>,
}

impl CToolchain {
    pub fn new(compiler: Option<String>, std_version: Option<String>) -> Self {
        Self {
            compiler: compiler.unwrap_or_else(|| "gcc".to_string()),
            flags: vec!["-Wall".to_string(), "-Wextra".to_string()],
            std_version,
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            compiler: config.compiler.clone(),
            flags: config.compiler_flags.clone(),
            std_version: config.c_standard.clone(),
        }
    }
}

#[async_trait]
impl Toolchain for CToolchain {
    fn program(&self) -> &str {
        &self.compiler
    }

    fn source_extension(&self) -> &str {
        "c"
    }

    fn compile_args(&self, source: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.flags.iter().map(OsString::from).collect();
        if let Some(std) = &self.std_version {
            args.push(format!("-std={}", std).into());
        }
        args.push(source.into());
        args.push("-o".into());
        args.push(output.into());
        args
    }
}
