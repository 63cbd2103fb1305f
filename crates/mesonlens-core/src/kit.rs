//! Kit/toolchain data consumed at the integration boundary.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Compiler paths configured on the active kit.
///
/// This is the only piece of kit configuration the parsing pipeline needs:
/// when a parsed target was configured with a different compiler than the
/// kit prescribes, the build directory has to be set up again. An unset
/// path places no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitData {
    pub c_compiler_path: Option<PathBuf>,
    pub cpp_compiler_path: Option<PathBuf>,
}

impl KitData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_c_compiler(mut self, path: impl Into<PathBuf>) -> Self {
        self.c_compiler_path = Some(path.into());
        self
    }

    pub fn with_cpp_compiler(mut self, path: impl Into<PathBuf>) -> Self {
        self.cpp_compiler_path = Some(path.into());
        self
    }
}
