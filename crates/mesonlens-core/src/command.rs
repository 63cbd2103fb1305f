//! External tool invocation description

use std::fmt;
use std::path::PathBuf;

/// One invocation of an external tool: executable, working directory and
/// argument list. Value type, built fresh for every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub exe: PathBuf,
    pub work_dir: PathBuf,
    pub args: Vec<String>,
}

impl Command {
    pub fn new(exe: impl Into<PathBuf>, work_dir: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            exe: exe.into(),
            work_dir: work_dir.into(),
            args,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.exe.display(), self.args.join(" "))
    }
}
