//! Build-tool descriptors
//!
//! A tool descriptor identifies one installed executable, probes its
//! version and builds the command lines for `setup`, `configure` and
//! `introspect`. Command builders are pure, nothing here spawns the
//! long-running configure process itself.

use crate::command::Command;
use crate::constants;
use crate::version::ToolVersion;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process;
use tracing::debug;
use uuid::Uuid;

/// Opaque stable identifier of a registered tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolId(Uuid);

impl ToolId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ToolId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ToolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn find_tool_in(dirs: &[PathBuf], candidates: &[&str]) -> Option<PathBuf> {
    for name in candidates {
        for dir in dirs {
            let path = dir.join(name);
            if is_executable(&path) {
                return Some(path);
            }
            #[cfg(windows)]
            {
                let path = dir.join(format!("{name}.exe"));
                if path.is_file() {
                    return Some(path);
                }
            }
        }
    }
    None
}

/// Search the process `PATH` for the first matching executable.
pub fn find_tool(candidates: &[&str]) -> Option<PathBuf> {
    let dirs: Vec<PathBuf> = std::env::var_os("PATH")
        .map(|raw| std::env::split_paths(&raw).collect())
        .unwrap_or_default();
    find_tool_in(&dirs, candidates)
}

/// Run `<path> --version` and parse the first output line.
///
/// Any failure (missing file, not executable, no output, non-numeric
/// output) yields [`ToolVersion::INVALID`].
pub fn query_version(path: &Path) -> ToolVersion {
    if !is_executable(path) {
        return ToolVersion::INVALID;
    }
    let output = match process::Command::new(path).arg("--version").output() {
        Ok(output) => output,
        Err(err) => {
            debug!("version probe of {:?} failed: {err}", path);
            return ToolVersion::INVALID;
        }
    };
    let stdout = String::from_utf8_lossy(&output.stdout);
    match stdout.lines().next() {
        Some(line) => ToolVersion::parse(line),
        None => ToolVersion::INVALID,
    }
}

/// True iff the build directory carries a complete set of introspection
/// artifacts. A single missing file means "not set up".
pub fn is_setup(build_dir: &Path) -> bool {
    let info_dir = build_dir.join(constants::MESON_INFO_DIR);
    constants::MESON_INTRO_FILES
        .iter()
        .all(|file| info_dir.join(file).exists())
}

/// One installed Meson executable.
#[derive(Debug, Clone)]
pub struct MesonTool {
    name: String,
    exe: PathBuf,
    version: ToolVersion,
    auto_detected: bool,
    id: ToolId,
}

impl MesonTool {
    /// Register a tool at `exe`, probing its version.
    pub fn new(name: impl Into<String>, exe: impl Into<PathBuf>) -> Self {
        Self::with_id(name, exe, ToolId::new(), false)
    }

    pub fn with_id(
        name: impl Into<String>,
        exe: impl Into<PathBuf>,
        id: ToolId,
        auto_detected: bool,
    ) -> Self {
        let exe = exe.into();
        let version = query_version(&exe);
        Self {
            name: name.into(),
            exe,
            version,
            auto_detected,
            id,
        }
    }

    /// Locate a system Meson on `PATH`.
    pub fn find() -> Option<PathBuf> {
        find_tool(&["meson"])
    }

    pub fn tool_name() -> &'static str {
        "Meson"
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exe(&self) -> &Path {
        &self.exe
    }

    pub fn version(&self) -> ToolVersion {
        self.version
    }

    pub fn auto_detected(&self) -> bool {
        self.auto_detected
    }

    pub fn id(&self) -> ToolId {
        self.id
    }

    pub fn is_valid(&self) -> bool {
        self.exe.exists() && self.version.is_valid()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Point the descriptor at a new executable and re-probe its version.
    pub fn set_exe(&mut self, exe: impl Into<PathBuf>) {
        self.exe = exe.into();
        self.version = query_version(&self.exe);
    }

    /// `meson setup <options> <source> <build>`, run from the source dir.
    pub fn setup(&self, source_dir: &Path, build_dir: &Path, options: &[String]) -> Command {
        let mut args = vec!["setup".to_owned()];
        args.extend(options.iter().cloned());
        args.push(source_dir.display().to_string());
        args.push(build_dir.display().to_string());
        Command::new(&self.exe, source_dir, args)
    }

    /// `meson configure <options> <build>`, run from the build dir.
    ///
    /// Degrades to [`setup`](Self::setup) when the build directory has not
    /// been set up yet.
    pub fn configure(&self, source_dir: &Path, build_dir: &Path, options: &[String]) -> Command {
        if !is_setup(build_dir) {
            return self.setup(source_dir, build_dir, options);
        }
        let mut args = vec!["configure".to_owned()];
        args.extend(options.iter().cloned());
        args.push(build_dir.display().to_string());
        Command::new(&self.exe, build_dir, args)
    }

    /// `meson introspect -a <source>/meson.build`, dumping everything to
    /// stdout as one JSON document.
    pub fn introspect(&self, source_dir: &Path) -> Command {
        Command::new(
            &self.exe,
            source_dir,
            vec![
                "introspect".to_owned(),
                "-a".to_owned(),
                source_dir
                    .join(constants::BUILD_FILE_NAME)
                    .display()
                    .to_string(),
            ],
        )
    }
}

/// The generator executable driven for actual builds.
#[derive(Debug, Clone)]
pub struct NinjaTool {
    exe: PathBuf,
    version: ToolVersion,
}

impl NinjaTool {
    pub fn new(exe: impl Into<PathBuf>) -> Self {
        let exe = exe.into();
        let version = query_version(&exe);
        Self { exe, version }
    }

    pub fn find() -> Option<PathBuf> {
        find_tool(&["ninja", "ninja-build"])
    }

    pub fn exe(&self) -> &Path {
        &self.exe
    }

    pub fn version(&self) -> ToolVersion {
        self.version
    }

    pub fn is_valid(&self) -> bool {
        self.exe.exists() && self.version.is_valid()
    }

    /// `ninja <target>`, run from the build directory.
    pub fn build(&self, build_dir: &Path, target: &str) -> Command {
        Command::new(&self.exe, build_dir, vec![target.to_owned()])
    }
}

/// Persisted form of a tool registration.
///
/// The version is deliberately absent: it is re-probed on load so a tool
/// upgraded behind our back is picked up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedTool {
    pub name: String,
    pub exe: PathBuf,
    pub id: ToolId,
    pub autodetected: bool,
}

impl From<&MesonTool> for SavedTool {
    fn from(tool: &MesonTool) -> Self {
        Self {
            name: tool.name.clone(),
            exe: tool.exe.clone(),
            id: tool.id,
            autodetected: tool.auto_detected,
        }
    }
}

impl From<SavedTool> for MesonTool {
    fn from(saved: SavedTool) -> Self {
        Self::with_id(saved.name, saved.exe, saved.id, saved.autodetected)
    }
}
