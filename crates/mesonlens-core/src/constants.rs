//! Fixed names used by the external tool's build directories and logs.

/// Subdirectory of a build directory holding introspection artifacts.
pub const MESON_INFO_DIR: &str = "meson-info";

/// Top-level info document, carries the recorded tool version.
pub const MESON_INFO: &str = "meson-info.json";

pub const MESON_INTRO_BENCHMARKS: &str = "intro-benchmarks.json";
pub const MESON_INTRO_BUILDOPTIONS: &str = "intro-buildoptions.json";
pub const MESON_INTRO_BUILDSYSTEM_FILES: &str = "intro-buildsystem_files.json";
pub const MESON_INTRO_DEPENDENCIES: &str = "intro-dependencies.json";
pub const MESON_INTRO_INSTALLED: &str = "intro-installed.json";
pub const MESON_INTRO_PROJECTINFO: &str = "intro-projectinfo.json";
pub const MESON_INTRO_TARGETS: &str = "intro-targets.json";
pub const MESON_INTRO_TESTS: &str = "intro-tests.json";

/// All files that must be present for a build directory to count as set up.
pub const MESON_INTRO_FILES: [&str; 8] = [
    MESON_INTRO_TESTS,
    MESON_INTRO_TARGETS,
    MESON_INTRO_INSTALLED,
    MESON_INTRO_BENCHMARKS,
    MESON_INTRO_BUILDOPTIONS,
    MESON_INTRO_PROJECTINFO,
    MESON_INTRO_DEPENDENCIES,
    MESON_INTRO_BUILDSYSTEM_FILES,
];

/// Root build file of a source directory.
pub const BUILD_FILE_NAME: &str = "meson.build";

/// Generator targets that exist even when not listed in introspection data.
pub mod targets {
    pub const ALL: &str = "all";
    pub const CLEAN: &str = "clean";
    pub const INSTALL: &str = "install";
    pub const TESTS: &str = "test";
    pub const BENCHMARK: &str = "benchmark";
}
