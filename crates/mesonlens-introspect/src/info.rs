//! Tool metadata recorded in the build directory

use mesonlens_core::ToolVersion;
use serde::Deserialize;

/// Subset of `meson-info.json` the integration needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MesonInfo {
    pub meson_version: ToolVersion,
}

#[derive(Deserialize)]
struct RawVersion {
    #[serde(default = "invalid_component")]
    major: i32,
    #[serde(default = "invalid_component")]
    minor: i32,
    #[serde(default = "invalid_component")]
    patch: i32,
}

fn invalid_component() -> i32 {
    -1
}

#[derive(Deserialize)]
struct RawInfo {
    meson_version: RawVersion,
}

impl MesonInfo {
    pub(crate) fn from_json(data: &[u8]) -> Option<Self> {
        let raw: RawInfo = serde_json::from_slice(data).ok()?;
        Some(Self {
            meson_version: ToolVersion::new(
                raw.meson_version.major,
                raw.meson_version.minor,
                raw.meson_version.patch,
            ),
        })
    }
}
