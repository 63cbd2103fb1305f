//! MesonLens Introspect
//!
//! Parses the build tool's JSON introspection artifacts into typed
//! domain entities. Parsing is resilient by omission: a missing or
//! malformed document degrades to an empty result for that document
//! only, it never fails the whole parse.
//!
//! Two sources are supported: the `meson-info/` files of a set-up build
//! directory, and the single JSON document `introspect -a` writes to
//! stdout (with `targets` and `buildoptions` arrays under fixed keys).

pub mod info;
pub mod options;
pub mod target;

pub use info::MesonInfo;
pub use options::{BuildOption, FeatureState, OptionValue};
pub use target::{SourceGroup, Target, TargetKind};

use mesonlens_core::constants;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Everything one introspection pass yields.
#[derive(Debug, Clone, Default)]
pub struct IntrospectionResult {
    pub targets: Vec<Target>,
    pub options: Vec<BuildOption>,
    pub info: Option<MesonInfo>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawSourceGroup {
    language: String,
    compiler: Vec<String>,
    parameters: Vec<String>,
    sources: Vec<PathBuf>,
    generated_sources: Vec<PathBuf>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawTarget {
    #[serde(rename = "type")]
    type_str: String,
    name: String,
    id: String,
    defined_in: PathBuf,
    filename: Vec<String>,
    subproject: Option<String>,
    target_sources: Vec<RawSourceGroup>,
}

impl From<RawTarget> for Target {
    fn from(raw: RawTarget) -> Self {
        Self {
            kind: TargetKind::from_type_str(&raw.type_str),
            name: raw.name,
            id: raw.id,
            defined_in: raw.defined_in,
            filename: raw.filename,
            subproject: raw.subproject.filter(|sub| !sub.is_empty()),
            sources: raw
                .target_sources
                .into_iter()
                .map(|group| SourceGroup {
                    language: group.language,
                    compiler: group.compiler,
                    parameters: group.parameters,
                    sources: group.sources,
                    generated_sources: group.generated_sources,
                })
                .collect(),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawOption {
    name: String,
    section: String,
    description: String,
    #[serde(rename = "type")]
    type_str: String,
    value: Value,
    choices: Vec<String>,
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default()
}

impl From<RawOption> for BuildOption {
    fn from(raw: RawOption) -> Self {
        let value = match raw.type_str.as_str() {
            "integer" => OptionValue::Integer(raw.value.as_i64().unwrap_or_default()),
            "string" => OptionValue::Text(raw.value.as_str().unwrap_or_default().to_owned()),
            "boolean" => OptionValue::Boolean(raw.value.as_bool().unwrap_or_default()),
            "combo" => {
                let current = raw.value.as_str().unwrap_or_default();
                let value = if raw.choices.iter().any(|choice| choice == current) {
                    current.to_owned()
                } else {
                    raw.choices.first().cloned().unwrap_or_default()
                };
                OptionValue::Combo {
                    choices: raw.choices,
                    value,
                }
            }
            "feature" => OptionValue::Feature(
                FeatureState::from_str(raw.value.as_str().unwrap_or_default())
                    .unwrap_or(FeatureState::Enabled),
            ),
            "array" => OptionValue::Array(string_list(&raw.value)),
            _ => OptionValue::Unknown,
        };
        BuildOption::new(raw.name, raw.section, raw.description, value)
    }
}

fn parse_targets(data: &[u8]) -> Vec<Target> {
    match serde_json::from_slice::<Vec<RawTarget>>(data) {
        Ok(raw) => raw.into_iter().map(Target::from).collect(),
        Err(err) => {
            warn!("discarding malformed target document: {err}");
            Vec::new()
        }
    }
}

fn parse_options(data: &[u8]) -> Vec<BuildOption> {
    match serde_json::from_slice::<Vec<RawOption>>(data) {
        Ok(raw) => raw.into_iter().map(BuildOption::from).collect(),
        Err(err) => {
            warn!("discarding malformed build-option document: {err}");
            Vec::new()
        }
    }
}

fn read_info_file(build_dir: &Path, file: &str) -> Vec<u8> {
    let path = build_dir.join(constants::MESON_INFO_DIR).join(file);
    std::fs::read(&path).unwrap_or_default()
}

/// Read the recorded tool metadata of a set-up build directory.
pub fn meson_info(build_dir: &Path) -> Option<MesonInfo> {
    MesonInfo::from_json(&read_info_file(build_dir, constants::MESON_INFO))
}

/// Parse the introspection files of a build directory.
pub fn parse_build_dir(build_dir: &Path) -> IntrospectionResult {
    IntrospectionResult {
        targets: parse_targets(&read_info_file(build_dir, constants::MESON_INTRO_TARGETS)),
        options: parse_options(&read_info_file(
            build_dir,
            constants::MESON_INTRO_BUILDOPTIONS,
        )),
        info: meson_info(build_dir),
    }
}

/// Parse the single JSON document captured from `introspect -a`.
pub fn parse_stdout(data: &[u8]) -> IntrospectionResult {
    let document: Value = match serde_json::from_slice(data) {
        Ok(document) => document,
        Err(err) => {
            warn!("discarding malformed introspection output: {err}");
            return IntrospectionResult::default();
        }
    };
    let section = |key: &str| document.get(key).map(|value| serde_json::to_vec(value).unwrap_or_default());
    IntrospectionResult {
        targets: section("targets").map(|data| parse_targets(&data)).unwrap_or_default(),
        options: section("buildoptions").map(|data| parse_options(&data)).unwrap_or_default(),
        info: None,
    }
}
