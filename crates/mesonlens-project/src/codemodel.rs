//! Code-model extraction
//!
//! Turns each target's source groups into the flat data a C/C++ code
//! model consumes: files, include paths, macros and leftover compiler
//! flags. Also the kit check: a build directory configured with other
//! compilers than the active kit prescribes needs a fresh setup.

use mesonlens_core::KitData;
use mesonlens_introspect::{SourceGroup, Target};
use std::path::{Path, PathBuf};

const INCLUDE_FLAGS: [&str; 5] = ["-I", "/I", "-isystem", "-imsvc", "/imsvc"];
const DEFINE_FLAGS: [&str; 2] = ["-D", "/D"];
const UNDEFINE_FLAGS: [&str; 2] = ["-U", "/U"];

/// A preprocessor macro seen on the compiler command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    pub name: String,
    pub value: Option<String>,
    pub undefine: bool,
}

impl Macro {
    fn define(body: &str) -> Self {
        match body.split_once('=') {
            Some((name, value)) => Self {
                name: name.to_owned(),
                value: Some(value.to_owned()),
                undefine: false,
            },
            None => Self {
                name: body.to_owned(),
                value: None,
                undefine: false,
            },
        }
    }

    fn undefine(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            value: None,
            undefine: true,
        }
    }
}

/// Compiler parameters split into what the code model understands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerArgs {
    pub args: Vec<String>,
    pub include_paths: Vec<String>,
    pub macros: Vec<Macro>,
}

fn extract_value_if_matches(arg: &str, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find_map(|flag| arg.strip_prefix(flag).map(str::to_owned))
}

/// Split raw compiler parameters into include paths, macros and opaque
/// flags. Anything unrecognized passes through untouched.
pub fn split_args(parameters: &[String]) -> CompilerArgs {
    let mut split = CompilerArgs::default();
    for arg in parameters {
        if let Some(include) = extract_value_if_matches(arg, &INCLUDE_FLAGS) {
            split.include_paths.push(include);
        } else if let Some(define) = extract_value_if_matches(arg, &DEFINE_FLAGS) {
            split.macros.push(Macro::define(&define));
        } else if let Some(undef) = extract_value_if_matches(arg, &UNDEFINE_FLAGS) {
            split.macros.push(Macro::undefine(&undef));
        } else {
            split.args.push(arg.clone());
        }
    }
    split
}

/// Code-model data for one (target, source group) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeModelPart {
    pub display_name: String,
    pub build_system_target: String,
    pub language: String,
    pub files: Vec<PathBuf>,
    pub include_paths: Vec<PathBuf>,
    pub macros: Vec<Macro>,
    pub flags: Vec<String>,
}

fn to_absolute(build_dir: &Path, path: &str) -> PathBuf {
    if path.starts_with('/') {
        PathBuf::from(path)
    } else {
        build_dir.join(path)
    }
}

/// Build one part per source group of every target.
pub fn build_code_model(targets: &[Target], build_dir: &Path) -> Vec<CodeModelPart> {
    let mut parts = Vec::new();
    for target in targets {
        for group in &target.sources {
            let split = split_args(&group.parameters);
            let mut files = group.sources.clone();
            files.extend(group.generated_sources.iter().cloned());
            parts.push(CodeModelPart {
                display_name: target.name.clone(),
                build_system_target: target.name.clone(),
                language: group.language.clone(),
                files,
                include_paths: split
                    .include_paths
                    .iter()
                    .map(|path| to_absolute(build_dir, path))
                    .collect(),
                macros: split.macros,
                flags: split.args,
            });
        }
    }
    parts
}

fn group_matches_kit(kit: &KitData, group: &SourceGroup) -> bool {
    let kit_compiler = match group.language.as_str() {
        "c" => &kit.c_compiler_path,
        "cpp" => &kit.cpp_compiler_path,
        _ => return true,
    };
    match (kit_compiler, group.compiler.first()) {
        (Some(expected), Some(actual)) => Path::new(actual) == expected,
        // an unconfigured kit or a group without a recorded compiler
        // places no constraint
        _ => true,
    }
}

/// True when every source group was configured with the kit's compilers.
pub fn matches_kit(targets: &[Target], kit: &KitData) -> bool {
    targets
        .iter()
        .flat_map(|target| target.sources.iter())
        .all(|group| group_matches_kit(kit, group))
}
