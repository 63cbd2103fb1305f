//! Project-tree construction
//!
//! Pure transformation of parsed targets into the hierarchical tree the
//! IDE displays: source root, one node per target, one leaf per source
//! file. Generated sources stay out of the tree; they only feed the code
//! model.

use mesonlens_introspect::Target;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The source-tree root.
    Project,
    /// A build target, tagged with its display name.
    Target { display_name: String },
    /// A plain source file.
    Source,
}

/// One node of the project tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectNode {
    pub path: PathBuf,
    pub kind: NodeKind,
    pub children: Vec<ProjectNode>,
}

/// Build the tree for `targets` under `source_dir`.
///
/// Every target appears, even with zero source files.
pub fn build_tree(source_dir: &Path, targets: &[Target]) -> ProjectNode {
    let children = targets
        .iter()
        .map(|target| ProjectNode {
            path: target.defined_in.clone(),
            kind: NodeKind::Target {
                display_name: target.name.clone(),
            },
            children: target
                .sources
                .iter()
                .flat_map(|group| group.sources.iter())
                .map(|source| ProjectNode {
                    path: source.clone(),
                    kind: NodeKind::Source,
                    children: Vec::new(),
                })
                .collect(),
        })
        .collect();
    ProjectNode {
        path: source_dir.to_path_buf(),
        kind: NodeKind::Project,
        children,
    }
}
