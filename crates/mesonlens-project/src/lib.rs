//! MesonLens Project
//!
//! Reconstructs the in-memory project model from the build tool's
//! introspection data and orchestrates the parsing pipeline.
//!
//! ## Modules
//!
//! - `orchestrator` - the setup/configure/introspect state machine
//! - `tree` - project-tree construction from parsed targets
//! - `codemodel` - compiler-flag extraction for the code model
//! - `registry` - the collection of registered build tools

pub mod codemodel;
pub mod orchestrator;
pub mod registry;
pub mod tree;

pub use codemodel::{build_code_model, matches_kit, split_args, CodeModelPart, CompilerArgs, Macro};
pub use orchestrator::{
    AppTarget, Notification, ParseResult, ParserState, ProjectParser, RequestOutcome, RunKind,
};
pub use registry::{ToolEvent, ToolRegistry};
pub use tree::{build_tree, NodeKind, ProjectNode};
