//! MesonLens Core
//!
//! Core types shared by the MesonLens build-system integration:
//! tool descriptors, invocation commands, version probing and the
//! build-directory setup marker.

pub mod command;
pub mod constants;
pub mod error;
pub mod kit;
pub mod tool;
pub mod version;

pub use command::Command;
pub use error::{Error, Result};
pub use kit::KitData;
pub use tool::{find_tool, is_setup, query_version, MesonTool, NinjaTool, SavedTool, ToolId};
pub use version::ToolVersion;
