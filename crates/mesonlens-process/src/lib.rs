//! MesonLens Process
//!
//! Runs the external build tool asynchronously and turns its console
//! output into categorized diagnostics and progress signals.
//!
//! ## Modules
//!
//! - `runner` - async process execution with capture and cancellation
//! - `output` - configure-log classification (errors, multi-line warnings)
//! - `progress` - generator-log `[N/M]` progress extraction

pub mod output;
pub mod progress;
pub mod runner;

pub use output::{Diagnostic, FileLocation, OutputClassifier, Severity};
pub use progress::NinjaProgressParser;
pub use runner::{run, CancelHandle, CaptureMode, ExitReason, ProcessEvent, ProcessHandle};
