//! Parse orchestration
//!
//! One [`ProjectParser`] instance drives the whole pipeline for one build
//! system: decide setup vs configure vs introspect, run the external tool
//! without blocking the caller, hand the captured artifacts to the
//! introspection parser on a worker task and publish the finished project
//! model. A single-flight guard covers the process run and the background
//! parse as one critical section; overlapping requests are rejected.

use crate::codemodel::{self, CodeModelPart};
use crate::tree::{build_tree, ProjectNode};
use mesonlens_core::{constants, is_setup, Command, KitData, MesonTool};
use mesonlens_introspect::{self as introspect, BuildOption, Target, TargetKind};
use mesonlens_process::{
    run, CancelHandle, CaptureMode, Diagnostic, ExitReason, OutputClassifier, ProcessEvent,
    Severity,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// What kind of external run is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Setup,
    Configure,
    Introspect,
}

/// Orchestration states. Terminal outcomes are reported through
/// [`Notification::Completed`] and immediately return to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    Idle,
    Running(RunKind),
    Parsing,
}

/// Everything the embedding layer can observe about a run.
#[derive(Debug, Clone)]
pub enum Notification {
    StateChanged(ParserState),
    Diagnostic(Diagnostic),
    Completed(bool),
}

/// Outcome of one orchestrator request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Another request holds the single-flight guard; nothing happened.
    Busy,
    /// The pipeline ran to completion with this success flag.
    Finished(bool),
}

impl RequestOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Finished(true))
    }
}

/// A runnable application target, derived from executables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppTarget {
    pub display_name: String,
    /// Stable key; the shortened output name, exactly as displayed.
    pub build_key: String,
    pub target_file: PathBuf,
    pub working_directory: PathBuf,
}

/// The atomic result of one parse; replaced wholesale on the next one.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub targets: Vec<Target>,
    pub options: Vec<BuildOption>,
    pub root: Option<ProjectNode>,
    pub code_model: Vec<CodeModelPart>,
    pub target_names: Vec<String>,
}

/// Where the introspection data of the current run comes from; fixed when
/// the run starts.
enum IntroSource {
    BuildDir,
    Stdout(Vec<u8>),
}

pub struct ProjectParser {
    tool: MesonTool,
    extra_env: RwLock<Vec<(String, String)>>,
    kit: RwLock<KitData>,
    in_flight: AtomicBool,
    state: RwLock<ParserState>,
    cancel: RwLock<Option<CancelHandle>>,
    result: RwLock<ParseResult>,
    notifications: mpsc::UnboundedSender<Notification>,
}

struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ProjectParser {
    /// Create a parser around a tool snapshot. The receiver yields state
    /// changes, diagnostics and the completion signal of every run.
    pub fn new(tool: MesonTool) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (notifications, receiver) = mpsc::unbounded_channel();
        (
            Self {
                tool,
                extra_env: RwLock::new(Vec::new()),
                kit: RwLock::new(KitData::new()),
                in_flight: AtomicBool::new(false),
                state: RwLock::new(ParserState::Idle),
                cancel: RwLock::new(None),
                result: RwLock::new(ParseResult::default()),
                notifications,
            },
            receiver,
        )
    }

    pub fn set_kit(&self, kit: KitData) {
        *self.kit.write().expect("kit lock poisoned") = kit;
    }

    pub fn set_env(&self, env: Vec<(String, String)>) {
        *self.extra_env.write().expect("env lock poisoned") = env;
    }

    pub fn state(&self) -> ParserState {
        *self.state.read().expect("state lock poisoned")
    }

    /// Request cancellation of the running external process. Background
    /// parsing, once started, runs to completion.
    pub fn cancel(&self) {
        if let Some(cancel) = self.cancel.read().expect("cancel lock poisoned").as_ref() {
            cancel.cancel();
        }
    }

    pub fn targets(&self) -> Vec<Target> {
        self.result().targets
    }

    pub fn build_options(&self) -> Vec<BuildOption> {
        self.result().options
    }

    pub fn project_tree(&self) -> Option<ProjectNode> {
        self.result().root
    }

    pub fn code_model(&self) -> Vec<CodeModelPart> {
        self.result().code_model
    }

    /// Sorted display names, extended with the generator's fixed targets.
    pub fn target_names(&self) -> Vec<String> {
        self.result().target_names
    }

    /// Runnable applications derived from the current executables.
    pub fn app_targets(&self) -> Vec<AppTarget> {
        self.result()
            .targets
            .iter()
            .filter(|target| target.kind == TargetKind::Executable)
            .filter_map(|target| {
                let file = PathBuf::from(target.filename.first()?);
                Some(AppTarget {
                    display_name: target.name.clone(),
                    build_key: target.full_name(),
                    working_directory: file.parent().map(Path::to_path_buf).unwrap_or_default(),
                    target_file: file,
                })
            })
            .collect()
    }

    fn result(&self) -> ParseResult {
        self.result.read().expect("result lock poisoned").clone()
    }

    /// A build directory needs a fresh setup when the marker files are
    /// incomplete, when it was configured by a different tool version, or
    /// when the recorded compilers no longer match the kit.
    pub fn needs_setup(&self, build_dir: &Path) -> bool {
        if !is_setup(build_dir) {
            return true;
        }
        let same_version = introspect::meson_info(build_dir)
            .map(|info| info.meson_version == self.tool.version())
            .unwrap_or(false);
        if !same_version {
            return true;
        }
        let kit = self.kit.read().expect("kit lock poisoned").clone();
        let targets = self.result.read().expect("result lock poisoned").targets.clone();
        !codemodel::matches_kit(&targets, &kit)
    }

    /// Explicit setup request. `--wipe` is appended when the directory
    /// was already set up.
    pub async fn setup(&self, source_dir: &Path, build_dir: &Path, args: &[String]) -> RequestOutcome {
        let Some(guard) = self.try_acquire() else {
            debug!("setup request while busy, ignored");
            return RequestOutcome::Busy;
        };
        let mut args = args.to_vec();
        if is_setup(build_dir) {
            args.push("--wipe".to_owned());
        }
        let command = self.tool.setup(source_dir, build_dir, &args);
        let success = self
            .run_pipeline(RunKind::Setup, command, source_dir, build_dir, &guard)
            .await;
        RequestOutcome::Finished(success)
    }

    /// Explicit configure request; degrades to setup when the directory
    /// is not set up yet.
    pub async fn configure(
        &self,
        source_dir: &Path,
        build_dir: &Path,
        args: &[String],
    ) -> RequestOutcome {
        let Some(guard) = self.try_acquire() else {
            debug!("configure request while busy, ignored");
            return RequestOutcome::Busy;
        };
        let command = self.tool.configure(source_dir, build_dir, args);
        let success = self
            .run_pipeline(RunKind::Configure, command, source_dir, build_dir, &guard)
            .await;
        RequestOutcome::Finished(success)
    }

    /// Parse request. A set-up, version- and kit-matching build directory
    /// is introspected in place; anything else routes through setup
    /// first.
    pub async fn parse(&self, source_dir: &Path, build_dir: &Path) -> RequestOutcome {
        let Some(guard) = self.try_acquire() else {
            debug!("parse request while busy, ignored");
            return RequestOutcome::Busy;
        };
        let (kind, command) = if self.needs_setup(build_dir) {
            (RunKind::Setup, self.tool.setup(source_dir, build_dir, &[]))
        } else {
            (RunKind::Introspect, self.tool.introspect(source_dir))
        };
        let success = self
            .run_pipeline(kind, command, source_dir, build_dir, &guard)
            .await;
        RequestOutcome::Finished(success)
    }

    fn try_acquire(&self) -> Option<FlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            .then(|| FlightGuard(&self.in_flight))
    }

    fn set_state(&self, state: ParserState) {
        *self.state.write().expect("state lock poisoned") = state;
        let _ = self.notifications.send(Notification::StateChanged(state));
    }

    fn notify_diagnostic(&self, diagnostic: Diagnostic) {
        let _ = self.notifications.send(Notification::Diagnostic(diagnostic));
    }

    fn complete(&self, success: bool) -> bool {
        let _ = self.notifications.send(Notification::Completed(success));
        self.set_state(ParserState::Idle);
        success
    }

    /// Run the external tool, classify its output, then hand the fixed
    /// introspection source to the background parse. The guard is held by
    /// the caller for the whole pipeline.
    async fn run_pipeline(
        &self,
        kind: RunKind,
        command: Command,
        source_dir: &Path,
        build_dir: &Path,
        _guard: &FlightGuard<'_>,
    ) -> bool {
        self.set_state(ParserState::Running(kind));
        let capture = match kind {
            RunKind::Introspect => CaptureMode::CaptureStdout,
            RunKind::Setup | RunKind::Configure => CaptureMode::Stream,
        };
        let extra_env = self.extra_env.read().expect("env lock poisoned").clone();
        let mut handle = match run(&command, &extra_env, capture) {
            Ok(handle) => handle,
            Err(err) => {
                self.notify_diagnostic(Diagnostic {
                    severity: Severity::Error,
                    message: err.to_string(),
                    location: None,
                });
                return self.complete(false);
            }
        };
        *self.cancel.write().expect("cancel lock poisoned") = Some(handle.cancel.clone());

        let mut classifier = OutputClassifier::new();
        let mut outcome = None;
        while let Some(event) = handle.events.recv().await {
            match event {
                ProcessEvent::Started => {}
                ProcessEvent::StdoutLine(line) => {
                    if let Some(diagnostic) = classifier.push_line(&line) {
                        self.notify_diagnostic(diagnostic);
                    }
                }
                ProcessEvent::StderrLine(line) => debug!("tool stderr: {line}"),
                ProcessEvent::Finished {
                    code,
                    reason,
                    stdout,
                    stderr,
                } => outcome = Some((code, reason, stdout, stderr)),
            }
        }
        *self.cancel.write().expect("cancel lock poisoned") = None;

        let Some((code, reason, stdout, stderr)) = outcome else {
            warn!("process event stream ended without a finish event");
            return self.complete(false);
        };
        if code != 0 || reason != ExitReason::Exited {
            // In capture mode nothing was streamed; flush what the tool
            // said before reporting failure.
            if capture == CaptureMode::CaptureStdout {
                for diagnostic in classifier.push_chunk(&String::from_utf8_lossy(&stderr)) {
                    self.notify_diagnostic(diagnostic);
                }
            }
            debug!("{:?} run failed with code {code}", kind);
            return self.complete(false);
        }

        self.set_state(ParserState::Parsing);
        let source = match capture {
            CaptureMode::CaptureStdout => IntroSource::Stdout(stdout),
            CaptureMode::Stream => IntroSource::BuildDir,
        };
        let src = source_dir.to_path_buf();
        let build = build_dir.to_path_buf();
        let parsed = tokio::task::spawn_blocking(move || extract_results(&src, &build, source)).await;
        match parsed {
            Ok(result) => {
                *self.result.write().expect("result lock poisoned") = result;
                self.complete(true)
            }
            Err(err) => {
                warn!("background parse task failed: {err}");
                self.complete(false)
            }
        }
    }
}

/// Background half of the pipeline: JSON to domain entities, project
/// tree, code model and the display-name list.
fn extract_results(source_dir: &Path, build_dir: &Path, source: IntroSource) -> ParseResult {
    let intro = match source {
        IntroSource::BuildDir => introspect::parse_build_dir(build_dir),
        IntroSource::Stdout(data) => introspect::parse_stdout(&data),
    };
    let root = build_tree(source_dir, &intro.targets);
    let code_model = codemodel::build_code_model(&intro.targets, build_dir);

    let mut target_names: Vec<String> = intro.targets.iter().map(Target::full_name).collect();
    // not every runnable target shows up in introspection data
    for fixed in [
        constants::targets::ALL,
        constants::targets::CLEAN,
        constants::targets::INSTALL,
        constants::targets::TESTS,
        constants::targets::BENCHMARK,
    ] {
        if !target_names.iter().any(|name| name == fixed) {
            target_names.push(fixed.to_owned());
        }
    }
    target_names.sort();

    ParseResult {
        targets: intro.targets,
        options: intro.options,
        root: Some(root),
        code_model,
        target_names,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_setup_on_missing_build_dir() {
        let (parser, _events) = ProjectParser::new(MesonTool::new("test", "/usr/bin/meson"));
        assert!(parser.needs_setup(Path::new("/definitely/not/there")));
    }

    #[tokio::test]
    async fn test_missing_tool_fails_with_a_diagnostic() {
        let (parser, mut events) = ProjectParser::new(MesonTool::new("test", "/no/such/meson"));
        let dir = tempfile::TempDir::new().unwrap();
        let outcome = parser.parse(dir.path(), &dir.path().join("build")).await;
        assert_eq!(outcome, RequestOutcome::Finished(false));
        assert_eq!(parser.state(), ParserState::Idle);

        let mut saw_error = false;
        let mut saw_completed = false;
        while let Ok(event) = events.try_recv() {
            match event {
                Notification::Diagnostic(diag) => {
                    assert_eq!(diag.severity, Severity::Error);
                    assert!(diag.message.contains("/no/such/meson"));
                    saw_error = true;
                }
                Notification::Completed(success) => {
                    assert!(!success);
                    saw_completed = true;
                }
                Notification::StateChanged(_) => {}
            }
        }
        assert!(saw_error && saw_completed);
    }

    #[test]
    fn test_extract_results_adds_fixed_generator_targets() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = extract_results(dir.path(), &dir.path().join("build"), IntroSource::BuildDir);
        assert!(result.targets.is_empty());
        assert_eq!(
            result.target_names,
            vec!["all", "benchmark", "clean", "install", "test"]
        );
    }
}
