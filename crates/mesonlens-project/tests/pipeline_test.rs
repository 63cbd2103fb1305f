//! End-to-end pipeline tests against a scripted stand-in for the build
//! tool. The script answers `--version`, writes a full set of
//! introspection artifacts on `setup` and dumps the combined JSON
//! document on `introspect`, so the whole state machine can be exercised
//! without a real Meson installation.

#![cfg(unix)]

use mesonlens_core::{is_setup, KitData, MesonTool};
use mesonlens_introspect::TargetKind;
use mesonlens_project::{Notification, ParserState, ProjectParser, RequestOutcome, RunKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

const TARGETS_JSON: &str = r#"[
  {
    "type": "executable",
    "name": "demo",
    "id": "demo@exe",
    "defined_in": "SRC/meson.build",
    "filename": ["SRC/build/demo"],
    "subproject": null,
    "target_sources": [
      {
        "language": "c",
        "compiler": ["/usr/bin/cc"],
        "parameters": ["-Iinclude", "-DDEMO=1", "-O2"],
        "sources": ["SRC/main.c"],
        "generated_sources": []
      }
    ]
  }
]"#;

const OPTIONS_JSON: &str = r#"[
  {"name": "warning_level", "section": "core", "description": "", "type": "combo",
   "value": "3", "choices": ["0", "1", "2", "3"]}
]"#;

/// Write a fake `meson` executable into `dir` and return a descriptor
/// for it. `setup_delay` lets tests keep the run in flight.
fn fake_meson(dir: &Path, source_dir: &Path, setup_delay: &str) -> MesonTool {
    let targets = TARGETS_JSON.replace("SRC", &source_dir.display().to_string());
    let options = OPTIONS_JSON;
    let script = format!(
        r#"#!/bin/sh
case "$1" in
--version)
    echo 1.3.0
    ;;
setup)
    {setup_delay}
    for arg; do build="$arg"; done
    mkdir -p "$build/meson-info"
    cat > "$build/meson-info/intro-targets.json" <<'EOF'
{targets}
EOF
    cat > "$build/meson-info/intro-buildoptions.json" <<'EOF'
{options}
EOF
    echo '{{"meson_version": {{"major": 1, "minor": 3, "patch": 0}}}}' > "$build/meson-info/meson-info.json"
    for f in intro-tests intro-installed intro-benchmarks intro-projectinfo intro-dependencies intro-buildsystem_files; do
        echo '[]' > "$build/meson-info/$f.json"
    done
    echo "The Meson build system"
    ;;
introspect)
    printf '{{"targets": %s, "buildoptions": %s}}' "$(cat <<'EOF'
{targets}
EOF
)" "$(cat <<'EOF'
{options}
EOF
)"
    ;;
*)
    echo "unexpected invocation: $@" >&2
    exit 2
    ;;
esac
"#
    );
    let path = dir.join("meson");
    std::fs::write(&path, script).unwrap();
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    MesonTool::new("fake", path)
}

fn drain(events: &mut mpsc::UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

fn state_sequence(events: &[Notification]) -> Vec<ParserState> {
    events
        .iter()
        .filter_map(|event| match event {
            Notification::StateChanged(state) => Some(*state),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_parse_of_empty_build_dir_routes_through_setup() {
    let dir = TempDir::new().unwrap();
    let source_dir = dir.path().join("src");
    let build_dir = source_dir.join("build");
    std::fs::create_dir_all(&source_dir).unwrap();

    let tool = fake_meson(dir.path(), &source_dir, "");
    let (parser, mut events) = ProjectParser::new(tool);

    let outcome = parser.parse(&source_dir, &build_dir).await;
    assert_eq!(outcome, RequestOutcome::Finished(true));
    assert!(is_setup(&build_dir));

    let events = drain(&mut events);
    assert_eq!(
        state_sequence(&events),
        vec![
            ParserState::Running(RunKind::Setup),
            ParserState::Parsing,
            ParserState::Idle,
        ]
    );
    assert!(events
        .iter()
        .any(|e| matches!(e, Notification::Completed(true))));

    let targets = parser.targets();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].kind, TargetKind::Executable);
    assert_eq!(targets[0].name, "demo");

    // build/demo relative to src/meson.build's directory
    let apps = parser.app_targets();
    assert_eq!(apps.len(), 1);
    assert_eq!(apps[0].build_key, "build/demo");

    let names = parser.target_names();
    assert!(names.contains(&"all".to_owned()));
    assert!(names.contains(&"build/demo".to_owned()));
    assert!(names.windows(2).all(|pair| pair[0] <= pair[1]));

    let tree = parser.project_tree().unwrap();
    assert_eq!(tree.children.len(), 1);
    assert_eq!(tree.children[0].children.len(), 1);
}

#[tokio::test]
async fn test_parse_of_set_up_dir_introspects_in_place() {
    let dir = TempDir::new().unwrap();
    let source_dir = dir.path().join("src");
    let build_dir = source_dir.join("build");
    std::fs::create_dir_all(&source_dir).unwrap();

    let tool = fake_meson(dir.path(), &source_dir, "");
    let (parser, mut events) = ProjectParser::new(tool);

    assert!(parser.setup(&source_dir, &build_dir, &[]).await.succeeded());
    drain(&mut events);

    // recorded version matches, kit is unconstrained: no new setup
    assert!(!parser.needs_setup(&build_dir));
    let outcome = parser.parse(&source_dir, &build_dir).await;
    assert_eq!(outcome, RequestOutcome::Finished(true));

    let events = drain(&mut events);
    assert_eq!(
        state_sequence(&events),
        vec![
            ParserState::Running(RunKind::Introspect),
            ParserState::Parsing,
            ParserState::Idle,
        ]
    );
    assert_eq!(parser.targets().len(), 1);
    assert_eq!(parser.build_options().len(), 1);
}

#[tokio::test]
async fn test_kit_mismatch_forces_setup() {
    let dir = TempDir::new().unwrap();
    let source_dir = dir.path().join("src");
    let build_dir = source_dir.join("build");
    std::fs::create_dir_all(&source_dir).unwrap();

    let tool = fake_meson(dir.path(), &source_dir, "");
    let (parser, _events) = ProjectParser::new(tool);
    assert!(parser.setup(&source_dir, &build_dir, &[]).await.succeeded());

    assert!(!parser.needs_setup(&build_dir));
    parser.set_kit(KitData::new().with_c_compiler("/opt/cross/bin/cc"));
    assert!(parser.needs_setup(&build_dir));
}

#[tokio::test]
async fn test_second_request_while_in_flight_is_rejected() {
    let dir = TempDir::new().unwrap();
    let source_dir = dir.path().join("src");
    let build_dir = source_dir.join("build");
    std::fs::create_dir_all(&source_dir).unwrap();

    let tool = fake_meson(dir.path(), &source_dir, "sleep 2");
    let (parser, _events) = ProjectParser::new(tool);
    let parser = Arc::new(parser);

    let background = {
        let parser = Arc::clone(&parser);
        let source_dir = source_dir.clone();
        let build_dir = build_dir.clone();
        tokio::spawn(async move { parser.parse(&source_dir, &build_dir).await })
    };

    // let the first request take the guard and spawn the tool
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(parser.state(), ParserState::Running(RunKind::Setup));
    assert_eq!(
        parser.parse(&source_dir, &build_dir).await,
        RequestOutcome::Busy
    );
    assert_eq!(
        parser.setup(&source_dir, &build_dir, &[]).await,
        RequestOutcome::Busy
    );

    let outcome = background.await.unwrap();
    assert_eq!(outcome, RequestOutcome::Finished(true));
    assert_eq!(parser.state(), ParserState::Idle);
}

#[tokio::test]
async fn test_failing_setup_completes_unsuccessfully() {
    let dir = TempDir::new().unwrap();
    let source_dir = dir.path().join("src");
    let build_dir = source_dir.join("build");
    std::fs::create_dir_all(&source_dir).unwrap();

    let script = dir.path().join("meson");
    std::fs::write(
        &script,
        "#!/bin/sh\nif [ \"$1\" = --version ]; then echo 1.3.0; exit 0; fi\n\
         echo 'WARNING: Broken python installation'\nexit 1\n",
    )
    .unwrap();
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(&script).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&script, perms).unwrap();

    let (parser, mut events) = ProjectParser::new(MesonTool::new("broken", script));
    let outcome = parser.setup(&source_dir, &build_dir, &[]).await;
    assert_eq!(outcome, RequestOutcome::Finished(false));

    let events = drain(&mut events);
    assert!(events
        .iter()
        .any(|e| matches!(e, Notification::Completed(false))));
    assert!(events.iter().any(|e| matches!(
        e,
        Notification::Diagnostic(diag) if diag.message.contains("Broken python")
    )));
    assert_eq!(parser.state(), ParserState::Idle);
}

#[tokio::test]
async fn test_wipe_is_appended_on_repeated_setup() {
    // the fake tool records its argument list so the test can inspect it
    let dir = TempDir::new().unwrap();
    let source_dir = dir.path().join("src");
    let build_dir = source_dir.join("build");
    std::fs::create_dir_all(&source_dir).unwrap();

    let args_log = dir.path().join("args.log");
    let tool = fake_meson(dir.path(), &source_dir, "");
    let script = PathBuf::from(tool.exe());
    let original = std::fs::read_to_string(&script).unwrap();
    std::fs::write(
        &script,
        format!("#!/bin/sh\necho \"$@\" >> {}\n{}", args_log.display(), original.trim_start_matches("#!/bin/sh\n")),
    )
    .unwrap();

    let (parser, _events) = ProjectParser::new(tool);
    assert!(parser.setup(&source_dir, &build_dir, &[]).await.succeeded());
    assert!(parser.setup(&source_dir, &build_dir, &[]).await.succeeded());

    let log = std::fs::read_to_string(&args_log).unwrap();
    let setups: Vec<&str> = log.lines().filter(|line| line.starts_with("setup")).collect();
    assert_eq!(setups.len(), 2);
    assert!(!setups[0].contains("--wipe"));
    assert!(setups[1].contains("--wipe"));
}
