//! MesonLens CLI
//!
//! Thin stand-in for the IDE layer: registers tools, drives the parse
//! pipeline and prints the reconstructed project model.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mesonlens_core::{KitData, MesonTool, NinjaTool};
use mesonlens_process::{
    run, CaptureMode, NinjaProgressParser, OutputClassifier, ProcessEvent, Severity,
};
use mesonlens_project::{
    Notification, NodeKind, ProjectNode, ProjectParser, RequestOutcome, ToolRegistry,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "mesonlens")]
#[command(author, version, about = "Meson project model extraction", long_about = None)]
struct Cli {
    /// Meson executable to use (default: first match on PATH)
    #[arg(long, global = true)]
    meson: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the tools MesonLens would use
    Tools,

    /// Set up a build directory from scratch
    Setup {
        /// Project source directory
        #[arg(value_name = "SOURCE")]
        source_dir: PathBuf,

        /// Build directory
        #[arg(value_name = "BUILD")]
        build_dir: PathBuf,

        /// Extra arguments passed to the tool (e.g. -Dfoo=bar)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Reconfigure an existing build directory
    Configure {
        #[arg(value_name = "SOURCE")]
        source_dir: PathBuf,

        #[arg(value_name = "BUILD")]
        build_dir: PathBuf,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Parse the project and print its model
    Parse {
        #[arg(value_name = "SOURCE")]
        source_dir: PathBuf,

        #[arg(value_name = "BUILD")]
        build_dir: PathBuf,

        /// C compiler expected by the active kit
        #[arg(long)]
        c_compiler: Option<PathBuf>,

        /// C++ compiler expected by the active kit
        #[arg(long)]
        cpp_compiler: Option<PathBuf>,

        /// Also print build options
        #[arg(long)]
        options: bool,
    },

    /// Run the generator on a target, with progress
    Build {
        #[arg(value_name = "BUILD")]
        build_dir: PathBuf,

        /// Generator target (default: all)
        #[arg(default_value = "all")]
        target: String,
    },
}

fn select_tool(override_path: Option<PathBuf>) -> Result<MesonTool> {
    if let Some(path) = override_path {
        let tool = MesonTool::new("meson", path);
        if !tool.is_valid() {
            bail!("{} is not a working Meson executable", tool.exe().display());
        }
        return Ok(tool);
    }
    let registry = ToolRegistry::new();
    registry.ensure_auto_detected();
    registry
        .auto_detected()
        .context("no Meson executable found on PATH; pass --meson")
}

fn print_tree(node: &ProjectNode, depth: usize) {
    let indent = "  ".repeat(depth);
    match &node.kind {
        NodeKind::Project => println!("{indent}{}", node.path.display()),
        NodeKind::Target { display_name } => println!("{indent}{display_name}"),
        NodeKind::Source => println!("{indent}{}", node.path.display()),
    }
    for child in &node.children {
        print_tree(child, depth + 1);
    }
}

fn spawn_notification_printer(
    mut events: tokio::sync::mpsc::UnboundedReceiver<Notification>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                Notification::Diagnostic(diag) => {
                    let tag = match diag.severity {
                        Severity::Error => "error",
                        Severity::Warning => "warning",
                    };
                    eprintln!("[{tag}] {}", diag.message);
                }
                Notification::StateChanged(state) => tracing::debug!("state: {state:?}"),
                Notification::Completed(success) => tracing::debug!("completed: {success}"),
            }
        }
    })
}

async fn cmd_setup(
    tool: MesonTool,
    source_dir: &Path,
    build_dir: &Path,
    args: &[String],
    configure: bool,
) -> Result<()> {
    let (parser, events) = ProjectParser::new(tool);
    let printer = spawn_notification_printer(events);
    let outcome = if configure {
        parser.configure(source_dir, build_dir, args).await
    } else {
        parser.setup(source_dir, build_dir, args).await
    };
    drop(parser);
    let _ = printer.await;
    match outcome {
        RequestOutcome::Finished(true) => Ok(()),
        _ => bail!("configuring {} failed", build_dir.display()),
    }
}

async fn cmd_parse(
    tool: MesonTool,
    source_dir: &Path,
    build_dir: &Path,
    kit: KitData,
    show_options: bool,
) -> Result<()> {
    let (parser, events) = ProjectParser::new(tool);
    parser.set_kit(kit);
    let printer = spawn_notification_printer(events);
    let outcome = parser.parse(source_dir, build_dir).await;
    if !outcome.succeeded() {
        drop(parser);
        let _ = printer.await;
        bail!("parsing {} failed", source_dir.display());
    }

    if let Some(tree) = parser.project_tree() {
        print_tree(&tree, 0);
    }
    println!("\nTargets:");
    for target in parser.targets() {
        println!("  {:<24} {:?}", target.full_name(), target.kind);
    }
    if show_options {
        println!("\nOptions:");
        for option in parser.build_options() {
            let name = match &option.subproject {
                Some(sub) => format!("{sub}:{}", option.name),
                None => option.name.clone(),
            };
            println!("  {:<32} {} = {}", name, option.section, option.value_str());
        }
    }
    drop(parser);
    let _ = printer.await;
    Ok(())
}

async fn cmd_build(build_dir: &Path, target: &str) -> Result<()> {
    let ninja = NinjaTool::find()
        .map(NinjaTool::new)
        .context("no ninja executable found on PATH")?;
    let command = ninja.build(build_dir, target);
    let mut handle = run(&command, &[], CaptureMode::Stream)?;

    let mut classifier = OutputClassifier::new();
    let mut progress = NinjaProgressParser::new();
    let mut exit_code = -1;
    while let Some(event) = handle.events.recv().await {
        match event {
            ProcessEvent::Started => {}
            ProcessEvent::StdoutLine(line) => {
                if let Some(percent) = progress.push_line(&line) {
                    eprintln!("[{percent:>3}%]");
                }
                if let Some(diag) = classifier.push_line(&line) {
                    eprintln!("[{:?}] {}", diag.severity, diag.message);
                } else {
                    println!("{line}");
                }
            }
            ProcessEvent::StderrLine(line) => eprintln!("{line}"),
            ProcessEvent::Finished { code, .. } => exit_code = code,
        }
    }
    if exit_code != 0 {
        bail!("build of target {target} failed with code {exit_code}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Tools => {
            let registry = ToolRegistry::new();
            registry.ensure_auto_detected();
            if registry.tools().is_empty() {
                println!("no tools found");
            }
            for tool in registry.tools() {
                println!(
                    "{:<32} {:<8} {}",
                    tool.name(),
                    tool.version().to_string(),
                    tool.exe().display()
                );
            }
            Ok(())
        }
        Commands::Setup {
            ref source_dir,
            ref build_dir,
            ref args,
        } => cmd_setup(select_tool(cli.meson)?, source_dir, build_dir, args, false).await,
        Commands::Configure {
            ref source_dir,
            ref build_dir,
            ref args,
        } => cmd_setup(select_tool(cli.meson)?, source_dir, build_dir, args, true).await,
        Commands::Parse {
            ref source_dir,
            ref build_dir,
            ref c_compiler,
            ref cpp_compiler,
            options,
        } => {
            let mut kit = KitData::new();
            if let Some(path) = c_compiler {
                kit = kit.with_c_compiler(path);
            }
            if let Some(path) = cpp_compiler {
                kit = kit.with_cpp_compiler(path);
            }
            cmd_parse(select_tool(cli.meson)?, source_dir, build_dir, kit, options).await
        }
        Commands::Build {
            ref build_dir,
            ref target,
        } => cmd_build(build_dir, target).await,
    }
}
