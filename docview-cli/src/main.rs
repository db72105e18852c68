use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use docview_core::{
    task_queue, DocumentResolver, ExternalRef, FileNameProvider, QueueHandle, Task, Viewer,
    ViewerConfig, ViewerParts,
};
use docview_render::{bind_pdfium, PdfiumSurface};
use docview_tty::{
    write_help, ConsolePermissions, ConsolePicker, ConsolePresenter, ConsolePrompts,
    InputMapper, UiEvent,
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{prelude::*, EnvFilter};

const CONFIG_FILE: &str = "docview.toml";

#[derive(Debug, Parser)]
#[command(
    name = "docview",
    version,
    about = "Console PDF viewer with full-text search and match navigation"
)]
struct Args {
    /// Path or URL of a PDF to open instead of the bundled document
    document: Option<String>,

    /// Configuration file (defaults to docview.toml in the platform config directory)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Directory holding the bundled documents
    #[arg(long = "assets-dir")]
    assets_dir: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long = "print-config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let project_dirs = ProjectDirs::from("net", "docview", "docview");

    let config_path = args.config.clone().or_else(|| {
        project_dirs
            .as_ref()
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    });
    let mut config = match &config_path {
        Some(path) => ViewerConfig::load_or_default(path)
            .with_context(|| format!("failed to load config {:?}", path))?,
        None => ViewerConfig::default(),
    };
    if let Some(assets_dir) = args.assets_dir {
        config.assets_dir = assets_dir;
    }

    if args.print_config {
        let mut stdout = io::stdout();
        write!(stdout, "{}", config.to_toml_string()?)?;
        stdout.flush()?;
        return Ok(());
    }

    let project_dirs =
        project_dirs.ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let _log_guard = init_logging(&project_dirs, config.log_level.as_deref())?;
    info!(config = ?config_path, "starting docview");

    let initial = args
        .document
        .as_deref()
        .map(|input| {
            ExternalRef::parse(input)
                .ok_or_else(|| anyhow!("not a usable document reference: {input:?}"))
        })
        .transpose()?;

    let pdfium = bind_pdfium()?;
    let (queue, mut tasks) = task_queue();
    let prompts = ConsolePrompts::new();

    let parts = ViewerParts {
        surface: Box::new(PdfiumSurface::new(
            pdfium,
            config.assets_dir.clone(),
            queue.clone(),
        )),
        permissions: Box::new(ConsolePermissions::new(
            config.permissions.read_external_storage,
            prompts.clone(),
            queue.clone(),
            io::stdout(),
        )),
        picker: Box::new(ConsolePicker::new(
            config.picker.enabled,
            prompts.clone(),
            io::stdout(),
        )),
        presenter: Box::new(ConsolePresenter::new(io::stdout())),
    };
    let resolver = DocumentResolver::new(config.bundled_document.clone())
        .with_provider(Arc::new(FileNameProvider));
    let mut viewer = Viewer::new(&config, queue.clone(), parts, resolver);

    write_help(&mut io::stdout())?;
    spawn_input_reader(queue, prompts)?;

    viewer.start(initial);
    viewer.run(&mut tasks).await;
    Ok(())
}

/// Reads stdin on its own thread. Lines answer an outstanding prompt first and are
/// mapped to commands otherwise. End of input shuts the viewer down.
fn spawn_input_reader(queue: QueueHandle, prompts: ConsolePrompts) -> Result<()> {
    thread::Builder::new()
        .name("docview-input".into())
        .spawn(move || {
            let mut mapper = InputMapper::new();
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        warn!(?err, "failed to read from stdin");
                        break;
                    }
                };
                let task = match prompts.take() {
                    Some(prompt) => prompts.answer(prompt, &line),
                    None => match mapper.map_line(&line) {
                        UiEvent::Command(command) => Task::User(command),
                        UiEvent::Invalid(input) => {
                            let mut stdout = io::stdout();
                            let result = writeln!(stdout, "unrecognised input {input:?}")
                                .and_then(|()| write_help(&mut stdout));
                            if let Err(err) = result {
                                warn!(?err, "console write failed");
                            }
                            continue;
                        }
                        UiEvent::None => continue,
                    },
                };
                if !queue.post(task) {
                    return;
                }
            }
            queue.post(Task::Shutdown);
        })
        .context("failed to start input reader")?;
    Ok(())
}

fn init_logging(project_dirs: &ProjectDirs, log_level: Option<&str>) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "docview.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);
    // The console is shared with the viewer's own output.
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_filter(LevelFilter::WARN);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}
