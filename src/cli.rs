use crate::history::HistoryCache;
use crate::model::{GenerateEvent, QrSettings, Rgb, DEFAULT_SIZE, MAX_SIZE, MIN_SIZE};
use crate::orchestrator::{self, UiCommand};
use crate::render::{Artifact, QrCodeEncoder, QrEncoder};
use crate::storage::{self, BoxedStore, FileStore, MemoryStore};
use crate::text_summary::{self, GenerationReport, HistoryListItem};
use crate::trigger::{GenerateError, GenerateRequest};
use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

/// Send `lines` through the output writer and wait until they are flushed.
async fn emit(lines: Vec<OutputLine>) {
    let (out_tx, out_handle) = spawn_output_writer();
    for line in lines {
        let _ = out_tx.send(line);
    }
    drop(out_tx);
    let _ = out_handle.await;
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "qrgen",
    version,
    about = "QR code generator with a recent-history gallery and optional TUI"
)]
pub struct Cli {
    /// Text or URL to encode; generates once and exits (no TUI)
    pub text: Option<String>,

    /// Image width and height in pixels
    #[arg(long, default_value_t = DEFAULT_SIZE, value_parser = parse_size)]
    pub size: u32,

    /// Foreground (dark module) colour, #rrggbb
    #[arg(long, default_value = "#000000")]
    pub fg: Rgb,

    /// Background (light module) colour, #rrggbb
    #[arg(long, default_value = "#ffffff")]
    pub bg: Rgb,

    /// Write the PNG to this path instead of a timestamped file
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Directory for timestamped downloads (defaults to the current directory)
    #[arg(long)]
    pub download_dir: Option<PathBuf>,

    /// Print JSON instead of text (with TEXT or --list-history)
    #[arg(long)]
    pub json: bool,

    /// Print the saved history and exit
    #[arg(long)]
    pub list_history: bool,

    /// Remove all saved history and exit (asks for confirmation)
    #[arg(long)]
    pub clear_history: bool,

    /// Skip the confirmation prompt of --clear-history
    #[arg(long)]
    pub yes: bool,

    /// Keep history in memory only for this session
    #[arg(long)]
    pub no_history: bool,

    /// History file location
    #[arg(long)]
    pub history_file: Option<PathBuf>,

    /// Quiescence window before an edit triggers generation in the TUI
    #[arg(long, default_value = "800ms")]
    pub debounce: humantime::Duration,

    /// Log file used while the TUI owns the terminal
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Whether this invocation hands the terminal to the TUI.
    pub fn launches_tui(&self) -> bool {
        cfg!(feature = "tui") && self.text.is_none() && !self.list_history && !self.clear_history
    }
}

fn parse_size(s: &str) -> Result<u32, String> {
    let size: u32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a whole number of pixels"))?;
    if !(MIN_SIZE..=MAX_SIZE).contains(&size) {
        return Err(format!("size must be between {MIN_SIZE} and {MAX_SIZE}"));
    }
    Ok(size)
}

pub async fn run(args: Cli) -> Result<()> {
    if args.json && args.text.is_none() && !args.list_history {
        return Err(anyhow::anyhow!(
            "--json needs TEXT or --list-history to have something to print."
        ));
    }
    if args.yes && !args.clear_history {
        return Err(anyhow::anyhow!("--yes can only be used with --clear-history."));
    }

    if args.clear_history {
        return run_clear(&args).await;
    }
    if args.list_history {
        return run_list(&args).await;
    }
    if let Some(text) = args.text.clone() {
        return run_generate(&args, &text).await;
    }

    #[cfg(feature = "tui")]
    let res = crate::tui::run(args).await;
    // Fallback when built without TUI support.
    #[cfg(not(feature = "tui"))]
    let res = Err(anyhow::anyhow!(
        "no TEXT given and this build has no TUI; pass the text to encode"
    ));
    res
}

/// Build the appearance settings from CLI arguments.
pub fn build_settings(args: &Cli) -> QrSettings {
    QrSettings {
        size: args.size,
        foreground: args.fg,
        background: args.bg,
    }
}

/// Open the history cache selected by the CLI arguments.
pub fn open_history(args: &Cli) -> HistoryCache<BoxedStore> {
    if args.no_history {
        return HistoryCache::load(Box::new(MemoryStore::default()));
    }
    let path = match args.history_file.clone() {
        Some(p) => p,
        None => match storage::default_history_path() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("{e}; history will not be saved");
                return HistoryCache::load(Box::new(MemoryStore::default()));
            }
        },
    };
    let store = FileStore::new(path);
    tracing::debug!(path = %store.path().display(), "using history file");
    HistoryCache::load(Box::new(store))
}

/// Directory for timestamped downloads.
pub fn download_dir(args: &Cli) -> Result<PathBuf> {
    match args.download_dir.clone() {
        Some(dir) => Ok(dir),
        None => std::env::current_dir().context("get current directory"),
    }
}

/// Render one request through the controller, exactly like the TUI does.
async fn render_once(encoder: Arc<dyn QrEncoder>, request: GenerateRequest) -> Result<Artifact> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<GenerateEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();
    let controller = tokio::spawn(orchestrator::run_controller(encoder, event_tx, cmd_rx));

    let _ = cmd_tx.send(UiCommand::Generate(request));
    // Closing the command channel lets the controller exit after this render.
    drop(cmd_tx);

    let mut outcome: Option<Result<Artifact, GenerateError>> = None;
    while let Some(ev) = event_rx.recv().await {
        match ev {
            GenerateEvent::Completed { artifact, .. } => outcome = Some(Ok(*artifact)),
            GenerateEvent::Failed { error, .. } => outcome = Some(Err(error)),
            GenerateEvent::Started { .. } | GenerateEvent::Queued { .. } | GenerateEvent::Info(_) => {}
        }
    }
    controller.await.context("generation task failed")??;

    match outcome {
        Some(Ok(artifact)) => Ok(artifact),
        Some(Err(e)) => Err(e.into()),
        None => Err(GenerateError::MissingArtifact.into()),
    }
}

async fn run_generate(args: &Cli, text: &str) -> Result<()> {
    let request = GenerateRequest::new(text, build_settings(args))?;
    let artifact = render_once(Arc::new(QrCodeEncoder), request.clone()).await?;

    let now = OffsetDateTime::now_utc();
    let saved = match args.output.as_deref() {
        Some(path) => {
            storage::export_png(path, &artifact)?;
            path.to_path_buf()
        }
        None => storage::download_artifact(&download_dir(args)?, Some(&artifact), now)?,
    };

    let mut history = open_history(args);
    orchestrator::process_generation(&mut history, &request, &artifact, now)
        .context("failed to snapshot QR code for history")?;

    let mut out = Vec::new();
    if args.json {
        let report = GenerationReport::new(&request, &artifact, Some(&saved), history.len());
        out.push(OutputLine::Stdout(serde_json::to_string_pretty(&report)?));
    } else {
        let summary =
            text_summary::build_text_summary(&request, &artifact, Some(&saved), history.len());
        out.extend(summary.lines.into_iter().map(OutputLine::Stdout));
    }
    if args.no_history {
        out.push(OutputLine::Stderr("History not saved (--no-history)".into()));
    }
    emit(out).await;
    Ok(())
}

async fn run_list(args: &Cli) -> Result<()> {
    let history = open_history(args);
    let now = OffsetDateTime::now_utc();
    let out = if args.json {
        let items: Vec<HistoryListItem> = history
            .entries()
            .iter()
            .enumerate()
            .map(|(i, e)| HistoryListItem::new(i, e, now))
            .collect();
        vec![OutputLine::Stdout(serde_json::to_string_pretty(&items)?)]
    } else {
        text_summary::build_history_summary(history.entries(), now)
            .lines
            .into_iter()
            .map(OutputLine::Stdout)
            .collect()
    };
    emit(out).await;
    Ok(())
}

async fn run_clear(args: &Cli) -> Result<()> {
    let mut history = open_history(args);
    // The prompt runs before the output writer exists; the writer locks stderr.
    let message = if history.is_empty() {
        "History is already empty."
    } else if !args.yes
        && !confirm(
            &mut std::io::stdin().lock(),
            &mut std::io::stderr(),
            &format!("Clear all {} history item(s)? [y/N] ", history.len()),
        )?
    {
        "Aborted."
    } else {
        history.clear();
        "History cleared."
    };
    emit(vec![OutputLine::Stdout(message.to_string())]).await;
    Ok(())
}

/// Ask a yes/no question; anything but `y`/`yes` counts as no.
fn confirm(input: &mut impl BufRead, prompt_out: &mut impl Write, prompt: &str) -> Result<bool> {
    write!(prompt_out, "{prompt}")?;
    prompt_out.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer).context("read confirmation")?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}
