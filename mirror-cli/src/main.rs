use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mirror::{DepthValue, EventSink, OptionOverrides, SyncEvent};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod output;

use output::ConsoleSink;

/// Conventional exit status after SIGINT
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Parser, Debug)]
#[command(name = "mirror")]
#[command(version)]
#[command(about = "Mirror a file or folder into a target, optionally keeping it in sync")]
struct Cli {
    /// File or folder whose content will be mirrored
    source: PathBuf,

    /// Where the mirror lives
    target: PathBuf,

    /// Watch changes in source and keep target in sync
    #[arg(short, long)]
    watch: bool,

    /// Delete extraneous files from target (default)
    #[arg(long, overrides_with = "no_delete")]
    delete: bool,

    /// Leave extraneous files in target
    #[arg(long = "no-delete", overrides_with = "delete")]
    no_delete: bool,

    /// Maximum depth, a non-negative number or "inf"
    #[arg(short, long, value_name = "DEPTH")]
    depth: Option<String>,

    /// Exclude files or folders from sync, glob patterns allowed
    #[arg(short, long, value_name = "GLOB")]
    exclude: Vec<String>,

    /// Also print low-priority events
    #[arg(short, long)]
    verbose: bool,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,

    /// TOML file with default options; flags take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Cli {
    /// Options given as flags; unset flags stay `None`
    fn flag_overrides(&self) -> OptionOverrides {
        let delete = if self.no_delete {
            Some(false)
        } else if self.delete {
            Some(true)
        } else {
            None
        };

        OptionOverrides {
            watch: self.watch.then_some(true),
            delete,
            depth: self.depth.clone().map(DepthValue::Text),
            exclude: (!self.exclude.is_empty()).then(|| self.exclude.clone()),
        }
    }

    /// Front-end defaults, then the options file, then flags
    fn overrides(&self) -> Result<OptionOverrides> {
        let defaults = OptionOverrides {
            delete: Some(true),
            ..Default::default()
        };

        let file = match &self.config {
            Some(path) => OptionOverrides::load(path)
                .with_context(|| format!("Failed to load options from {}", path.display()))?,
            None => OptionOverrides::default(),
        };

        Ok(defaults.merge(file).merge(self.flag_overrides()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    let sink = Arc::new(ConsoleSink::new(cli.verbose, cli.json));

    let overrides = match cli.overrides() {
        Ok(overrides) => overrides,
        Err(e) => {
            sink.emit(SyncEvent::error(format!("{:#}", e), None));
            return Ok(());
        }
    };

    let source = resolve_source(&cli.source)?;
    let target = std::path::absolute(&cli.target)
        .with_context(|| format!("Failed to resolve target {}", cli.target.display()))?;

    info!("Mirroring {} to {}", source.display(), target.display());

    let mirrored = tokio::select! {
        ok = mirror::sync(&source, &target, overrides, sink.clone()) => ok,
        _ = tokio::signal::ctrl_c() => {
            // runtime shutdown would wait for a walk still on the blocking pool
            info!("Interrupted, stopping");
            std::process::exit(INTERRUPTED_EXIT_CODE)
        }
    };

    if !mirrored {
        std::process::exit(1);
    }

    Ok(())
}

/// Absolute source path, canonical when it exists so that watch
/// notifications share its prefix
fn resolve_source(source: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(source)
        .with_context(|| format!("Failed to resolve source {}", source.display()))?;
    Ok(absolute.canonicalize().unwrap_or(absolute))
}

fn init_logging(log_level: &str) {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!("mirror={},mirror_cli={}", level, level))
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
