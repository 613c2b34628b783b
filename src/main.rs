//! ImageSift - wave-scheduled signal extraction for images
//!
//! A CLI tool that runs cheap local analyzers over a still or animated
//! image and escalates to an Ollama vision model only when needed.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad input, config, unknown pipeline, etc.)
//!   2 - Run was cancelled or timed out and --fail-on-partial was set

use anyhow::{Context, Result};
use imagesift::analyzers::builtin_registry;
use imagesift::cli::{Args, OutputFormat};
use imagesift::config::{Config, CONFIG_FILE};
use imagesift::pipeline::{Coordinator, PipelineEvent};
use imagesift::signal::SignalFilter;
use imagesift::{input, report};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config is read before logging starts so `general.verbose` can set the level
    let (loaded, origin) = load_config(&args);
    let config = loaded.map(|mut config| {
        config.merge_with_args(&args);
        config
    });
    let level = match &config {
        Ok(config) => config.log_level(args.quiet),
        Err(_) => {
            let mut fallback = Config::default();
            fallback.merge_with_args(&args);
            fallback.log_level(args.quiet)
        }
    };
    init_logging(level);

    info!("ImageSift v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    origin.log();

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .imagesift.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize the vision model, frame budgets, and pipelines.");
    Ok(())
}

/// Initialize logging at the given level.
///
/// Logs go to stderr so reports on stdout stay machine-readable.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run one analysis. Returns the exit code (0 or 2).
async fn run(args: Args, config: Result<Config>) -> Result<i32> {
    let config = config?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    let registry = builtin_registry(config.analyzer_services()?)?;
    let issues = registry.validate();
    if !issues.is_empty() {
        warn!("{} wave dependency issue(s) found", issues.len());
    }
    let catalog = config.pipeline_catalog()?;
    catalog.validate(&registry);

    let coordinator = Coordinator::new(
        Arc::new(registry),
        Arc::new(catalog),
        config.coordinator_options(),
    );

    if args.is_listing() {
        print_listings(&args, &coordinator);
        return Ok(0);
    }

    let filter = match &args.signals {
        Some(expr) => SignalFilter::parse(expr, coordinator.list_collections())?,
        None => SignalFilter::all(),
    };

    let input_path = args.input.as_ref().context("No input file given")?;
    let input = input::load(input_path)?;
    let (width, height) = input.dimensions();
    info!(
        "Loaded {} ({}x{}, {} frame(s))",
        input_path.display(),
        width,
        height,
        input.frame_count()
    );

    let pipeline = config.general.default_pipeline.clone();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; finishing with partial results");
                cancel.cancel();
            }
        });
    }

    let progress = if args.quiet {
        None
    } else {
        Some(spawn_progress(coordinator.subscribe()))
    };

    let result = coordinator.run_pipeline(&input, &pipeline, cancel).await;

    if let Some((bar, handle)) = progress {
        handle.abort();
        bar.finish_and_clear();
    }
    let profile = result?;

    let rendered = match args.format {
        OutputFormat::Json => report::generate_json_report(&profile, &filter)?,
        OutputFormat::Text => report::generate_text_report(&profile, &filter),
    };

    match &args.output {
        Some(path) => {
            report::write_report(&rendered, path)?;
            if !args.quiet {
                eprintln!("✅ Report saved to: {}", path.display());
            }
        }
        None => println!("{}", rendered),
    }

    if profile.partial {
        warn!("Run did not finish; report contains partial results");
        if args.fail_on_partial {
            eprintln!("⛔ Run was cancelled or timed out. Failing (exit code 2).");
            return Ok(2);
        }
    }

    Ok(0)
}

/// Drive a spinner from coordinator status events.
fn spawn_progress(
    mut events: broadcast::Receiver<PipelineEvent>,
) -> (ProgressBar, JoinHandle<()>) {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} [{elapsed}] {msg}") {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(100));

    let task_bar = bar.clone();
    let handle = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(PipelineEvent::RunStarted { pipeline, waves, .. }) => {
                    task_bar.set_message(format!("Pipeline {} ({} waves)", pipeline, waves));
                }
                Ok(PipelineEvent::WaveStarted { wave }) => {
                    task_bar.set_message(format!("Running {}...", wave));
                }
                Ok(PipelineEvent::WaveFailed { wave, error }) => {
                    task_bar.println(format!("   ⚠️  {} failed: {}", wave, error));
                }
                Ok(PipelineEvent::EscalationDecided { escalate: true, reason }) => {
                    task_bar.set_message(format!("Escalating to vision model ({})", reason));
                }
                Ok(PipelineEvent::RunFinished { .. }) => break,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    (bar, handle)
}

fn print_listings(args: &Args, coordinator: &Coordinator) {
    if args.list_waves {
        println!("Waves (run in ascending priority):\n");
        for manifest in coordinator.list_waves() {
            let available = coordinator.registry().analyzer(&manifest.name).is_some();
            println!(
                "  {:<12} {:>4}  [{}]{}",
                manifest.name,
                manifest.priority,
                manifest.tags.iter().cloned().collect::<Vec<_>>().join(", "),
                if available { "" } else { "  (not available)" }
            );
            if !manifest.description.is_empty() {
                println!("      {}", manifest.description);
            }
            if !manifest.requires.is_empty() {
                println!(
                    "      requires: {}",
                    manifest.requires.iter().cloned().collect::<Vec<_>>().join(", ")
                );
            }
        }
        println!();
    }

    if args.list_collections {
        println!("Signal collections (use as --signals @name):\n");
        for (name, patterns) in coordinator.list_collections() {
            println!(
                "  @{:<10} {}",
                name,
                patterns.iter().cloned().collect::<Vec<_>>().join(", ")
            );
        }
        println!();
    }

    if args.list_pipelines {
        println!("Pipelines:\n");
        for profile in coordinator.catalog().profiles() {
            let mut selection = profile.include.join(", ");
            if !profile.exclude.is_empty() {
                selection.push_str(&format!(" minus {}", profile.exclude.join(", ")));
            }
            println!(
                "  {:<12} escalation={:<11} {}",
                profile.name,
                format!("{:?}", profile.escalation).to_lowercase(),
                selection
            );
            if !profile.description.is_empty() {
                println!("      {}", profile.description);
            }
        }
        println!();
    }
}

/// Where the configuration came from, reported once logging is up.
enum ConfigOrigin {
    Explicit(std::path::PathBuf),
    DefaultFile,
    Builtin,
    Unreadable(anyhow::Error),
}

impl ConfigOrigin {
    fn log(&self) {
        match self {
            ConfigOrigin::Explicit(path) => info!("Loaded config from: {}", path.display()),
            ConfigOrigin::DefaultFile => info!("Loaded default config from {}", CONFIG_FILE),
            ConfigOrigin::Builtin => debug!("No config file found, using defaults"),
            ConfigOrigin::Unreadable(e) => warn!("Failed to load config: {:#}", e),
        }
    }
}

/// Load configuration from file or use defaults.
///
/// An explicit `--config` that fails to load is an error; a broken default
/// file falls back to built-in settings.
fn load_config(args: &Args) -> (Result<Config>, ConfigOrigin) {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return (
            Config::load(config_path),
            ConfigOrigin::Explicit(config_path.clone()),
        );
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => (Ok(config), ConfigOrigin::DefaultFile),
        Ok(None) => (Ok(Config::default()), ConfigOrigin::Builtin),
        Err(e) => (Ok(Config::default()), ConfigOrigin::Unreadable(e)),
    }
}
