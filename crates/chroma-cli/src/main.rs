use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chroma_core::{
    EngineConfig, EpochInput, EpochReport, Timeline, cluster_artifact, novelty_artifact,
    parse_epochs, projection_artifact, to_json,
};
use chroma_store::{Store, load_config, write_artifacts};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "chroma",
    about = "Color history engine: novelty, clustering and color-wheel layout"
)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Quantization depth in bits per channel, (0, 8]
    #[arg(long, global = true)]
    depth: Option<f64>,

    /// Cap on distinct colors retained (0 = unbounded)
    #[arg(long, global = true)]
    max_colors: Option<usize>,

    /// Sort input records by epoch instead of rejecting out-of-order input
    #[arg(long, global = true)]
    sort_epochs: bool,

    /// Timeline database (falls back to $CHROMA_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write all three artifacts
    Run {
        /// Input JSON file of epoch records
        input: PathBuf,

        /// Output directory
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Write the per-epoch novel colors
    Novelty {
        input: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the per-epoch multi-resolution clusters
    Cluster {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the color-wheel layout of each epoch's novel colors
    Project {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Append epochs to the stored timeline
    Ingest {
        input: PathBuf,
    },

    /// Write all three artifacts from the stored timeline
    Export {
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Show stored timeline statistics
    Stats {
        #[arg(long, value_enum, default_value_t = StatsFormat::Text)]
        format: StatsFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StatsFormat {
    Text,
    Json,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Run { input, out_dir } => cmd_run(&cli, input, out_dir),
        Commands::Novelty { input, output } => {
            cmd_artifact(&cli, input, output.as_deref(), Artifact::Novelty)
        }
        Commands::Cluster { input, output } => {
            cmd_artifact(&cli, input, output.as_deref(), Artifact::Cluster)
        }
        Commands::Project { input, output } => {
            cmd_artifact(&cli, input, output.as_deref(), Artifact::Projection)
        }
        Commands::Ingest { input } => cmd_ingest(&cli, input),
        Commands::Export { out_dir } => cmd_export(&cli, out_dir),
        Commands::Stats { format } => cmd_stats(&cli, *format),
    }
}

// ---------------------------------------------------------------------------
// Shared plumbing
// ---------------------------------------------------------------------------

fn engine_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            load_config(path).with_context(|| format!("failed to load {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    if let Some(depth) = cli.depth {
        config.quantize.depth = depth;
    }
    if let Some(max) = cli.max_colors {
        config.max_colors = (max > 0).then_some(max);
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn db_path(cli: &Cli) -> Result<PathBuf> {
    match &cli.db {
        Some(path) => Ok(path.clone()),
        None => match std::env::var("CHROMA_DB") {
            Ok(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => bail!("no database given: pass --db or set CHROMA_DB"),
        },
    }
}

fn open_store(cli: &Cli) -> Result<Store> {
    let path = db_path(cli)?;
    Store::open(&path).with_context(|| format!("failed to open store {}", path.display()))
}

fn read_epochs(cli: &Cli, input: &Path) -> Result<Vec<EpochInput>> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let epochs = parse_epochs(&text, cli.sort_epochs)
        .with_context(|| format!("failed to parse {}", input.display()))?;
    tracing::debug!(epochs = epochs.len(), input = %input.display(), "parsed input");
    Ok(epochs)
}

/// Advance through `epochs`, logging progress per epoch.
fn advance(timeline: &mut Timeline, epochs: &[EpochInput]) -> Result<Vec<EpochReport>> {
    let was_capped = timeline.cap_reached();
    let reports = timeline
        .advance_all(epochs)
        .context("epochs must come strictly after the last processed epoch")?;

    for report in &reports {
        log_report(report);
    }
    if !was_capped && timeline.cap_reached() {
        tracing::warn!(
            max_colors = ?timeline.config().max_colors,
            "color cap reached; later novel colors were dropped"
        );
    }
    Ok(reports)
}

fn log_report(report: &EpochReport) {
    tracing::info!(
        epoch = report.epoch(),
        samples = report.samples,
        distinct = report.distinct,
        novel = report.novel.len(),
        dropped = report.novel.dropped,
        "epoch processed"
    );
    if !report.rejected.is_empty() {
        tracing::warn!(
            epoch = report.epoch(),
            rejected = report.rejected.len(),
            "skipped malformed colors"
        );
        for r in &report.rejected {
            tracing::debug!(
                epoch = report.epoch(),
                image = r.image.as_deref().unwrap_or("-"),
                index = r.index,
                "{}",
                r.error
            );
        }
    }
    for d in &report.clusters.diagnostics {
        tracing::debug!(
            epoch = report.epoch(),
            k = d.resolution,
            iterations = d.iterations,
            inertia = d.inertia,
            converged = d.converged,
            warm_started = d.warm_started,
            "clustered"
        );
        if !d.converged {
            tracing::warn!(
                epoch = report.epoch(),
                k = d.resolution,
                "k-means hit the iteration cap"
            );
        }
    }
}

fn build_timeline(cli: &Cli, input: &Path) -> Result<Timeline> {
    let epochs = read_epochs(cli, input)?;
    let mut timeline = Timeline::new(engine_config(cli)?).context("invalid configuration")?;
    advance(&mut timeline, &epochs)?;
    Ok(timeline)
}

fn emit<T: Serialize>(artifact: &T, output: Option<&Path>) -> Result<()> {
    let json = to_json(artifact).context("failed to serialize artifact")?;
    match output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Artifact {
    Novelty,
    Cluster,
    Projection,
}

fn cmd_run(cli: &Cli, input: &Path, out_dir: &Path) -> Result<()> {
    let timeline = build_timeline(cli, input)?;
    let paths = write_artifacts(out_dir, &timeline).context("failed to write artifacts")?;
    for path in &paths {
        println!("wrote {}", path.display());
    }
    println!(
        "done. epochs={}, unique_colors={}, cap_reached={}",
        timeline.records().len(),
        timeline.unique_colors(),
        timeline.cap_reached()
    );
    Ok(())
}

fn cmd_artifact(cli: &Cli, input: &Path, output: Option<&Path>, artifact: Artifact) -> Result<()> {
    let timeline = build_timeline(cli, input)?;
    match artifact {
        Artifact::Novelty => emit(&novelty_artifact(&timeline), output),
        Artifact::Cluster => emit(&cluster_artifact(&timeline), output),
        Artifact::Projection => emit(&projection_artifact(&timeline), output),
    }
}

fn cmd_ingest(cli: &Cli, input: &Path) -> Result<()> {
    let epochs = read_epochs(cli, input)?;
    let store = open_store(cli)?;
    let mut timeline = store
        .load_timeline(engine_config(cli)?)
        .context("failed to load timeline")?;

    let reports = advance(&mut timeline, &epochs)?;
    store.save_timeline(&timeline).context("failed to save timeline")?;

    for report in &reports {
        println!(
            "ingested epoch {} -> {} novel, {} dropped, {} rejected",
            report.epoch(),
            report.novel.len(),
            report.novel.dropped,
            report.rejected.len()
        );
    }
    println!(
        "done. epochs={}, unique_colors={}",
        timeline.records().len(),
        timeline.unique_colors()
    );
    Ok(())
}

fn cmd_export(cli: &Cli, out_dir: &Path) -> Result<()> {
    let store = open_store(cli)?;
    let mut config = engine_config(cli)?;
    // Without an explicit depth, export at whatever depth the timeline was built with.
    if cli.depth.is_none()
        && cli.config.is_none()
        && let Some(depth) = store.stats().context("failed to read store")?.color_depth
    {
        config.quantize.depth = depth;
    }
    let timeline = store.load_timeline(config).context("failed to load timeline")?;
    let paths = write_artifacts(out_dir, &timeline).context("failed to write artifacts")?;
    for path in &paths {
        println!("exported {}", path.display());
    }
    Ok(())
}

fn cmd_stats(cli: &Cli, format: StatsFormat) -> Result<()> {
    let store = open_store(cli)?;
    let stats = store.stats().context("failed to read stats")?;

    match format {
        StatsFormat::Json => {
            let json = serde_json::to_string_pretty(&stats).context("failed to serialize stats")?;
            println!("{json}");
        }
        StatsFormat::Text => {
            let last = stats
                .last_epoch
                .map_or_else(|| "-".to_string(), |e| e.to_string());
            let depth = stats.color_depth.map_or_else(|| "-".to_string(), |d| d.to_string());
            println!("epochs:         {}", stats.epochs);
            println!("last_epoch:     {last}");
            println!("unique_colors:  {}", stats.unique_colors);
            println!("population:     {}", stats.population_total);
            println!("distinct:       {}", stats.population_distinct);
            println!("cap_reached:    {}", stats.cap_reached);
            println!("color_depth:    {depth}");
        }
    }
    Ok(())
}
