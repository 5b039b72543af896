use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "traitforge", version)]
struct Cli {
    /// Rarity table CSV with `type`, `name` and `rarity` columns.
    rarity: PathBuf,

    /// Number of unique items to generate.
    count: usize,

    /// Layer asset root (defaults to `Attr/` next to the rarity table).
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Output directory for images and `traits.json`.
    #[arg(long, default_value = "output")]
    out: PathBuf,

    /// Config JSON overriding categories, z-order and canvas size.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for trait sampling; a random one is chosen and printed when omitted.
    #[arg(long)]
    seed: Option<u64>,

    /// Render items on a thread pool.
    #[arg(long)]
    parallel: bool,

    /// Worker threads for `--parallel` (defaults to the number of CPUs).
    #[arg(long, requires = "parallel")]
    threads: Option<usize>,

    /// Leave items whose layers fail to decode out of the manifest instead of aborting.
    #[arg(long)]
    skip_failed: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let table = traitforge::RarityTable::from_csv_path(&cli.rarity)?;
    let config = match &cli.config {
        Some(path) => traitforge::GenConfig::from_path(path)
            .with_context(|| format!("load config '{}'", path.display()))?,
        None => traitforge::GenConfig::default(),
    };
    let assets_root = cli
        .assets
        .clone()
        .unwrap_or_else(|| default_assets_root(&cli.rarity));

    let opts = traitforge::BatchOpts {
        count: cli.count,
        seed: cli.seed,
        out_dir: cli.out.clone(),
        failure_policy: if cli.skip_failed {
            traitforge::FailurePolicy::Skip
        } else {
            traitforge::FailurePolicy::Abort
        },
        threading: traitforge::RenderThreading {
            parallel: cli.parallel,
            threads: cli.threads,
        },
    };

    let report = match traitforge::run_batch(&table, &config, &assets_root, &opts) {
        Ok(report) => report,
        Err(err) if err.is_configuration() => {
            return Err(anyhow::Error::new(err).context("nothing was written"));
        }
        Err(err) => return Err(err.into()),
    };

    eprintln!(
        "wrote {} of {} item(s) to {} (seed {})",
        report.rendered.len(),
        report.generated.len(),
        cli.out.display(),
        report.seed
    );
    for failure in &report.failures {
        eprintln!("skipped item {}: {}", failure.identifier, failure.error);
    }
    eprintln!("wrote {}", report.manifest_path.display());
    Ok(())
}

fn default_assets_root(rarity: &Path) -> PathBuf {
    rarity
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("Attr")
}
