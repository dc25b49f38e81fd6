//! sift-angle: estimate the rotation between images from SIFT matches.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use serde::Serialize;
use sift_cli::{
    annotate_pair, init_threads, load_rgb, BoundingBox, Cancellation, ImageSeries, PairEstimate,
    PipelineError, PipelineSettings, RotationEstimator,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "sift-angle")]
#[command(about = "Estimate in-plane rotation between images from SIFT feature matches")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Worker threads (0 = all logical CPUs).
    #[arg(long, global = true, default_value_t = 0)]
    threads: usize,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Rotation from SOURCE to TARGET.
    Pair(PairArgs),

    /// Chained, position-weighted rotation over consecutive images.
    Sequence(SequenceArgs),

    /// Print the effective settings.
    Config {
        /// Settings file to load instead of the defaults.
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = Format::Toml)]
        format: Format,
    },
}

#[derive(Debug, Clone, Args)]
struct PairArgs {
    source: PathBuf,
    target: PathBuf,

    /// Directory for the annotated copies of both images.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Settings file (TOML, or JSON by extension).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Args)]
struct SequenceArgs {
    #[arg(required = true, num_args = 2..)]
    images: Vec<PathBuf>,

    /// Directory for the contour renderings.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Toml,
    Json,
}

#[derive(Serialize)]
struct PairReport {
    angle: f64,
    correspondences: usize,
    inliers: usize,
    source_box: BoundingBox,
    target_box: BoundingBox,
    homography: [[f64; 3]; 3],
}

impl From<&PairEstimate> for PairReport {
    fn from(e: &PairEstimate) -> Self {
        Self {
            angle: e.angle,
            correspondences: e.correspondences.len(),
            inliers: e.inliers,
            source_box: e.source_box,
            target_box: e.target_box,
            homography: e.homography.rows(),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<PipelineError>() {
                Some(e) if e.is_no_reliable_match() => eprintln!("no reliable match found ({})", e),
                _ => eprintln!("error: {}", err),
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    };
    pretty_env_logger::formatted_timed_builder().filter_level(level).parse_default_env().init();
}

fn run(cli: Cli) -> CliResult<()> {
    init_threads(cli.threads)?;
    match cli.command {
        Commands::Pair(args) => run_pair(&args),
        Commands::Sequence(args) => run_sequence(&args),
        Commands::Config { config, format } => {
            let settings = load_settings(config.as_deref())?;
            let text = match format {
                Format::Toml => settings.to_toml()?,
                Format::Json => settings.to_json()?,
            };
            println!("{}", text);
            Ok(())
        }
    }
}

fn load_settings(path: Option<&Path>) -> CliResult<PipelineSettings> {
    match path {
        Some(p) => {
            log::info!("loading settings from {}", p.display());
            Ok(PipelineSettings::load(p)?)
        }
        None => Ok(PipelineSettings::default()),
    }
}

fn run_pair(args: &PairArgs) -> CliResult<()> {
    let estimator = RotationEstimator::new(load_settings(args.config.as_deref())?)?;
    let source = load_rgb(&args.source)?;
    let target = load_rgb(&args.target)?;

    let t0 = Instant::now();
    let estimate = estimator.estimate_pair(&source, &target)?;
    log::info!("pair estimated in {:.2?}", t0.elapsed());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&PairReport::from(&estimate))?);
    } else {
        println!("Rotation angle: {:.4} degrees", estimate.angle);
        println!(
            "Correspondences: {} ({} inliers)",
            estimate.correspondences.len(),
            estimate.inliers
        );
    }

    if let Some(dir) = &args.out_dir {
        std::fs::create_dir_all(dir)?;
        let (src_img, dst_img) = annotate_pair(&source, &target, &estimate);
        for (img, path) in [(src_img, &args.source), (dst_img, &args.target)] {
            let out = output_path(dir, path, "matched");
            img.save(&out)?;
            log::info!("wrote {}", out.display());
        }
    }
    Ok(())
}

fn run_sequence(args: &SequenceArgs) -> CliResult<()> {
    let estimator = RotationEstimator::new(load_settings(args.config.as_deref())?)?;
    let mut series = ImageSeries::new();
    for path in &args.images {
        series.push_file(path)?;
    }

    let t0 = Instant::now();
    let estimate = estimator.estimate_series(&series, &Cancellation::new())?;
    log::info!("{} images processed in {:.2?}", series.len(), t0.elapsed());

    for (pair, err) in &estimate.failures {
        println!("Skipped pair {} -> {}: {}", pair + 1, pair + 2, err);
    }
    println!("Sum of angles: {}", estimate.derivation);

    if let Some(dir) = &args.out_dir {
        std::fs::create_dir_all(dir)?;
        for (rendering, path) in estimate.renderings.iter().zip(&args.images) {
            let out = output_path(dir, path, "contours");
            rendering.annotated.save(&out)?;
            log::info!("wrote {}", out.display());
        }
    }
    Ok(())
}

/// `<dir>/<stem>_<suffix>.png`
fn output_path(dir: &Path, input: &Path, suffix: &str) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("image");
    dir.join(format!("{}_{}.png", stem, suffix))
}
