use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use paperscan::runner::{self, RunOptions};
use paperscan::{DetectionConfig, DetectionError, OverlayStyle};

#[derive(Parser)]
#[command(name = "paperscan")]
#[command(about = "Outline a sheet of paper in a photograph and mark the objects lying on it")]
struct Cli {
    /// Path to input image file
    #[arg(value_name = "IMAGE")]
    image_path: Option<PathBuf>,

    /// Destination for the outlined image (defaults to <stem>_outlined.png)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Write intermediate masks next to the output
    #[arg(long)]
    debug: bool,

    /// Minimum contour area, relative to the image, to consider as paper
    #[arg(long, value_name = "RATIO")]
    min_area_ratio: Option<f64>,

    /// Maximum edge length used during processing
    #[arg(long, value_name = "PIXELS")]
    max_dimension: Option<u32>,

    /// JSON file with detection parameters
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// TrueType font for labels (a system font is tried otherwise)
    #[arg(long, value_name = "FILE")]
    font: Option<PathBuf>,

    /// Open the result with the default viewer
    #[arg(long)]
    open: bool,

    /// Do not stamp the current time on the output
    #[arg(long)]
    no_timestamp: bool,

    /// Process every PNG/JPEG in a directory
    #[arg(long, value_name = "DIR", conflicts_with = "image_path")]
    batch: Option<PathBuf>,

    /// Output directory for batch mode (defaults to DIR/outlined)
    #[arg(long, value_name = "DIR", requires = "batch")]
    batch_output: Option<PathBuf>,

    /// Choose the input image with a file dialog
    #[arg(long)]
    pick: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Cli) -> paperscan::Result<DetectionConfig> {
    let mut config = match &args.config {
        Some(path) => DetectionConfig::from_json_file(path)?,
        None => DetectionConfig::default(),
    };
    if let Some(ratio) = args.min_area_ratio {
        config.min_area_ratio = ratio;
    }
    if let Some(max_dimension) = args.max_dimension {
        config.max_dimension = max_dimension;
    }
    config.validate()?;
    Ok(config)
}

fn load_style(args: &Cli) -> paperscan::Result<OverlayStyle> {
    match &args.font {
        Some(path) => OverlayStyle::with_font_path(path),
        None => Ok(OverlayStyle::with_system_font()),
    }
}

#[cfg(feature = "picker")]
fn resolve_input(args: &Cli) -> anyhow::Result<PathBuf> {
    if let Some(path) = args.image_path.as_ref().filter(|p| p.exists()) {
        return Ok(path.clone());
    }
    if args.pick {
        let start = runner::picker_start_dir(args.image_path.as_deref());
        return runner::pick_input_file(&start).ok_or_else(|| anyhow::anyhow!("No file selected"));
    }
    existing_input(args)
}

#[cfg(not(feature = "picker"))]
fn resolve_input(args: &Cli) -> anyhow::Result<PathBuf> {
    if args.pick {
        anyhow::bail!("--pick needs paperscan built with the `picker` feature");
    }
    existing_input(args)
}

fn existing_input(args: &Cli) -> anyhow::Result<PathBuf> {
    match &args.image_path {
        Some(path) if path.exists() => Ok(path.clone()),
        Some(path) => anyhow::bail!("Input image not found: {}", path.display()),
        None => anyhow::bail!("Input image not provided (pass IMAGE, --batch or --pick)"),
    }
}

fn print_objects(report: &runner::ImageReport) {
    if report.objects.is_empty() {
        println!("No additional non-paper objects were detected.");
        return;
    }
    println!("Detected additional objects:");
    for (i, bbox) in report.objects.iter().enumerate() {
        println!(
            "  Object {}: {}x{}px at ({}, {})",
            i + 1,
            bbox.width,
            bbox.height,
            bbox.x,
            bbox.y
        );
    }
}

fn exit_code_for(error: &anyhow::Error) -> ExitCode {
    match error.downcast_ref::<DetectionError>() {
        Some(e) => ExitCode::from(e.exit_code()),
        None => ExitCode::FAILURE,
    }
}

fn run(args: Cli) -> anyhow::Result<()> {
    let config = load_config(&args)?;
    if args.print_config {
        println!("{}", config.to_json_pretty());
        return Ok(());
    }

    let options = RunOptions {
        config,
        style: load_style(&args)?,
        debug: args.debug,
        timestamp: !args.no_timestamp,
        open: args.open || args.pick,
    };

    if let Some(input_dir) = &args.batch {
        let output_dir = args.batch_output.clone().unwrap_or_else(|| input_dir.join("outlined"));
        let summary = runner::run_batch(input_dir, &output_dir, &options)?;
        if !summary.failures.is_empty() {
            anyhow::bail!(
                "Completed with {} failure(s) out of {} file(s)",
                summary.failures.len(),
                summary.failures.len() + summary.processed
            );
        }
        println!(
            "Processed {} file(s). Results saved to {}.",
            summary.processed,
            output_dir.display()
        );
        return Ok(());
    }

    let input = resolve_input(&args)?;
    let report = runner::process_image(&input, args.output.as_deref(), &options)?;
    print_objects(&report);
    println!("Outlined image written to {}", report.output.display());
    if let Some(dir) = &report.debug_dir {
        println!("Debug masks saved to {}", dir.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Cli::parse();
    init_tracing(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:#}");
            exit_code_for(&e)
        }
    }
}
