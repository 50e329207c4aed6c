//! aci-colorize CLI: colorize one ACI frame from its WATSON counterpart.

use aci_colorize::{
    colorize, init_thread_pool, load_image, save_image, ColorizeConfig, HeadlessPresenter,
    Presenter,
};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

/// Result file, written to the working directory.
const OUTPUT_PATH: &str = "colorized_aci.png";

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser, Debug)]
#[command(name = "aci-colorize")]
#[command(about = "Colorize a grayscale ACI frame with the colours of a WATSON image")]
#[command(version)]
struct Cli {
    /// Grayscale ACI image to colorize.
    #[arg(long, default_value = "aci.png")]
    aci: PathBuf,

    /// Colour WATSON image of the same scene.
    #[arg(long, default_value = "watson.png")]
    watson: PathBuf,

    /// Do not open any window.
    #[arg(long)]
    no_display: bool,

    /// Fixed seed for LSH bit selection and RANSAC sampling.
    #[arg(long)]
    seed: Option<u64>,

    /// Worker threads (defaults to one per logical core).
    #[arg(long)]
    threads: Option<usize>,
}

#[cfg(feature = "viewer")]
fn window_presenter() -> Box<dyn Presenter> {
    Box::new(aci_colorize::WindowPresenter)
}

#[cfg(not(feature = "viewer"))]
fn window_presenter() -> Box<dyn Presenter> {
    tracing::warn!("built without the `viewer` feature, images will not be shown");
    Box::new(HeadlessPresenter)
}

fn print_match_count(count: usize) {
    println!("Number of Matches:");
    println!("{count}");
}

fn run(cli: &Cli) -> CliResult<()> {
    init_thread_pool(cli.threads)?;
    tracing::debug!(threads = rayon::current_num_threads(), "thread pool ready");

    let aci = load_image(&cli.aci)?;
    let watson = load_image(&cli.watson)?;

    let mut config = ColorizeConfig::default();
    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }

    let mut presenter: Box<dyn Presenter> = if cli.no_display {
        Box::new(HeadlessPresenter)
    } else {
        window_presenter()
    };

    let outcome = match colorize(&watson, &aci, &config, &mut presenter) {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Some(count) = e.match_count() {
                print_match_count(count);
            }
            return Err(e.into());
        }
    };
    print_match_count(outcome.match_count());

    save_image(OUTPUT_PATH, &outcome)?;
    tracing::info!(
        path = OUTPUT_PATH,
        colorized = outcome.is_colorized(),
        "wrote output"
    );

    presenter.present("Colorized ACI", &outcome.to_rgb())?;
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("aci-colorize: {e}");
            ExitCode::FAILURE
        }
    }
}
