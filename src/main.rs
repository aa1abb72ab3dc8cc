mod acquisition;
mod app;
mod config;
mod error;
mod image_loader;
mod models;
mod preview;
mod sources;
mod wheel;

use std::path::PathBuf;

use clap::Parser;

use app::{PhotoWheelApp, RunOptions};
use config::AppConfig;
use wheel::Point;

/// Spin a wheel over a random mix of your photos and Unsplash photos.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory used as the local photo library (defaults to the user's Pictures folder).
    #[arg(short, long)]
    library: Option<PathBuf>,

    /// Only use photos directly inside the library directory.
    #[arg(long)]
    no_recursive: bool,

    /// Config file (defaults to the platform config directory).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Unsplash access key (overrides config and environment).
    #[arg(long)]
    access_key: Option<String>,

    /// Total number of photos to fetch instead of a random count.
    #[arg(long, requires = "local")]
    total: Option<usize>,

    /// How many of the total come from the library.
    #[arg(long, requires = "total")]
    local: Option<usize>,

    /// Seed for reproducible counts, samples and spins.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of spins.
    #[arg(long, default_value_t = 1)]
    spins: usize,

    /// Pick by pointer position "X,Y" relative to the wheel center instead of spinning.
    #[arg(long, value_parser = parse_point, allow_hyphen_values = true, conflicts_with = "spins")]
    drag: Option<Point>,

    /// Write a JPEG preview of the selected photo here.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

fn parse_point(value: &str) -> Result<Point, String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got {:?}", value))?;
    let x = x.trim().parse::<f64>().map_err(|e| e.to_string())?;
    let y = y.trim().parse::<f64>().map_err(|e| e.to_string())?;
    Ok(Point::new(x, y))
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let directive = if args.verbose {
        "photowheel=debug"
    } else {
        "photowheel=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse().unwrap()),
        )
        .init();

    if let Err(e) = run(args).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(library) = args.library {
        config.library_dir = Some(library);
    }
    if args.no_recursive {
        config.library_scan.recursive = false;
    }
    if let Some(key) = args.access_key {
        config.access_key = key;
    }

    let options = RunOptions {
        split: args.total.zip(args.local),
        spins: args.spins,
        drag: args.drag,
        output: args.output,
    };

    let mut app = PhotoWheelApp::new(config, args.seed)?;
    app.run(options).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("3,4"), Ok(Point::new(3.0, 4.0)));
        assert_eq!(parse_point(" -1.5 , 2 "), Ok(Point::new(-1.5, 2.0)));
        assert!(parse_point("3").is_err());
        assert!(parse_point("a,b").is_err());
    }

    #[test]
    fn test_args_split_requires_both() {
        assert!(Args::try_parse_from(["photowheel", "--total", "12"]).is_err());
        let args = Args::try_parse_from(["photowheel", "--total", "12", "--local", "4"]).unwrap();
        assert_eq!(args.total.zip(args.local), Some((12, 4)));
    }

    #[test]
    fn test_args_drag() {
        let args = Args::try_parse_from(["photowheel", "--drag", "-3,4"]).unwrap();
        assert_eq!(args.drag, Some(Point::new(-3.0, 4.0)));
        assert_eq!(args.spins, 1);
    }

    #[test]
    fn test_args_drag_conflicts_with_spins() {
        let err = Args::try_parse_from(["photowheel", "--drag", "1,1", "--spins", "3"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
        assert!(Args::try_parse_from(["photowheel", "--spins", "3"]).is_ok());
    }

    #[test]
    fn test_args_no_recursive() {
        assert!(!Args::try_parse_from(["photowheel"]).unwrap().no_recursive);
        assert!(Args::try_parse_from(["photowheel", "--no-recursive"]).unwrap().no_recursive);
    }
}
