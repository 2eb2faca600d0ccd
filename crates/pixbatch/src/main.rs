//! Pixbatch CLI - concurrent batch image transforms and stress runs.
//!
//! Every image in an input directory is resized, blurred, sharpened and
//! color-adjusted on a bounded worker pool, and the results are summarized.
//!
//! # Usage
//!
//! ```bash
//! # Process a directory
//! pixbatch process --input ./images --output ./out
//!
//! # Stress run: 40 items, chain repeated 5 times each
//! pixbatch stress --input ./images --output ./stress --image-count 40 --iterations 5
//!
//! # View configuration
//! pixbatch config show
//! ```

use std::future::Future;
use std::time::Duration;

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Pixbatch - concurrent batch image transform engine.
#[derive(Parser, Debug)]
#[command(name = "pixbatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the transform chain over every image in a directory
    Process(cli::process::ProcessArgs),

    /// Amplify a base image set and run the heavier stress chain
    Stress(cli::stress::StressArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match pixbatch_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `pixbatch config path`."
            );
            pixbatch_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Pixbatch v{}", pixbatch_core::VERSION);

    let grace = Duration::from_millis(config.pipeline.shutdown_grace_ms);
    block_on_with_grace(grace, run(cli.command, config))?
}

/// Drive `future` on a fresh runtime, then give leftover blocking work at
/// most `grace` before returning.
///
/// Items abandoned after a shutdown may still hold blocking threads; a plain
/// runtime drop would wait for all of them.
fn block_on_with_grace<F: Future>(grace: Duration, future: F) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(grace);
    Ok(output)
}

async fn run(command: Commands, config: pixbatch_core::Config) -> anyhow::Result<()> {
    match command {
        Commands::Process(args) => cli::process::execute(args, config).await,
        Commands::Stress(args) => cli::stress::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_process_command() {
        let cli = Cli::try_parse_from([
            "pixbatch", "process", "--input", "in", "--output", "out", "--parallel", "3",
            "--iterations", "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Process(args) => {
                assert_eq!(args.input, std::path::PathBuf::from("in"));
                assert_eq!(args.parallel, Some(3));
                assert_eq!(args.iterations, Some(2));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_stress_command() {
        let cli = Cli::try_parse_from([
            "pixbatch",
            "-v",
            "stress",
            "--input",
            "in",
            "--output",
            "out",
            "--iterations",
            "5",
            "--image-count",
            "40",
            "--blur-radius",
            "3.5",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Stress(args) => {
                assert_eq!(args.iterations, Some(5));
                assert_eq!(args.image_count, Some(40));
                assert_eq!(args.blur_radius, Some(3.5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_abandoned_blocking_work_does_not_delay_exit() {
        let start = std::time::Instant::now();
        let value = block_on_with_grace(Duration::from_millis(100), async {
            tokio::task::spawn_blocking(|| std::thread::sleep(Duration::from_secs(3)));
            7
        })
        .unwrap();

        assert_eq!(value, 7);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_process_requires_input_and_output() {
        assert!(Cli::try_parse_from(["pixbatch", "process", "--input", "in"]).is_err());
    }
}
