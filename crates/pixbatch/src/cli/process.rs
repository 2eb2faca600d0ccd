//! The `pixbatch process` command.

use clap::Args;
use pixbatch_core::{BatchCoordinator, Config};
use std::path::PathBuf;

use super::report;

/// Arguments for the `process` command.
#[derive(Args, Debug, Default)]
pub struct ProcessArgs {
    /// Directory containing the images to process
    #[arg(short, long)]
    pub input: PathBuf,

    /// Directory the processed images are written to (created if missing)
    #[arg(short, long)]
    pub output: PathBuf,

    /// Number of parallel workers (defaults to min(cpus, images))
    #[arg(short, long, env = "PIXBATCH_WORKERS")]
    pub parallel: Option<usize>,

    /// Gaussian blur radius
    #[arg(long)]
    pub blur_radius: Option<f32>,

    /// Apply the whole transform chain this many times per image
    #[arg(long)]
    pub iterations: Option<u32>,

    /// Write a JSON/JSONL report with every result record
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Print the summary as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

impl ProcessArgs {
    /// Fold command-line overrides into `config` and re-validate it.
    pub fn apply(&self, config: &mut Config) -> anyhow::Result<()> {
        if let Some(parallel) = self.parallel {
            config.processing.parallel_workers = Some(parallel);
        }
        if let Some(radius) = self.blur_radius {
            config.transform.blur_radius = radius;
        }
        if let Some(iterations) = self.iterations {
            config.transform.iteration_count = iterations;
        }
        config.validate()?;
        Ok(())
    }
}

/// Execute the process command.
pub async fn execute(args: ProcessArgs, mut config: Config) -> anyhow::Result<()> {
    args.apply(&mut config)?;
    let input = super::resolve_input(&args.input)?;
    let output = pixbatch_core::config::expand_path(&args.output);

    let shutdown = super::shutdown_on_ctrl_c();
    let coordinator = BatchCoordinator::new(config).with_shutdown(shutdown);

    let progress = report::create_progress_bar();
    let result = coordinator
        .run_with(&input, &output, |p| report::tick(&progress, p))
        .await;
    progress.finish_and_clear();
    let batch = result?;

    if batch.summary.total_items == 0 {
        tracing::warn!("No supported image files found in {:?}", input);
    }
    report::print_summary(&batch.summary);
    report::emit(
        &batch,
        args.report.as_deref(),
        args.json,
        coordinator.config(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overrides() {
        let args = ProcessArgs {
            parallel: Some(3),
            blur_radius: Some(0.5),
            iterations: Some(4),
            ..ProcessArgs::default()
        };
        let mut config = Config::default();
        args.apply(&mut config).unwrap();
        assert_eq!(config.processing.parallel_workers, Some(3));
        assert_eq!(config.transform.blur_radius, 0.5);
        assert_eq!(config.transform.iteration_count, 4);
        assert_eq!(config.stress.iterations, Config::default().stress.iterations);
    }

    #[test]
    fn test_apply_rejects_zero_iterations() {
        let args = ProcessArgs {
            iterations: Some(0),
            ..ProcessArgs::default()
        };
        let err = args.apply(&mut Config::default()).unwrap_err();
        assert!(err.to_string().contains("iteration_count"));
    }

    #[test]
    fn test_apply_rejects_negative_blur() {
        let args = ProcessArgs {
            blur_radius: Some(-1.0),
            ..ProcessArgs::default()
        };
        assert!(args.apply(&mut Config::default()).is_err());
    }

    #[test]
    fn test_apply_rejects_zero_workers() {
        let args = ProcessArgs {
            parallel: Some(0),
            ..ProcessArgs::default()
        };
        assert!(args.apply(&mut Config::default()).is_err());
    }
}
