//! The `pixbatch stress` command: load-amplified runs for profiling.

use clap::Args;
use pixbatch_core::{BatchCoordinator, Config};
use std::path::PathBuf;

use super::report;

/// Arguments for the `stress` command.
#[derive(Args, Debug, Default)]
pub struct StressArgs {
    /// Directory containing the base images
    #[arg(short, long)]
    pub input: PathBuf,

    /// Directory the processed images are written to (created if missing)
    #[arg(short, long)]
    pub output: PathBuf,

    /// Times the whole chain is applied to each image
    #[arg(long)]
    pub iterations: Option<u32>,

    /// Number of work items after duplicating the base images
    #[arg(long)]
    pub image_count: Option<usize>,

    /// Gaussian blur radius for the stress chain
    #[arg(long)]
    pub blur_radius: Option<f32>,

    /// Number of parallel workers (defaults to min(cpus, images))
    #[arg(short, long, env = "PIXBATCH_WORKERS")]
    pub parallel: Option<usize>,

    /// Skip the convolution filters appended to the stress chain
    #[arg(long)]
    pub no_filters: bool,

    /// Copy duplicated sources into this directory before processing
    #[arg(long)]
    pub materialize: Option<PathBuf>,

    /// Write a JSON/JSONL report with every result record
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Print the summary as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

impl StressArgs {
    /// Fold command-line overrides into `config` and re-validate it.
    pub fn apply(&self, config: &mut Config) -> anyhow::Result<()> {
        if let Some(iterations) = self.iterations {
            config.stress.iterations = iterations;
        }
        if let Some(count) = self.image_count {
            config.stress.image_count = count;
        }
        if let Some(radius) = self.blur_radius {
            config.stress.blur_radius = radius;
        }
        if let Some(parallel) = self.parallel {
            config.processing.parallel_workers = Some(parallel);
        }
        if self.no_filters {
            config.stress.extra_filters = false;
        }
        config.validate()?;
        Ok(())
    }
}

/// Execute the stress command.
pub async fn execute(args: StressArgs, mut config: Config) -> anyhow::Result<()> {
    args.apply(&mut config)?;
    let input = super::resolve_input(&args.input)?;
    let output = pixbatch_core::config::expand_path(&args.output);
    let staging = args
        .materialize
        .as_deref()
        .map(pixbatch_core::config::expand_path);

    tracing::info!(
        "Stress run: {} item(s), {} iteration(s), blur radius {}",
        config.stress.image_count,
        config.stress.iterations,
        config.stress.blur_radius
    );

    let shutdown = super::shutdown_on_ctrl_c();
    let coordinator = BatchCoordinator::new(config).with_shutdown(shutdown);

    let progress = report::create_progress_bar();
    let result = coordinator
        .run_stress_with(&input, &output, staging.as_deref(), |p| {
            report::tick(&progress, p)
        })
        .await;
    progress.finish_and_clear();
    let batch = result?;

    if batch.summary.total_items == 0 {
        tracing::warn!("No base images found in {:?}", input);
    }
    report::print_summary(&batch.summary);
    report::emit(
        &batch,
        args.report.as_deref(),
        args.json,
        coordinator.config(),
    )
}
