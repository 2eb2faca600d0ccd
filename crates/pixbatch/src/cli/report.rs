//! Progress display, summary table and report output shared by the batch
//! commands.

use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use pixbatch_core::{BatchReport, BatchSummary, Config, OutputFormat, Progress};

pub(crate) fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    pb.set_style(style);
    pb.set_message("starting...");
    pb
}

/// Advance `pb` for one arriving record.
pub(crate) fn tick(pb: &ProgressBar, progress: Progress<'_>) {
    pb.set_length(progress.total as u64);
    pb.set_position(progress.completed as u64);
    let name = progress
        .record
        .source_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if progress.record.success {
        pb.set_message(name);
    } else {
        let kind = progress
            .record
            .error_kind
            .map(|k| k.to_string())
            .unwrap_or_default();
        pb.set_message(format!("{name} ({kind})"));
    }
}

/// Print a formatted summary table after a batch.
pub(crate) fn print_summary(summary: &BatchSummary) {
    let mb_written = summary.bytes_written as f64 / 1_000_000.0;

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Succeeded:    {:>8}", summary.succeeded);
    if summary.failed > 0 {
        eprintln!("    Failed:       {:>8}", summary.failed);
        for (kind, count) in &summary.errors_by_kind {
            eprintln!("      {:<14}{:>6}", kind.to_string(), count);
        }
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", summary.total_items);
    eprintln!("    Wall time:    {:>7.2}s", summary.wall_time.as_secs_f64());
    eprintln!(
        "    Avg/image:    {:>6.1}ms",
        summary.per_image_average.as_secs_f64() * 1000.0
    );
    eprintln!("    Rate:         {:>7.1} img/sec", summary.images_per_second);
    eprintln!("    Written:      {:>7.1} MB", mb_written);
    eprintln!("  ====================================");
}

/// Write the report file when requested and print the summary as JSON on
/// stdout when `json` is set.
pub(crate) fn emit(
    report: &BatchReport,
    report_path: Option<&Path>,
    json: bool,
    config: &Config,
) -> anyhow::Result<()> {
    if let Some(path) = report_path {
        let path = pixbatch_core::config::expand_path(path);
        let format = report_format(&path, &config.output.report_format);
        pixbatch_core::write_report_file(&path, report, format, config.output.pretty)?;
        tracing::info!("Report written to {:?}", path);
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&report.summary)?);
    }
    Ok(())
}

/// The report path's extension wins over the configured format.
fn report_format(path: &Path, configured: &str) -> OutputFormat {
    OutputFormat::from_path(path)
        .or_else(|| OutputFormat::parse(configured))
        .unwrap_or(OutputFormat::Json)
}
