//! Batch orchestration: discovery, work item construction, pool submission
//! and summary aggregation.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{PixbatchError, Result};
use crate::types::{BatchReport, BatchSummary, ResultRecord, WorkItem};

use super::amplify::LoadAmplifier;
use super::discovery::FileDiscovery;
use super::pool::WorkerPool;
use super::processor::ImageProcessor;
use super::summary::SummaryAccumulator;

/// Progress notification passed to `run_with` callbacks.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    pub record: &'a ResultRecord,
    /// Records received so far, including this one
    pub completed: usize,
    pub total: usize,
}

/// Runs whole batches against a fixed configuration.
pub struct BatchCoordinator {
    config: Config,
    shutdown: CancellationToken,
}

impl BatchCoordinator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Share a shutdown token with the worker pool (e.g. wired to Ctrl-C).
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Process every image directly inside `input` into `output`.
    pub async fn run(&self, input: &Path, output: &Path) -> Result<BatchSummary> {
        Ok(self.run_with(input, output, |_| {}).await?.summary)
    }

    /// Like [`run`](Self::run), reporting each record as it arrives and
    /// returning every record alongside the summary.
    ///
    /// Fails only when `input` cannot be scanned or `output` cannot be
    /// created or written. Per-image failures are counted in the summary.
    pub async fn run_with<F>(
        &self,
        input: &Path,
        output: &Path,
        on_progress: F,
    ) -> Result<BatchReport>
    where
        F: FnMut(Progress<'_>),
    {
        let sources = self.discover(input)?;
        ensure_dir(output)?;
        if sources.is_empty() {
            tracing::info!("No images found in {:?}", input);
            return Ok(empty_report());
        }

        let items: Vec<WorkItem> = sources
            .iter()
            .map(|source| {
                let destination = destination_for(output, &self.config.output.prefix, source);
                WorkItem::new(source.clone(), destination, self.config.transform)
            })
            .collect();

        let processor = ImageProcessor::new(&self.config.output);
        self.execute(items, processor, on_progress).await
    }

    /// Run an explicit item list with the standard chain.
    ///
    /// Destination directories are created before submission.
    pub async fn run_items<F>(
        &self,
        items: Vec<WorkItem>,
        on_progress: F,
    ) -> Result<BatchReport>
    where
        F: FnMut(Progress<'_>),
    {
        let processor = ImageProcessor::new(&self.config.output);
        self.execute(items, processor, on_progress).await
    }

    /// Stress mode: amplify the images in `input` and run them with the
    /// stress chain.
    pub async fn run_stress(&self, input: &Path, output: &Path) -> Result<BatchSummary> {
        Ok(self
            .run_stress_with(input, output, None, |_| {})
            .await?
            .summary)
    }

    /// Stress mode with progress reporting. When `staging` is given,
    /// duplicated sources are copied there first.
    pub async fn run_stress_with<F>(
        &self,
        input: &Path,
        output: &Path,
        staging: Option<&Path>,
        on_progress: F,
    ) -> Result<BatchReport>
    where
        F: FnMut(Progress<'_>),
    {
        let stress = &self.config.stress;
        let base = self.discover(input)?;
        ensure_dir(output)?;

        let amplifier =
            LoadAmplifier::new(output, stress.prefix.clone(), self.config.stress_transform());
        let mut items = amplifier.amplify(&base, stress.image_count, stress.iterations);
        if items.is_empty() {
            tracing::info!("Nothing to stress in {:?}", input);
            return Ok(empty_report());
        }
        if let Some(staging) = staging {
            items = amplifier.materialize(&items, staging)?;
        }

        let processor =
            ImageProcessor::new(&self.config.output).with_extra_filters(stress.extra_filters);
        self.execute(items, processor, on_progress).await
    }

    fn discover(&self, input: &Path) -> Result<Vec<PathBuf>> {
        let files = FileDiscovery::new(&self.config.processing).discover(input)?;
        tracing::info!(
            "Found {} image(s) ({} bytes) in {:?}",
            files.len(),
            FileDiscovery::total_size(&files),
            input
        );
        Ok(files.into_iter().map(|f| f.path).collect())
    }

    async fn execute<F>(
        &self,
        items: Vec<WorkItem>,
        processor: ImageProcessor,
        mut on_progress: F,
    ) -> Result<BatchReport>
    where
        F: FnMut(Progress<'_>),
    {
        if items.is_empty() {
            return Ok(empty_report());
        }

        let parents: BTreeSet<&Path> = items
            .iter()
            .filter_map(|item| item.destination.parent())
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        for parent in parents {
            ensure_dir(parent)?;
        }

        let total = items.len();
        let concurrency = self.config.processing.concurrency_for(total);
        tracing::info!(
            "Processing {} item(s) with {} worker(s)",
            total,
            concurrency
        );

        let pool = WorkerPool::new(concurrency, self.config.pipeline.clone())
            .with_shutdown(self.shutdown.clone());
        let start = Instant::now();
        let mut summary = SummaryAccumulator::new();

        let results = pool
            .run_with(items, Arc::new(processor), |record| {
                summary.record(record);
                on_progress(Progress {
                    record,
                    completed: summary.processed(),
                    total,
                });
            })
            .await;

        let summary = summary.finish(start.elapsed());
        tracing::info!(
            "Batch complete: {} succeeded, {} failed in {:?}",
            summary.succeeded,
            summary.failed,
            summary.wall_time
        );
        Ok(BatchReport { summary, results })
    }
}

/// `output/{prefix}{file name of source}`.
pub fn destination_for(output: &Path, prefix: &str, source: &Path) -> PathBuf {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string());
    output.join(format!("{}{}", prefix, name))
}

/// Create `dir` if needed and confirm files can be created inside it.
fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| PixbatchError::access(dir, e))?;

    let sentinel = dir.join(format!(".pixbatch-write-check-{}", std::process::id()));
    std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&sentinel)
        .map_err(|e| PixbatchError::access(dir, e))?;
    if let Err(e) = std::fs::remove_file(&sentinel) {
        tracing::warn!("Could not remove {:?}: {}", sentinel, e);
    }
    Ok(())
}

fn empty_report() -> BatchReport {
    BatchReport {
        summary: BatchSummary::default(),
        results: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransformConfig;
    use crate::types::ErrorKind;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

    fn write_png(path: &Path) {
        let img = RgbImage::from_fn(40, 30, |x, y| Rgb([x as u8 * 5, y as u8 * 7, 90]));
        DynamicImage::ImageRgb8(img)
            .save_with_format(path, ImageFormat::Png)
            .unwrap();
    }

    fn small_config() -> Config {
        let mut config = Config::default();
        config.transform = TransformConfig {
            resize: (20, 15),
            ..TransformConfig::default()
        };
        config.processing.parallel_workers = Some(2);
        config
    }

    #[test]
    fn test_destination_for() {
        assert_eq!(
            destination_for(Path::new("out"), "processed_", Path::new("in/cat.jpg")),
            PathBuf::from("out/processed_cat.jpg")
        );
    }

    #[tokio::test]
    async fn test_empty_input_gives_zero_summary() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        std::fs::create_dir(&input).unwrap();
        let output = dir.path().join("out");

        let summary = BatchCoordinator::new(small_config())
            .run(&input, &output)
            .await
            .unwrap();
        assert_eq!(summary.total_items, 0);
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.failed, 0);
        assert!(output.is_dir());
    }

    #[tokio::test]
    async fn test_missing_input_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = BatchCoordinator::new(small_config())
            .run(&dir.path().join("nope"), &dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, PixbatchError::Access { .. }));
    }

    #[tokio::test]
    async fn test_unwritable_output_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        std::fs::create_dir(&input).unwrap();
        write_png(&input.join("a.png"));
        // A regular file where the output directory should go
        let output = dir.path().join("blocked");
        std::fs::write(&output, b"file").unwrap();

        let err = BatchCoordinator::new(small_config())
            .run(&input, &output)
            .await
            .unwrap_err();
        assert!(matches!(err, PixbatchError::Access { .. }));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_existing_output_that_rejects_writes_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        std::fs::create_dir(&input).unwrap();
        write_png(&input.join("a.png"));
        write_png(&input.join("b.png"));

        // Exists, but refuses new files even for root
        let err = BatchCoordinator::new(small_config())
            .run(&input, Path::new("/proc"))
            .await
            .unwrap_err();
        assert!(matches!(err, PixbatchError::Access { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_read_only_output_dir_is_fatal() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        std::fs::create_dir(&input).unwrap();
        write_png(&input.join("a.png"));
        let output = dir.path().join("out");
        std::fs::create_dir(&output).unwrap();
        std::fs::set_permissions(&output, std::fs::Permissions::from_mode(0o555)).unwrap();

        // Permission bits are not enforced for privileged users
        let enforced = std::fs::write(output.join("check"), b"x").is_err();
        let result = BatchCoordinator::new(small_config()).run(&input, &output).await;
        std::fs::set_permissions(&output, std::fs::Permissions::from_mode(0o755)).unwrap();

        if enforced {
            assert!(matches!(result, Err(PixbatchError::Access { .. })));
        } else {
            assert_eq!(result.unwrap().succeeded, 1);
        }
        let leftovers: Vec<_> = std::fs::read_dir(&output)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".pixbatch-write-check"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_run_reports_progress_and_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        std::fs::create_dir(&input).unwrap();
        for name in ["a.png", "b.png", "c.png"] {
            write_png(&input.join(name));
        }
        std::fs::write(input.join("broken.png"), b"garbage").unwrap();
        let output = dir.path().join("out");

        let mut ticks = Vec::new();
        let report = BatchCoordinator::new(small_config())
            .run_with(&input, &output, |p| ticks.push((p.completed, p.total)))
            .await
            .unwrap();

        assert_eq!(report.summary.total_items, 4);
        assert_eq!(report.summary.succeeded, 3);
        assert_eq!(report.summary.errors_by_kind[&ErrorKind::DecodeError], 1);
        assert_eq!(report.results.len(), 4);
        assert_eq!(ticks.last(), Some(&(4, 4)));
        assert!(output.join("processed_a.png").is_file());
        assert!(!output.join("processed_broken.png").exists());
    }

    #[tokio::test]
    async fn test_run_items_creates_destination_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.png");
        write_png(&source);
        let destination = dir.path().join("nested").join("deeper").join("a.png");

        let config = small_config();
        let item = WorkItem::new(&source, &destination, config.transform);
        let report = BatchCoordinator::new(config)
            .run_items(vec![item], |_| {})
            .await
            .unwrap();

        assert_eq!(report.summary.succeeded, 1);
        assert!(destination.is_file());
        assert!(report.results[0].output_hash.is_some());
    }

    #[tokio::test]
    async fn test_stress_amplifies_to_image_count() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        std::fs::create_dir(&input).unwrap();
        write_png(&input.join("a.png"));
        write_png(&input.join("b.png"));
        let output = dir.path().join("out");

        let mut config = small_config();
        config.stress.image_count = 5;
        config.stress.iterations = 1;
        config.stress.blur_radius = 1.0;
        config.stress.extra_filters = false;

        let summary = BatchCoordinator::new(config)
            .run_stress(&input, &output)
            .await
            .unwrap();
        assert_eq!(summary.total_items, 5);
        assert_eq!(summary.succeeded, 5);
        assert!(output.join("stress_processed_dup_005_a.png").is_file());
        assert_eq!(std::fs::read_dir(&input).unwrap().count(), 2);
    }
}
