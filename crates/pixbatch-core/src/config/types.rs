//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};

/// Processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Number of parallel workers. When unset, the pool uses
    /// `min(available cpus, item count)` with a floor of 1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_workers: Option<usize>,

    /// Recognized input extensions (matched case-insensitively)
    pub supported_formats: Vec<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_workers: None,
            supported_formats: vec![
                "jpg".to_string(),
                "jpeg".to_string(),
                "png".to_string(),
                "bmp".to_string(),
                "gif".to_string(),
            ],
        }
    }
}

impl ProcessingConfig {
    /// Resolve the worker count for a batch of `item_count` items.
    pub fn concurrency_for(&self, item_count: usize) -> usize {
        match self.parallel_workers {
            Some(workers) => workers.max(1),
            None => default_concurrency(item_count),
        }
    }
}

/// `min(cpu count, item count)`, never below 1.
pub fn default_concurrency(item_count: usize) -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cpus.min(item_count).max(1)
}

/// Worker pool settings for backpressure and shutdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Max work items buffered between the dispatcher and the workers
    pub buffer_size: usize,

    /// How long in-flight items may keep running after shutdown is requested
    pub shutdown_grace_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_size: 64,
            shutdown_grace_ms: 5000,
        }
    }
}

/// Parameters of the transform chain applied to every item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Target `(width, height)` of the resize stage
    pub resize: (u32, u32),

    /// Gaussian blur radius; 0 disables blurring
    pub blur_radius: f32,

    /// Sharpness factor (1.0 leaves the image unchanged)
    pub sharpen_factor: f32,

    /// Contrast factor (1.0 leaves the image unchanged)
    pub contrast_factor: f32,

    /// Brightness factor (1.0 leaves the image unchanged)
    pub brightness_factor: f32,

    /// How many times the whole chain is applied
    pub iteration_count: u32,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            resize: (800, 600),
            blur_radius: 2.0,
            sharpen_factor: 2.0,
            contrast_factor: 1.5,
            brightness_factor: 1.2,
            iteration_count: 1,
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Prefix prepended to the source file name of every output
    pub prefix: String,

    /// JPEG quality (1-100)
    pub jpeg_quality: u8,

    /// Report format ("json" or "jsonl")
    pub report_format: String,

    /// Pretty-print JSON reports
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            prefix: "processed_".to_string(),
            jpeg_quality: 80,
            report_format: "json".to_string(),
            pretty: true,
        }
    }
}

/// Stress-test (load amplification) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    /// Target number of work items after amplification
    pub image_count: usize,

    /// Chain repetitions per item
    pub iterations: u32,

    /// Blur radius used instead of `transform.blur_radius`
    pub blur_radius: f32,

    /// Output name prefix for stress runs
    pub prefix: String,

    /// Append the convolution filter stages after the standard chain
    pub extra_filters: bool,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            image_count: 20,
            iterations: 3,
            blur_radius: 5.0,
            prefix: "stress_processed_".to_string(),
            extra_filters: true,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
