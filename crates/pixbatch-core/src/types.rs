//! Core data types for the Pixbatch batch engine.
//!
//! These are plain records: a [`WorkItem`] goes into the worker pool, exactly
//! one [`ResultRecord`] comes out per item, and the coordinator folds the
//! records into a [`BatchSummary`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::TransformConfig;

/// One unit of work: transform `source` and write it to `destination`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Image to read. Never modified by the engine.
    pub source: PathBuf,

    /// Where the transformed image is written
    pub destination: PathBuf,

    /// Chain parameters for this item
    pub transform: TransformConfig,
}

impl WorkItem {
    pub fn new(
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        transform: TransformConfig,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            transform,
        }
    }
}

/// Lifecycle of a work item inside the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Queued,
    InProgress,
    Completed,
    Failed,
}

/// Failure taxonomy used for the per-kind histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Source unreadable or destination unwritable
    AccessError,
    /// Input bytes are not a decodable image
    DecodeError,
    /// A transform (or encode) stage rejected the image
    TransformError,
    /// The worker panicked while processing the item
    WorkerFault,
    /// The item never ran, or was abandoned after the shutdown grace period
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::AccessError => "AccessError",
            ErrorKind::DecodeError => "DecodeError",
            ErrorKind::TransformError => "TransformError",
            ErrorKind::WorkerFault => "WorkerFault",
            ErrorKind::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

/// Outcome of processing one work item. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub source_path: PathBuf,

    pub destination_path: PathBuf,

    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,

    /// Stage that failed ("decode", "resize", "encode", ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Time spent inside the worker for this item
    #[serde(rename = "elapsed_ms", with = "duration_ms")]
    pub elapsed: Duration,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_bytes_written: Option<u64>,

    /// BLAKE3 digest of the written output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_hash: Option<String>,
}

impl ResultRecord {
    /// A successful outcome.
    pub fn completed(item: &WorkItem, elapsed: Duration, bytes: u64, hash: String) -> Self {
        Self {
            source_path: item.source.clone(),
            destination_path: item.destination.clone(),
            success: true,
            error_kind: None,
            stage: None,
            message: None,
            elapsed,
            output_bytes_written: Some(bytes),
            output_hash: Some(hash),
        }
    }

    /// A failed outcome.
    pub fn failed(
        item: &WorkItem,
        kind: ErrorKind,
        stage: Option<String>,
        message: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            source_path: item.source.clone(),
            destination_path: item.destination.clone(),
            success: false,
            error_kind: Some(kind),
            stage,
            message: Some(message.into()),
            elapsed,
            output_bytes_written: None,
            output_hash: None,
        }
    }

    /// Terminal state of the item this record describes.
    pub fn state(&self) -> ItemState {
        if self.success {
            ItemState::Completed
        } else {
            ItemState::Failed
        }
    }
}

/// Aggregate statistics over every record of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_items: usize,

    pub succeeded: usize,

    pub failed: usize,

    /// Sum of per-item worker time
    #[serde(rename = "total_elapsed_ms", with = "duration_ms")]
    pub total_elapsed: Duration,

    /// `total_elapsed / succeeded`, zero when nothing succeeded
    #[serde(rename = "per_image_average_ms", with = "duration_ms")]
    pub per_image_average: Duration,

    pub errors_by_kind: BTreeMap<ErrorKind, usize>,

    /// Wall-clock time from submission to drain
    #[serde(rename = "wall_time_ms", with = "duration_ms")]
    pub wall_time: Duration,

    pub bytes_written: u64,

    /// Succeeded items per wall-clock second
    pub images_per_second: f64,
}

/// Summary plus every record, as written by `--report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub summary: BatchSummary,
    pub results: Vec<ResultRecord>,
}

/// Serde adapter storing a `Duration` as floating point milliseconds.
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64() * 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(deserializer)?;
        if !ms.is_finite() || ms < 0.0 {
            return Err(serde::de::Error::custom("duration must be a non-negative number"));
        }
        Ok(Duration::from_secs_f64(ms / 1000.0))
    }
}
