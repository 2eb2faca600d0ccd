//! Pixbatch Core - concurrent batch image transform engine.
//!
//! Pixbatch discovers the images in a directory, runs each one through a
//! fixed transform chain on a bounded worker pool, and folds the per-image
//! outcomes into a batch summary.
//!
//! # Architecture
//!
//! ```text
//! FileDiscovery → WorkItems → WorkerPool (N workers) → ResultRecords → BatchSummary
//!                     ↑
//!              LoadAmplifier (stress mode)
//! ```
//!
//! Every work item produces exactly one result record. A failing image,
//! including one whose decoder panics, is recorded and counted without
//! stopping the batch.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pixbatch_core::{BatchCoordinator, Config};
//!
//! #[tokio::main]
//! async fn main() -> pixbatch_core::Result<()> {
//!     let config = Config::load()?;
//!     let summary = BatchCoordinator::new(config)
//!         .run("./input".as_ref(), "./output".as_ref())
//!         .await?;
//!     println!("{} of {} succeeded", summary.succeeded, summary.total_items);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod types;

// Re-exports for convenient access
pub use config::Config;
pub use error::{ConfigError, PipelineError, PipelineResult, PixbatchError, Result};
pub use output::{write_report_file, OutputFormat, OutputWriter};
pub use pipeline::{
    BatchCoordinator, FileDiscovery, ImageProcessor, ItemHandler, LoadAmplifier, Progress,
    TransformChain, WorkerPool,
};
pub use types::{BatchReport, BatchSummary, ErrorKind, ItemState, ResultRecord, WorkItem};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
