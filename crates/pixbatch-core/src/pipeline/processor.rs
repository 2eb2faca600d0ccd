//! Per-item pipeline: read, decode, transform, encode, persist.

use std::path::Path;
use std::time::Instant;

use crate::config::OutputConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::types::WorkItem;

use super::codec::{self, format_to_string, WrittenOutput};
use super::pool::ItemHandler;
use super::transform::TransformChain;

/// The handler the worker pool runs for every image.
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    jpeg_quality: u8,
    extra_filters: bool,
}

impl ImageProcessor {
    /// Create a new image processor with the given output settings.
    pub fn new(output: &OutputConfig) -> Self {
        Self {
            jpeg_quality: output.jpeg_quality,
            extra_filters: false,
        }
    }

    /// Append the convolution filters to every chain (stress runs).
    pub fn with_extra_filters(mut self, enabled: bool) -> Self {
        self.extra_filters = enabled;
        self
    }

    /// The chain this processor runs for `item`.
    pub fn chain_for(&self, item: &WorkItem) -> TransformChain {
        if self.extra_filters {
            TransformChain::stress(&item.transform, true)
        } else {
            TransformChain::standard(&item.transform)
        }
    }

    /// Process a single item end to end.
    ///
    /// The source file is only ever read. The destination is written once,
    /// after every stage has succeeded.
    pub fn process(&self, item: &WorkItem) -> PipelineResult<WrittenOutput> {
        let start = Instant::now();
        tracing::debug!("Processing: {:?}", item.source);

        let bytes = read_source(&item.source)?;
        let read_time = start.elapsed();
        tracing::trace!("  Read: {:?}", read_time);

        let decode_start = Instant::now();
        let decoded = codec::decode(bytes, &item.source)?;
        tracing::trace!(
            "  Decode: {:?} ({} {}x{})",
            decode_start.elapsed(),
            format_to_string(decoded.format),
            decoded.width,
            decoded.height
        );

        let transform_start = Instant::now();
        let chain = self.chain_for(item);
        let transformed =
            chain
                .apply(decoded.image)
                .map_err(|e| PipelineError::Transform {
                    path: item.source.clone(),
                    stage: e.stage.to_string(),
                    message: e.message,
                })?;
        tracing::trace!("  Transform: {:?}", transform_start.elapsed());

        let encode_start = Instant::now();
        let encoded = codec::encode(&transformed, &item.destination, self.jpeg_quality)?;
        tracing::trace!("  Encode: {:?}", encode_start.elapsed());

        let written = codec::persist(&encoded, &item.destination)?;

        tracing::debug!(
            "Processed {:?} -> {:?} in {:?} ({} bytes)",
            item.source,
            item.destination,
            start.elapsed(),
            written.bytes_written
        );
        Ok(written)
    }
}

impl ItemHandler for ImageProcessor {
    fn handle(&self, item: &WorkItem) -> PipelineResult<WrittenOutput> {
        self.process(item)
    }
}

fn read_source(path: &Path) -> PipelineResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| PipelineError::Access {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
