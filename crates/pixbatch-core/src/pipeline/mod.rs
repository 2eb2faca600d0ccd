//! Batch image pipeline components.
//!
//! - **discovery**: Find image files in an input directory
//! - **codec**: Decode source bytes, encode and persist outputs
//! - **transform**: The ordered per-image stage chain
//! - **processor**: Runs one work item end to end
//! - **channel**: Bounded channels for backpressure
//! - **pool**: Bounded worker pool with fault containment
//! - **summary**: Order-independent result aggregation
//! - **amplify**: Stress-mode load amplification
//! - **coordinator**: Ties discovery, pool and summary together

pub mod amplify;
pub mod channel;
pub mod codec;
pub mod coordinator;
pub mod discovery;
pub mod pool;
pub mod processor;
pub mod summary;
pub mod transform;

// Re-exports for convenient access
pub use amplify::LoadAmplifier;
pub use codec::{DecodedImage, WrittenOutput};
pub use coordinator::{destination_for, BatchCoordinator, Progress};
pub use discovery::{DiscoveredFile, FileDiscovery};
pub use pool::{ItemHandler, WorkerPool};
pub use processor::ImageProcessor;
pub use summary::SummaryAccumulator;
pub use transform::{Kernel, Stage, StageError, TransformChain};
