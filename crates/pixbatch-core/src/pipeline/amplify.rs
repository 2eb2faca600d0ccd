//! Stress-mode workload generator.
//!
//! Inflates a base image set to a target count by round-robin duplication
//! and scales per-image cost through the chain's iteration count. Duplicates
//! reference the same source file; nothing under the base set is written.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::TransformConfig;
use crate::error::{ConfigError, PixbatchError, Result};
use crate::types::WorkItem;

/// Builds stress work items for one output directory.
#[derive(Debug, Clone)]
pub struct LoadAmplifier {
    output_dir: PathBuf,
    prefix: String,
    transform: TransformConfig,
}

impl LoadAmplifier {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        transform: TransformConfig,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: prefix.into(),
            transform,
        }
    }

    /// Expand `base` to exactly `target` items.
    ///
    /// With enough base images the first `target` are used in order.
    /// Otherwise entry `i` reuses `base[i % base.len()]`, and every entry past
    /// the base set gets a distinct `dup_NNN_` destination. An empty base set
    /// yields no items.
    pub fn amplify(
        &self,
        base: &[PathBuf],
        target: usize,
        iteration_multiplier: u32,
    ) -> Vec<WorkItem> {
        if base.is_empty() {
            if target > 0 {
                tracing::warn!("No base images to amplify to {} item(s)", target);
            }
            return Vec::new();
        }

        let transform = TransformConfig {
            iteration_count: iteration_multiplier.max(1),
            ..self.transform
        };

        let items: Vec<WorkItem> = (0..target)
            .map(|i| {
                let source = &base[i % base.len()];
                let name = if i < base.len() {
                    file_name(source)
                } else {
                    duplicate_name(i, source)
                };
                let destination = self.output_dir.join(format!("{}{}", self.prefix, name));
                WorkItem::new(source.clone(), destination, transform)
            })
            .collect();

        tracing::info!(
            "Amplified {} base image(s) to {} item(s) x {} iteration(s)",
            base.len(),
            items.len(),
            transform.iteration_count
        );
        items
    }

    /// Give every repeated source its own file in `staging_dir`.
    ///
    /// The first item for each source keeps pointing at the original. Later
    /// items are repointed at a byte copy named like their destination's
    /// `dup_NNN_` entry. `staging_dir` must not be a directory that holds any
    /// of the base images.
    pub fn materialize(&self, items: &[WorkItem], staging_dir: &Path) -> Result<Vec<WorkItem>> {
        std::fs::create_dir_all(staging_dir)
            .map_err(|e| PixbatchError::access(staging_dir, e))?;
        let staging = staging_dir
            .canonicalize()
            .map_err(|e| PixbatchError::access(staging_dir, e))?;

        for item in items {
            let parent = item.source.parent().unwrap_or(Path::new("."));
            if let Ok(parent) = parent.canonicalize() {
                if parent == staging {
                    return Err(ConfigError::ValidationError(format!(
                        "staging directory {:?} must differ from the base image directory",
                        staging_dir
                    ))
                    .into());
                }
            }
        }

        let mut seen = HashSet::new();
        let mut copied = 0usize;
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            if seen.insert(item.source.clone()) {
                out.push(item.clone());
                continue;
            }
            let copy = staging_dir.join(duplicate_name(i, &item.source));
            std::fs::copy(&item.source, &copy).map_err(|e| PixbatchError::access(&copy, e))?;
            tracing::debug!("Created duplicate: {:?}", copy);
            copied += 1;
            out.push(WorkItem {
                source: copy,
                ..item.clone()
            });
        }

        tracing::info!("Materialized {} duplicate(s) in {:?}", copied, staging_dir);
        Ok(out)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

/// `dup_{i+1:03}_{stem}{.ext}` for the entry at position `i`.
fn duplicate_name(i: usize, source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string());
    match source.extension() {
        Some(ext) => format!("dup_{:03}_{}.{}", i + 1, stem, ext.to_string_lossy()),
        None => format!("dup_{:03}_{}", i + 1, stem),
    }
}
