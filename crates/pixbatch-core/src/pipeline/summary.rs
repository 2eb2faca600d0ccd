//! Folds result records into a [`BatchSummary`].

use std::collections::BTreeMap;
use std::time::Duration;

use crate::types::{BatchSummary, ErrorKind, ResultRecord};

/// Running totals over a batch. Order of `record` calls does not matter.
#[derive(Debug, Default, Clone)]
pub struct SummaryAccumulator {
    total_items: usize,
    succeeded: usize,
    failed: usize,
    total_elapsed: Duration,
    errors_by_kind: BTreeMap<ErrorKind, usize>,
    bytes_written: u64,
}

impl SummaryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: &ResultRecord) {
        self.total_items += 1;
        self.total_elapsed += record.elapsed;

        if record.success {
            self.succeeded += 1;
            self.bytes_written += record.output_bytes_written.unwrap_or(0);
        } else {
            self.failed += 1;
            // A failed record without a kind should not exist; count it as a fault
            let kind = record.error_kind.unwrap_or(ErrorKind::WorkerFault);
            *self.errors_by_kind.entry(kind).or_insert(0) += 1;
        }
    }

    pub fn processed(&self) -> usize {
        self.total_items
    }

    /// Finish the batch given the wall-clock time it took.
    pub fn finish(self, wall_time: Duration) -> BatchSummary {
        let per_image_average = if self.succeeded > 0 {
            self.total_elapsed / self.succeeded as u32
        } else {
            Duration::ZERO
        };

        let wall_secs = wall_time.as_secs_f64();
        let images_per_second = if wall_secs > 0.0 {
            self.succeeded as f64 / wall_secs
        } else {
            0.0
        };

        BatchSummary {
            total_items: self.total_items,
            succeeded: self.succeeded,
            failed: self.failed,
            total_elapsed: self.total_elapsed,
            per_image_average,
            errors_by_kind: self.errors_by_kind,
            wall_time,
            bytes_written: self.bytes_written,
            images_per_second,
        }
    }
}

impl<'a> FromIterator<&'a ResultRecord> for SummaryAccumulator {
    fn from_iter<I: IntoIterator<Item = &'a ResultRecord>>(iter: I) -> Self {
        let mut acc = Self::new();
        for record in iter {
            acc.record(record);
        }
        acc
    }
}
