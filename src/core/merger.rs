// Deduplicating merge of uploaded batches into a canonical series

use std::collections::HashSet;

use crate::core::constants::IngestMode;
use crate::core::format::{CanonicalSeries, MergeOutcome, RawBatch, Sample};
use tracing::debug;

/// Merge `incoming` into `existing` according to `mode`.
///
/// The first row of the batch is always kept, it may legitimately repeat
/// an earlier pair as a sync marker. The remaining rows are deduplicated on
/// the exact `(time, voltage)` bit pattern, keeping first occurrences in
/// order. In [`IngestMode::Append`] the remainder is also checked against
/// every sample already in `existing`; in [`IngestMode::Replace`] the
/// deduplicated batch becomes the new series.
pub fn merge(existing: &CanonicalSeries, incoming: &RawBatch, mode: IngestMode) -> MergeOutcome {
    let outcome = match mode {
        IngestMode::Replace => dedup_batch(incoming),
        IngestMode::Append => {
            let seen: HashSet<(u64, u64)> = existing.samples.iter().map(Sample::key).collect();
            let (unique, removed) = dedup_rows(&incoming.samples, seen);

            let mut series = CanonicalSeries::with_capacity(existing.len() + unique.len());
            series.samples.extend_from_slice(&existing.samples);
            series.samples.extend(unique);
            MergeOutcome { series, removed }
        }
    };

    debug!(
        "Merged batch of {} rows ({}): {} duplicates removed, series now {} rows",
        incoming.len(),
        mode.as_str(),
        outcome.removed,
        outcome.series.len()
    );

    outcome
}

/// Deduplicate a batch against itself only.
pub fn dedup_batch(incoming: &RawBatch) -> MergeOutcome {
    let (unique, removed) = dedup_rows(&incoming.samples, HashSet::new());
    MergeOutcome {
        series: CanonicalSeries::from(unique),
        removed,
    }
}

fn dedup_rows(rows: &[Sample], mut seen: HashSet<(u64, u64)>) -> (Vec<Sample>, usize) {
    let Some((first, rest)) = rows.split_first() else {
        return (Vec::new(), 0);
    };

    let mut unique = Vec::with_capacity(rows.len());
    unique.push(*first);

    let mut removed = 0;
    for sample in rest {
        if seen.insert(sample.key()) {
            unique.push(*sample);
        } else {
            removed += 1;
        }
    }

    (unique, removed)
}
