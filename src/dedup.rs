//! First-occurrence-wins deduplication.
//!
//! Overlapping source extracts repeat the same documents and readings. A
//! repeated document is dropped wholesale, never merged into the first one.

use crate::models::{ConsumptionDocument, ConsumptionEntry, MeterSnapshot};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;

/// Keep the first document per `(document_id, start, end)`, then dedupe each kept document's entries.
pub fn dedupe_documents(documents: Vec<ConsumptionDocument>) -> Vec<ConsumptionDocument> {
    let before = documents.len();
    let mut seen = HashSet::with_capacity(before);

    let kept: Vec<ConsumptionDocument> = documents
        .into_iter()
        .filter(|doc| seen.insert(doc.key()))
        .map(|doc| ConsumptionDocument {
            entries: dedupe_entries(doc.entries),
            ..doc
        })
        .collect();

    debug!(before, after = kept.len(), "deduplicated consumption documents");
    kept
}

/// Keep the first entry per `(timestamp, volume)`.
pub fn dedupe_entries(entries: Vec<ConsumptionEntry>) -> Vec<ConsumptionEntry> {
    let mut seen = HashSet::with_capacity(entries.len());
    entries
        .into_iter()
        .filter(|e| seen.insert(entry_key(e)))
        .collect()
}

/// Keep the first snapshot per timestamp. Later snapshots at that timestamp are dropped, not merged.
pub fn dedupe_snapshots(snapshots: Vec<MeterSnapshot>) -> Vec<MeterSnapshot> {
    let before = snapshots.len();
    let mut seen = HashSet::with_capacity(before);
    let kept: Vec<MeterSnapshot> = snapshots
        .into_iter()
        .filter(|s| seen.insert(s.timestamp))
        .collect();
    debug!(before, after = kept.len(), "deduplicated meter snapshots");
    kept
}

fn entry_key(e: &ConsumptionEntry) -> (DateTime<Utc>, u64) {
    // -0.0 and 0.0 are the same reading
    let volume = if e.volume == 0.0 { 0.0f64 } else { e.volume };
    (e.timestamp, volume.to_bits())
}
