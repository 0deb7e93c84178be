//! Cross-point de-duplication of raw search hits.
//!
//! The same place recurs across neighboring grid points; the provider id is
//! unique per place, so it is the dedup key. First-seen wins: when the
//! provider returns different attributes for the same id from different grid
//! points, the hit from the earliest point in generation order survives.

use std::collections::HashSet;

use leadgrid_places::PlaceSummary;

/// Collapses a raw result stream to one entry per distinct `place_id`,
/// preserving first-seen order.
///
/// Idempotent: deduplicating an already-deduplicated sequence returns it
/// unchanged.
#[must_use]
pub fn dedup_first_seen(results: &[PlaceSummary]) -> Vec<PlaceSummary> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(results.len());
    let mut unique = Vec::new();
    for hit in results {
        if seen.insert(hit.place_id.as_str()) {
            unique.push(hit.clone());
        }
    }
    unique
}
