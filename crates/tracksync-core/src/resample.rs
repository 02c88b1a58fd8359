//! Nearest-forward matching of one timestamp series onto another.

use crate::Real;

/// For each query timestamp, find the first reference sample at or after
/// `query[i] + offset`.
///
/// Both slices must be sorted non-decreasingly. A single cursor sweeps the
/// reference once and is never reset, so the whole map costs
/// `O(query.len() + reference.len())` and is non-decreasing. Queries before
/// the first reference sample map to 0; queries past the last one map to the
/// last index. An empty reference yields an all-zero map.
pub fn map_query_to_reference(query: &[Real], reference: &[Real], offset: Real) -> Vec<usize> {
    let last = reference.len().saturating_sub(1);
    let mut cursor = 0usize;
    let mut map = Vec::with_capacity(query.len());
    for &t in query {
        let target = t + offset;
        while cursor < last && reference[cursor] < target {
            cursor += 1;
        }
        map.push(cursor);
    }
    map
}
