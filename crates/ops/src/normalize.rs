//! Batch ordering.

use vellum_proto::EditOperation;

/// Reorders a batch so it can be applied against a single buffer without
/// positions drifting mid-batch.
///
/// Operations carry offsets computed against the pre-edit buffer; applying
/// from the highest anchor downward means no application shifts the offsets
/// of a later (lower-anchored) operation. Pure reordering: stable sort by
/// descending anchor, tie-broken by descending range end, never fails.
#[must_use]
pub fn normalize(mut ops: Vec<EditOperation>) -> Vec<EditOperation> {
	ops.sort_by(|a, b| {
		b.anchor()
			.cmp(&a.anchor())
			.then_with(|| b.end().cmp(&a.end()))
	});
	ops
}
