//! Applying operation batches to the text register.

use vellum_doc::TextStore;
use vellum_proto::EditOperation;

use crate::content::render_markdown;
use crate::normalize::normalize;

/// A single offset edit against the register: delete `delete` characters at
/// `at`, then insert `insert` there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveEdit {
	/// Character offset, already clamped to the buffer.
	pub at: usize,
	/// Rendered text to insert.
	pub insert: String,
	/// Characters to delete.
	pub delete: usize,
}

/// Why a single operation was skipped.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
	/// The operation's range ends before it starts.
	#[error("inverted range: from {from} > to {to}")]
	InvertedRange {
		/// Range start.
		from: usize,
		/// Range end.
		to: usize,
	},
}

/// Result of applying one batch.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
	/// The batch in normalized (applied) order.
	pub operations: Vec<EditOperation>,
	/// Operations applied.
	pub applied: usize,
	/// Operations skipped as malformed.
	pub skipped: usize,
}

/// Reduces one operation to a primitive edit against a buffer of length
/// `len`, clamping offsets to `[0, len]`.
#[must_use]
pub fn to_primitive(op: &EditOperation, len: usize) -> PrimitiveEdit {
	match op {
		EditOperation::Insert {
			position, content, ..
		} => PrimitiveEdit {
			at: position.unwrap_or(0).min(len),
			insert: render_markdown(content),
			delete: 0,
		},
		EditOperation::Replace { content, .. } => {
			let at = op.anchor().min(len);
			let to = op.end().clamp(at, len);
			PrimitiveEdit {
				at,
				insert: render_markdown(content),
				delete: to - at,
			}
		}
		EditOperation::Delete { .. } => {
			let at = op.anchor().min(len);
			let to = op.end().clamp(at, len);
			PrimitiveEdit {
				at,
				insert: String::new(),
				delete: to - at,
			}
		}
	}
}

/// Normalizes a batch and applies it to the register.
///
/// Each operation is reduced against the buffer's *current* length, so
/// clamping accounts for earlier edits in the same batch. A malformed
/// operation is logged and skipped; it never aborts the rest of the batch.
pub fn apply_batch(store: &mut impl TextStore, ops: Vec<EditOperation>) -> BatchOutcome {
	let operations = normalize(ops);
	let mut applied = 0;
	let mut skipped = 0;

	for op in &operations {
		match try_apply(store, op) {
			Ok(()) => applied += 1,
			Err(err) => {
				skipped += 1;
				tracing::warn!(
					error = %err,
					description = op.description().unwrap_or(""),
					"skipping malformed operation"
				);
			}
		}
	}

	BatchOutcome {
		operations,
		applied,
		skipped,
	}
}

fn try_apply(store: &mut impl TextStore, op: &EditOperation) -> Result<(), ApplyError> {
	if let (EditOperation::Replace {
		from: Some(from),
		to: Some(to),
		..
	}
	| EditOperation::Delete {
		from: Some(from),
		to: Some(to),
		..
	}) = op
		&& to < from
	{
		return Err(ApplyError::InvertedRange {
			from: *from,
			to: *to,
		});
	}

	let edit = to_primitive(op, store.len_chars());
	store.apply(edit.at, &edit.insert, edit.delete);
	Ok(())
}
