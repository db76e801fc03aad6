//! Line-splice application path.
//!
//! Fallback for the view process when no live collaboration session exists:
//! the same operations, with offsets interpreted as line indices against a
//! [`LineDocument`], spliced as whole lines. Ordering policy is identical to
//! the character path; when operation boundaries align with line boundaries
//! the two paths produce the same final text.

use vellum_doc::LineDocument;
use vellum_proto::EditOperation;

use crate::apply::{ApplyError, BatchOutcome};
use crate::content::render_markdown;
use crate::normalize::normalize;

/// Normalizes a batch and applies it to a line-array document.
///
/// Mirrors [`crate::apply_batch`]: offsets clamp to the current line count,
/// malformed operations are logged and skipped.
pub fn apply_batch_lines(doc: &mut LineDocument, ops: Vec<EditOperation>) -> BatchOutcome {
	let operations = normalize(ops);
	let mut applied = 0;
	let mut skipped = 0;

	for op in &operations {
		match try_apply(doc, op) {
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

fn try_apply(doc: &mut LineDocument, op: &EditOperation) -> Result<(), ApplyError> {
	let len = doc.len_lines();
	match op {
		EditOperation::Insert {
			position, content, ..
		} => {
			let at = position.unwrap_or(0).min(len);
			doc.splice(at, rendered_lines(content), 0);
		}
		EditOperation::Replace { from, to, content, .. } => {
			let (at, delete) = clamped_range(*from, *to, len)?;
			doc.splice(at, rendered_lines(content), delete);
		}
		EditOperation::Delete { from, to, .. } => {
			let (at, delete) = clamped_range(*from, *to, len)?;
			doc.splice(at, Vec::new(), delete);
		}
	}
	Ok(())
}

fn clamped_range(
	from: Option<usize>,
	to: Option<usize>,
	len: usize,
) -> Result<(usize, usize), ApplyError> {
	if let (Some(from), Some(to)) = (from, to)
		&& to < from
	{
		return Err(ApplyError::InvertedRange { from, to });
	}
	let from = from.unwrap_or(0);
	let at = from.min(len);
	let to = to.unwrap_or(from + 1).clamp(at, len);
	Ok((at, to - at))
}

fn rendered_lines(content: &[vellum_proto::ContentNode]) -> Vec<String> {
	render_markdown(content)
		.split('\n')
		.map(str::to_string)
		.collect()
}
