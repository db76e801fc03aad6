//! The edit-operation data model.
//!
//! Operations are produced by the generation layer against the *pre-edit*
//! buffer and carry rich content trees; the normalizer and apply pipeline in
//! `vellum-ops` turn them into primitive offset edits. All offsets are
//! character offsets.

use serde::{Deserialize, Serialize};

/// A single edit intent.
///
/// Offsets are optional on the wire: a missing `position`/`from` defaults to
/// 0 and a missing `to` defaults to `from + 1`, so a replace or delete
/// always consumes at least one character. Offsets are clamped to the buffer
/// bounds at apply time and never cause a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EditOperation {
	/// Insert rendered content at an absolute offset.
	Insert {
		/// Absolute character offset into the pre-edit buffer.
		position: Option<usize>,
		/// Content to render and insert.
		content: Vec<ContentNode>,
		/// Human-readable description of the edit.
		description: Option<String>,
	},
	/// Replace the half-open range `[from, to)` with rendered content.
	Replace {
		/// Range start.
		from: Option<usize>,
		/// Range end (exclusive).
		to: Option<usize>,
		/// Content to render as the replacement.
		content: Vec<ContentNode>,
		/// Human-readable description of the edit.
		description: Option<String>,
	},
	/// Delete the half-open range `[from, to)`.
	Delete {
		/// Range start.
		from: Option<usize>,
		/// Range end (exclusive).
		to: Option<usize>,
		/// Human-readable description of the edit.
		description: Option<String>,
	},
}

impl EditOperation {
	/// The offset this operation is anchored at, after defaulting.
	///
	/// Inserts anchor at `position`; replaces and deletes at `from`. Missing
	/// offsets default to 0.
	#[must_use]
	pub fn anchor(&self) -> usize {
		match self {
			Self::Insert { position, .. } => position.unwrap_or(0),
			Self::Replace { from, .. } | Self::Delete { from, .. } => from.unwrap_or(0),
		}
	}

	/// The exclusive range end, after defaulting.
	///
	/// Inserts are zero-width, so this equals the anchor. For replaces and
	/// deletes a missing `to` defaults to `from + 1`.
	#[must_use]
	pub fn end(&self) -> usize {
		match self {
			Self::Insert { .. } => self.anchor(),
			Self::Replace { from, to, .. } | Self::Delete { from, to, .. } => {
				to.unwrap_or(from.unwrap_or(0) + 1)
			}
		}
	}

	/// The human-readable description, if any.
	#[must_use]
	pub fn description(&self) -> Option<&str> {
		match self {
			Self::Insert { description, .. }
			| Self::Replace { description, .. }
			| Self::Delete { description, .. } => description.as_deref(),
		}
	}
}

/// A node in a rich content tree.
///
/// Every node reduces to plain markdown text via the recursive fold in
/// `vellum-ops`; this reduction is the serialization contract between the
/// operation representation and the flat text buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentNode {
	/// A literal text run.
	Text {
		/// The text, verbatim.
		text: String,
	},
	/// A paragraph of inline children.
	Paragraph {
		/// Inline children.
		children: Vec<ContentNode>,
	},
	/// A heading of the given level (1–6).
	Heading {
		/// Heading level; clamped to 1–6 when rendering.
		level: u8,
		/// Inline children.
		children: Vec<ContentNode>,
	},
	/// A fenced code block.
	CodeBlock {
		/// Info string after the opening fence.
		language: Option<String>,
		/// The code body.
		children: Vec<ContentNode>,
	},
	/// A fenced diagram block (rendered as a `mermaid` fence).
	Diagram {
		/// The diagram source.
		children: Vec<ContentNode>,
	},
	/// A display math block (`$$` fences).
	MathBlock {
		/// The math source.
		children: Vec<ContentNode>,
	},
}

impl ContentNode {
	/// Convenience constructor for a text run.
	#[must_use]
	pub fn text(text: impl Into<String>) -> Self {
		Self::Text { text: text.into() }
	}

	/// Returns true for nodes that render as standalone blocks.
	#[must_use]
	pub fn is_block(&self) -> bool {
		!matches!(self, Self::Text { .. })
	}
}
