//! Per-process document registry.

use std::collections::HashMap;
use std::path::PathBuf;

use vellum_proto::DocId;

use crate::store::RopeStore;

/// Errors from document lifecycle operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DocError {
	/// The key already has an active register binding in this process.
	#[error("document {0:?} is already open")]
	AlreadyOpen(String),
	/// No register is bound for the key.
	#[error("document {0:?} is not open")]
	NotFound(String),
}

/// One editing-session document: a stable key, its register binding, and an
/// optional backing file (absent in memory-only mode).
#[derive(Debug)]
pub struct Document {
	/// Process-local identifier.
	pub id: DocId,
	/// Stable document identity (the collaboration room key and, when a path
	/// is bound, the filename stem).
	pub key: String,
	/// The register binding.
	pub store: RopeStore,
	/// Backing file for persistence.
	pub path: Option<PathBuf>,
	/// Monotonic mutation counter.
	pub revision: u64,
}

/// Registry of open documents.
///
/// At most one active register binding exists per key per process; switching
/// documents is a close followed by an open.
#[derive(Debug, Default)]
pub struct DocumentMap {
	docs: HashMap<String, Document>,
	next_id: u64,
}

impl DocumentMap {
	/// Creates an empty registry.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Binds a register for `key` with the given initial content.
	///
	/// # Errors
	///
	/// [`DocError::AlreadyOpen`] if the key is already bound.
	pub fn open(
		&mut self,
		key: &str,
		initial_text: &str,
		path: Option<PathBuf>,
	) -> Result<DocId, DocError> {
		if self.docs.contains_key(key) {
			return Err(DocError::AlreadyOpen(key.to_string()));
		}
		let id = DocId(self.next_id);
		self.next_id += 1;
		self.docs.insert(
			key.to_string(),
			Document {
				id,
				key: key.to_string(),
				store: RopeStore::new(initial_text),
				path,
				revision: 0,
			},
		);
		Ok(id)
	}

	/// Releases the binding for `key`.
	///
	/// # Errors
	///
	/// [`DocError::NotFound`] if the key is not bound.
	pub fn close(&mut self, key: &str) -> Result<Document, DocError> {
		self.docs
			.remove(key)
			.ok_or_else(|| DocError::NotFound(key.to_string()))
	}

	/// Looks up an open document.
	#[must_use]
	pub fn get(&self, key: &str) -> Option<&Document> {
		self.docs.get(key)
	}

	/// Looks up an open document mutably.
	#[must_use]
	pub fn get_mut(&mut self, key: &str) -> Option<&mut Document> {
		self.docs.get_mut(key)
	}

	/// Returns true if no documents are bound.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.docs.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::TextStore;

	#[test]
	fn one_binding_per_key() {
		let mut docs = DocumentMap::new();
		docs.open("notes", "hello", None).unwrap();
		let err = docs.open("notes", "other", None).unwrap_err();
		assert_eq!(err, DocError::AlreadyOpen("notes".to_string()));
		// The original binding is untouched.
		assert_eq!(docs.get("notes").unwrap().store.read(), "hello");
	}

	#[test]
	fn switch_is_close_then_open() {
		let mut docs = DocumentMap::new();
		let first = docs.open("a", "", None).unwrap();
		docs.close("a").unwrap();
		let second = docs.open("a", "fresh", None).unwrap();
		assert_ne!(first, second);
		assert_eq!(docs.get("a").unwrap().store.read(), "fresh");
	}

	#[test]
	fn close_unknown_key_errors() {
		let mut docs = DocumentMap::new();
		assert_eq!(
			docs.close("ghost").unwrap_err(),
			DocError::NotFound("ghost".to_string())
		);
	}
}
