//! The shared text register.

use ropey::Rope;

/// A linearizable, offset-addressed text register.
///
/// All offsets are character offsets. Implementations clamp out-of-range
/// offsets to the current bounds; `apply` never panics on bad positions.
pub trait TextStore {
	/// Returns the full content.
	fn read(&self) -> String;

	/// Returns the length in characters.
	fn len_chars(&self) -> usize;

	/// Deletes `delete_chars` characters at `at`, then inserts `insert` there.
	fn apply(&mut self, at: usize, insert: &str, delete_chars: usize);
}

/// Rope-backed register, the in-process stand-in for the external
/// collaboration register.
#[derive(Debug, Clone, Default)]
pub struct RopeStore {
	rope: Rope,
}

impl RopeStore {
	/// Creates a register holding `text`.
	#[must_use]
	pub fn new(text: &str) -> Self {
		Self {
			rope: Rope::from(text),
		}
	}

	/// Borrows the underlying rope.
	#[must_use]
	pub fn rope(&self) -> &Rope {
		&self.rope
	}
}

impl TextStore for RopeStore {
	fn read(&self) -> String {
		self.rope.to_string()
	}

	fn len_chars(&self) -> usize {
		self.rope.len_chars()
	}

	fn apply(&mut self, at: usize, insert: &str, delete_chars: usize) {
		let len = self.rope.len_chars();
		let at = at.min(len);
		let end = at.saturating_add(delete_chars).min(len);
		if end > at {
			self.rope.remove(at..end);
		}
		if !insert.is_empty() {
			self.rope.insert(at, insert);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn apply_inserts_and_deletes() {
		let mut store = RopeStore::new("hello world");
		store.apply(5, ",", 0);
		assert_eq!(store.read(), "hello, world");
		store.apply(5, "", 1);
		assert_eq!(store.read(), "hello world");
		store.apply(6, "there and ", 0);
		assert_eq!(store.read(), "hello there and world");
	}

	#[test]
	fn apply_replaces_in_one_call() {
		let mut store = RopeStore::new("hello world");
		store.apply(6, "earth", 5);
		assert_eq!(store.read(), "hello earth");
	}

	#[test]
	fn out_of_range_offsets_clamp() {
		let mut store = RopeStore::new("abc");
		store.apply(100, "!", 0);
		assert_eq!(store.read(), "abc!");
		store.apply(2, "", 100);
		assert_eq!(store.read(), "ab");
		store.apply(0, "x", usize::MAX);
		assert_eq!(store.read(), "x");
	}

	#[test]
	fn unicode_offsets_are_characters() {
		let mut store = RopeStore::new("héllo 🦀");
		store.apply(6, "crab ", 0);
		assert_eq!(store.read(), "héllo crab 🦀");
		assert_eq!(store.len_chars(), 12);
	}
}
