//! Line-array document model.
//!
//! Fallback representation used by the view process when no live
//! collaboration session exists: the rendered document as a plain array of
//! lines, edited by splicing whole lines.

/// A document as an array of lines (without terminators).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineDocument {
	lines: Vec<String>,
}

impl LineDocument {
	/// Splits `text` on `\n` into lines.
	#[must_use]
	pub fn from_text(text: &str) -> Self {
		Self {
			lines: text.split('\n').map(str::to_string).collect(),
		}
	}

	/// Joins the lines back into flat text.
	#[must_use]
	pub fn to_text(&self) -> String {
		self.lines.join("\n")
	}

	/// Number of lines.
	#[must_use]
	pub fn len_lines(&self) -> usize {
		self.lines.len()
	}

	/// Borrows the lines.
	#[must_use]
	pub fn lines(&self) -> &[String] {
		&self.lines
	}

	/// Removes `delete_lines` lines at `at`, then inserts `insert` there.
	///
	/// Out-of-range indices clamp to the current bounds.
	pub fn splice(&mut self, at: usize, insert: Vec<String>, delete_lines: usize) {
		let len = self.lines.len();
		let at = at.min(len);
		let end = at.saturating_add(delete_lines).min(len);
		self.lines.splice(at..end, insert);
	}
}
