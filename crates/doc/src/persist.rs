//! Durable storage for documents.
//!
//! One flat text file per document; the filename stem is the document
//! identity. Writes go through a sibling temp file and a rename so a crashed
//! write never leaves a truncated document behind.

use std::path::Path;

/// Atomically writes `text` to `path`, returning the byte count written.
///
/// # Errors
///
/// Any IO error from writing the temp file or renaming it into place.
pub async fn save_document(path: &Path, text: &str) -> std::io::Result<u64> {
	let mut tmp = path.as_os_str().to_os_string();
	tmp.push(".tmp");
	tokio::fs::write(&tmp, text).await?;
	tokio::fs::rename(&tmp, path).await?;
	Ok(text.len() as u64)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test(flavor = "current_thread")]
	async fn writes_and_overwrites() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("notes.md");

		let n = save_document(&path, "first").await.unwrap();
		assert_eq!(n, 5);
		assert_eq!(std::fs::read_to_string(&path).unwrap(), "first");

		save_document(&path, "second").await.unwrap();
		assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");

		// No temp file left behind.
		let entries: Vec<_> = std::fs::read_dir(dir.path())
			.unwrap()
			.map(|e| e.unwrap().file_name())
			.collect();
		assert_eq!(entries, vec![std::ffi::OsString::from("notes.md")]);
	}

	#[tokio::test(flavor = "current_thread")]
	async fn missing_parent_directory_errors() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("missing").join("notes.md");
		assert!(save_document(&path, "text").await.is_err());
	}
}
