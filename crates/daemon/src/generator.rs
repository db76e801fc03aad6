//! Process-backed generation backend.
//!
//! The generation call is external to the core; in production `vellumd`
//! shells out to a configured command. The command receives the
//! [`GenerateRequest`] as JSON on stdin and must print a
//! [`GeneratedEdits`] JSON object on stdout.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use vellum_agent::{GenerateError, GenerateRequest, GeneratedEdits, Generator};

/// Runs an external command per generation call.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
	command: String,
	args: Vec<String>,
}

impl CommandGenerator {
	/// Creates a generator around `command` and its arguments.
	#[must_use]
	pub fn new(command: String, args: Vec<String>) -> Self {
		Self { command, args }
	}
}

#[async_trait]
impl Generator for CommandGenerator {
	async fn generate(&self, req: GenerateRequest) -> Result<GeneratedEdits, GenerateError> {
		let input =
			serde_json::to_vec(&req).map_err(|e| GenerateError::Backend(e.to_string()))?;

		let mut child = tokio::process::Command::new(&self.command)
			.args(&self.args)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::inherit())
			.spawn()
			.map_err(|e| GenerateError::Backend(format!("spawn {}: {e}", self.command)))?;

		if let Some(mut stdin) = child.stdin.take() {
			stdin
				.write_all(&input)
				.await
				.map_err(|e| GenerateError::Backend(e.to_string()))?;
		}

		let output = child
			.wait_with_output()
			.await
			.map_err(|e| GenerateError::Backend(e.to_string()))?;

		if !output.status.success() {
			return Err(GenerateError::Backend(format!(
				"{} exited with {}",
				self.command, output.status
			)));
		}

		serde_json::from_slice(&output.stdout)
			.map_err(|e| GenerateError::Unusable(e.to_string()))
	}
}
