//! The generation seam.
//!
//! The language-model call is external to this core: it is any
//! implementation of [`Generator`], injected as `Arc<dyn Generator>` so
//! tests substitute a mock (and production wires the real backend).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use vellum_proto::EditOperation;

/// Document state handed to the generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentContext {
	/// Full document text at command time.
	pub text: String,
	/// Character offset the command was issued at, if any.
	pub cursor: Option<usize>,
}

/// One generation invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
	/// Command tag.
	pub command: String,
	/// The user's request text, verbatim.
	pub original_request: String,
	/// Current document context.
	pub context: DocumentContext,
}

/// Successful generation output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedEdits {
	/// Edit intents against the pre-edit buffer.
	pub operations: Vec<EditOperation>,
	/// Human-readable summary for the UI.
	pub message: String,
}

/// Generation failures.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
	/// The backend call itself failed.
	#[error("generation backend failed: {0}")]
	Backend(String),
	/// The backend answered but the output was unusable.
	#[error("generation produced unusable output: {0}")]
	Unusable(String),
}

/// Incremental output from a streaming generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
	/// Status text ("thinking", "writing section 2", ...).
	Progress(String),
	/// A fragment of generated content.
	Content(String),
	/// A decided operation, described.
	Operation(String),
}

/// External generation function: `generate(request, context) -> operations`.
#[async_trait]
pub trait Generator: Send + Sync {
	/// Produces an edit batch for the request.
	async fn generate(&self, req: GenerateRequest) -> Result<GeneratedEdits, GenerateError>;

	/// Streaming variant: emit chunks while working, then return the final
	/// batch. The default implementation does not stream.
	///
	/// Implementations must send all chunks before returning; the executor
	/// relays every chunk ahead of the terminal result.
	async fn generate_streaming(
		&self,
		req: GenerateRequest,
		chunks: mpsc::UnboundedSender<StreamChunk>,
	) -> Result<GeneratedEdits, GenerateError> {
		drop(chunks);
		self.generate(req).await
	}
}
