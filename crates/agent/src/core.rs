//! Authoritative agent state and the command executor.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use vellum_doc::{DocError, DocumentMap, TextStore, save_document};
use vellum_ops::apply_batch;
use vellum_proto::{
	CommandFailure, CommandOutcome, CommandParams, DocId, Event, IpcFrame, SessionId, SyncProtocol,
};
use vellum_rpc::PeerSocket;

use crate::generate::{
	DocumentContext, GenerateError, GenerateRequest, GeneratedEdits, Generator, StreamChunk,
};

/// Sink for sending frames to a connected view session.
pub type AgentSocket = PeerSocket<SyncProtocol>;

/// Shared state for the agent process.
///
/// Owns the authoritative document registers. Each command runs to
/// completion (apply, persist trigger, reply) before the next command's
/// apply begins; the register is only touched under the document lock, one
/// batch at a time, so a partially-applied batch is never observable.
pub struct AgentCore {
	docs: Mutex<DocumentMap>,
	sessions: Mutex<HashMap<SessionId, AgentSocket>>,
	generator: Arc<dyn Generator>,
}

impl std::fmt::Debug for AgentCore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AgentCore")
			.field("docs", &self.docs)
			.field("generator", &"<dyn Generator>")
			.finish_non_exhaustive()
	}
}

impl AgentCore {
	/// Creates an agent core around a generation backend.
	#[must_use]
	pub fn new(generator: Arc<dyn Generator>) -> Arc<Self> {
		Arc::new(Self {
			docs: Mutex::new(DocumentMap::new()),
			sessions: Mutex::new(HashMap::new()),
			generator,
		})
	}

	/// Binds a document register.
	///
	/// # Errors
	///
	/// [`DocError::AlreadyOpen`] if the key is already bound.
	pub fn open_document(
		&self,
		key: &str,
		initial_text: &str,
		path: Option<PathBuf>,
	) -> Result<DocId, DocError> {
		self.docs.lock().unwrap().open(key, initial_text, path)
	}

	/// Releases a document register.
	///
	/// # Errors
	///
	/// [`DocError::NotFound`] if the key is not bound.
	pub fn close_document(&self, key: &str) -> Result<(), DocError> {
		self.docs.lock().unwrap().close(key).map(drop)
	}

	/// Reads the full content of a document.
	#[must_use]
	pub fn document_content(&self, key: &str) -> Option<String> {
		let docs = self.docs.lock().unwrap();
		docs.get(key).map(|doc| doc.store.read())
	}

	/// Registers a session sink for replication events.
	pub fn register_session(&self, session_id: SessionId, sink: AgentSocket) {
		tracing::info!(?session_id, "session registered");
		self.sessions.lock().unwrap().insert(session_id, sink);
	}

	/// Removes a session sink.
	pub fn unregister_session(&self, session_id: SessionId) {
		if self.sessions.lock().unwrap().remove(&session_id).is_some() {
			tracing::info!(?session_id, "session unregistered");
		}
	}

	/// Executes a command without streaming.
	pub async fn execute(&self, command: &str, params: &CommandParams) -> CommandOutcome {
		let req = match self.build_request(command, params) {
			Ok(req) => req,
			Err(outcome) => return *outcome,
		};
		let generated = self.generator.generate(req).await;
		self.finish(&params.doc, generated).await
	}

	/// Executes a command, relaying streamed chunks through `chunks`.
	///
	/// The sender is handed to the generation call and dropped when it
	/// returns, so the chunk stream always closes before the outcome exists.
	pub async fn execute_streaming(
		&self,
		command: &str,
		params: &CommandParams,
		chunks: mpsc::UnboundedSender<StreamChunk>,
	) -> CommandOutcome {
		let req = match self.build_request(command, params) {
			Ok(req) => req,
			Err(outcome) => return *outcome,
		};
		let generated = self.generator.generate_streaming(req, chunks).await;
		self.finish(&params.doc, generated).await
	}

	fn build_request(
		&self,
		command: &str,
		params: &CommandParams,
	) -> Result<GenerateRequest, Box<CommandOutcome>> {
		let docs = self.docs.lock().unwrap();
		let Some(doc) = docs.get(&params.doc) else {
			return Err(Box::new(CommandOutcome::Failed {
				error: CommandFailure::Apply,
				message: format!("document {:?} is not open", params.doc),
			}));
		};
		Ok(GenerateRequest {
			command: command.to_string(),
			original_request: params.original_request.clone(),
			context: DocumentContext {
				text: doc.store.read(),
				cursor: params.cursor,
			},
		})
	}

	/// Applies a generation result and replicates it, or converts the
	/// failure into a structured outcome.
	async fn finish(
		&self,
		doc_key: &str,
		generated: Result<GeneratedEdits, GenerateError>,
	) -> CommandOutcome {
		let edits = match generated {
			Ok(edits) => edits,
			Err(err) => {
				tracing::warn!(error = %err, doc = doc_key, "generation failed");
				return CommandOutcome::Failed {
					error: CommandFailure::Generation,
					message: err.to_string(),
				};
			}
		};

		// Apply as one batch under the document lock; snapshot what the
		// persist step needs, then release before any await.
		let (operations, persist) = {
			let mut docs = self.docs.lock().unwrap();
			let Some(doc) = docs.get_mut(doc_key) else {
				return CommandOutcome::Failed {
					error: CommandFailure::Apply,
					message: format!("document {doc_key:?} is not open"),
				};
			};
			let outcome = apply_batch(&mut doc.store, edits.operations);
			doc.revision += 1;
			if outcome.skipped > 0 {
				tracing::warn!(
					doc = doc_key,
					skipped = outcome.skipped,
					applied = outcome.applied,
					"operation batch applied with skips"
				);
			}
			let persist = doc.path.clone().map(|path| (path, doc.store.read()));
			(outcome.operations, persist)
		};

		if let Some((path, text)) = persist
			&& let Err(err) = save_document(&path, &text).await
		{
			// Not a command failure: the view's auto-save owns durability
			// and re-arms on the next mutation.
			tracing::warn!(error = %err, path = %path.display(), "agent-side persist failed");
		}

		self.replicate(doc_key, &operations);

		CommandOutcome::Applied {
			operations,
			message: edits.message,
		}
	}

	/// Pushes an applied batch to every attached session.
	fn replicate(&self, doc_key: &str, operations: &[vellum_proto::EditOperation]) {
		let sinks: Vec<(SessionId, AgentSocket)> = {
			let sessions = self.sessions.lock().unwrap();
			sessions.iter().map(|(id, s)| (*id, s.clone())).collect()
		};

		let mut failed = Vec::new();
		for (session_id, sink) in sinks {
			let event = Event::ApplyOperations {
				doc: doc_key.to_string(),
				operations: operations.to_vec(),
			};
			if sink.send(IpcFrame::Event(event)).is_err() {
				failed.push(session_id);
			}
		}

		if !failed.is_empty() {
			let mut sessions = self.sessions.lock().unwrap();
			for session_id in failed {
				tracing::warn!(?session_id, "dropping dead session sink");
				sessions.remove(&session_id);
			}
		}
	}
}
