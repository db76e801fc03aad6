//! Shared view-process state: replica document, observer notifications, and
//! debounced persistence.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use vellum_doc::{DocError, DocumentMap, TextStore, save_document};
use vellum_ops::apply_batch;
use vellum_proto::{
	BroadcastEvent, CommandOutcome, CommandParams, DocId, EditOperation, Event, NotificationLevel,
};

use crate::broadcast::{BroadcastChannel, Subscription};
use crate::config::SyncConfig;
use crate::router::CommandRouter;

/// Debounce state for one document.
///
/// `generation` is bumped on every mutation; a sleeper that wakes up to a
/// stale generation does nothing, which coalesces bursts into one write.
/// `writing` gates the single in-flight persistence write.
#[derive(Debug, Default, Clone, Copy)]
struct AutoSaveState {
	generation: u64,
	writing: bool,
}

/// Shared state for the view process.
pub struct ViewCore {
	docs: Mutex<DocumentMap>,
	autosave: Mutex<std::collections::HashMap<String, AutoSaveState>>,
	broadcast: BroadcastChannel,
	config: SyncConfig,
}

impl std::fmt::Debug for ViewCore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ViewCore")
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

impl ViewCore {
	/// Creates a view core.
	#[must_use]
	pub fn new(config: SyncConfig) -> Arc<Self> {
		Arc::new(Self {
			docs: Mutex::new(DocumentMap::new()),
			autosave: Mutex::new(std::collections::HashMap::new()),
			broadcast: BroadcastChannel::new(),
			config,
		})
	}

	/// Binds a replica register for `key`.
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

	/// Releases the replica for `key` and clears its auto-save state.
	///
	/// # Errors
	///
	/// [`DocError::NotFound`] if the key is not bound.
	pub fn close_document(&self, key: &str) -> Result<(), DocError> {
		self.docs.lock().unwrap().close(key)?;
		self.autosave.lock().unwrap().remove(key);
		Ok(())
	}

	/// Reads the replica content.
	#[must_use]
	pub fn document_content(&self, key: &str) -> Option<String> {
		let docs = self.docs.lock().unwrap();
		docs.get(key).map(|doc| doc.store.read())
	}

	/// Registers a new observer.
	pub fn subscribe(&self) -> Subscription {
		self.broadcast.subscribe()
	}

	/// The observer fan-out channel.
	#[must_use]
	pub fn broadcast(&self) -> &BroadcastChannel {
		&self.broadcast
	}

	/// Routes one UI command through `router` and publishes its observer
	/// events: a terminal `complete` or `error`, the final operation batch,
	/// and a notification for failures.
	pub async fn run_command(
		self: &Arc<Self>,
		router: &CommandRouter,
		command: &str,
		doc: &str,
		original_request: &str,
		cursor: Option<usize>,
	) -> CommandOutcome {
		let params = CommandParams {
			doc: doc.to_string(),
			original_request: original_request.to_string(),
			cursor,
		};
		let routed = router.route(command, params).await;

		match &routed.outcome {
			CommandOutcome::Applied {
				operations,
				message,
			} => {
				self.broadcast.publish(&BroadcastEvent::LlmOperations {
					doc: doc.to_string(),
					operations: operations.clone(),
					message: message.clone(),
				});
				self.broadcast.publish(&BroadcastEvent::Complete {
					request_id: routed.request_id.0,
					message: message.clone(),
				});
			}
			CommandOutcome::Failed { message, .. } => {
				self.broadcast.publish(&BroadcastEvent::Error {
					request_id: Some(routed.request_id.0),
					message: message.clone(),
				});
				self.broadcast.publish(&BroadcastEvent::Notification {
					level: NotificationLevel::Error,
					message: message.clone(),
				});
			}
		}

		routed.outcome
	}

	/// Applies a replicated operation batch to the replica as one atomic
	/// batch, notifies observers, and arms the auto-save debounce.
	pub fn on_apply_operations(self: &Arc<Self>, key: &str, operations: Vec<EditOperation>) {
		let (applied, revision) = {
			let mut docs = self.docs.lock().unwrap();
			let Some(doc) = docs.get_mut(key) else {
				tracing::warn!(doc = key, "replicated batch for unknown document");
				return;
			};
			let outcome = apply_batch(&mut doc.store, operations);
			doc.revision += 1;
			(outcome.operations, doc.revision)
		};

		self.broadcast.publish(&BroadcastEvent::OperationsApplied {
			doc: key.to_string(),
			operations: applied,
			revision,
		});
		self.schedule_autosave(key);
	}

	/// Dispatches an inbound agent event.
	pub fn on_agent_event(self: &Arc<Self>, event: Event) {
		match event {
			Event::ApplyOperations { doc, operations } => {
				self.on_apply_operations(&doc, operations);
			}
			Event::CommandStarted {
				request_id,
				command,
			} => {
				self.broadcast.publish(&BroadcastEvent::Start {
					request_id: request_id.0,
					command,
				});
			}
			Event::CommandProgress { request_id, status } => {
				self.broadcast.publish(&BroadcastEvent::Typing {
					request_id: request_id.0,
					status,
				});
			}
			Event::CommandContent { request_id, delta } => {
				self.broadcast.publish(&BroadcastEvent::Content {
					request_id: request_id.0,
					delta,
				});
			}
			Event::CommandOperation {
				request_id,
				description,
			} => {
				self.broadcast.publish(&BroadcastEvent::Operation {
					request_id: request_id.0,
					description,
				});
			}
		}
	}

	/// Arms (or re-arms) the debounced save for `key`.
	///
	/// Every call invalidates earlier sleepers by bumping the generation;
	/// exactly one write happens per quiescent period.
	pub fn schedule_autosave(self: &Arc<Self>, key: &str) {
		let generation = {
			let mut autosave = self.autosave.lock().unwrap();
			let state = autosave.entry(key.to_string()).or_default();
			state.generation += 1;
			state.generation
		};
		self.spawn_save_timer(key.to_string(), generation);
	}

	fn spawn_save_timer(self: &Arc<Self>, key: String, generation: u64) {
		let core = self.clone();
		let debounce = self.config.autosave_debounce;
		tokio::spawn(async move {
			tokio::time::sleep(debounce).await;
			core.autosave_fire(&key, generation).await;
		});
	}

	/// Runs when a debounce timer fires; stale generations are no-ops.
	async fn autosave_fire(self: &Arc<Self>, key: &str, generation: u64) {
		let rearm = {
			let mut autosave = self.autosave.lock().unwrap();
			let Some(state) = autosave.get_mut(key) else {
				return;
			};
			if state.generation != generation {
				return;
			}
			if state.writing {
				true
			} else {
				state.writing = true;
				false
			}
		};
		if rearm {
			// A write is in flight; try again after it would have settled
			// rather than queueing a second write.
			self.spawn_save_timer(key.to_string(), generation);
			return;
		}

		let snapshot = {
			let docs = self.docs.lock().unwrap();
			docs.get(key)
				.and_then(|doc| doc.path.clone().map(|path| (path, doc.store.read())))
		};

		let result = match &snapshot {
			Some((path, text)) => Some(save_document(path, text).await),
			// Memory-only documents have nothing durable to write.
			None => None,
		};

		if let Some(state) = self.autosave.lock().unwrap().get_mut(key) {
			state.writing = false;
		}

		match result {
			Some(Ok(bytes)) => {
				self.broadcast.publish(&BroadcastEvent::AutoSave {
					doc: key.to_string(),
					bytes,
				});
			}
			Some(Err(err)) => {
				tracing::warn!(doc = key, error = %err, "auto-save failed");
				self.broadcast.publish(&BroadcastEvent::AutoSaveError {
					doc: key.to_string(),
					message: err.to_string(),
				});
				self.broadcast.publish(&BroadcastEvent::Notification {
					level: NotificationLevel::Warning,
					message: format!("auto-save failed for {key:?}: {err}"),
				});
			}
			None => {}
		}
	}
}
