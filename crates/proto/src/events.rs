//! Subscriber-facing broadcast events.
//!
//! These are pushed from the view process to every live observer as one JSON
//! object per event, internally tagged with a `type` field. The stream is
//! best-effort: late subscribers missed earlier events and reconcile by
//! re-fetching document content.

use serde::{Deserialize, Serialize};

use crate::ops::EditOperation;

/// Severity of a [`BroadcastEvent::Notification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
	/// Informational.
	Info,
	/// Something degraded but recoverable.
	Warning,
	/// A command or subsystem failed.
	Error,
}

/// One event on the observer stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BroadcastEvent {
	/// The document was persisted after a quiet period.
	AutoSave {
		/// Document key.
		doc: String,
		/// Bytes written.
		bytes: u64,
	},
	/// Persisting the document failed; the next mutation re-arms the save.
	AutoSaveError {
		/// Document key.
		doc: String,
		/// Human-readable failure description.
		message: String,
	},
	/// A human-readable notice for the UI.
	Notification {
		/// Severity.
		level: NotificationLevel,
		/// The notice text.
		message: String,
	},
	/// An operation batch was applied to the document.
	OperationsApplied {
		/// Document key.
		doc: String,
		/// The applied batch, in applied order.
		operations: Vec<EditOperation>,
		/// Monotonic per-document mutation counter.
		revision: u64,
	},
	/// A command produced its final operation batch.
	LlmOperations {
		/// Document key.
		doc: String,
		/// The batch produced by the generation call.
		operations: Vec<EditOperation>,
		/// Summary message from the command result.
		message: String,
	},
	/// A streamed command started.
	Start {
		/// The command's request ID.
		request_id: u64,
		/// Command tag.
		command: String,
	},
	/// A streamed command is producing output.
	Typing {
		/// The command's request ID.
		request_id: u64,
		/// Progress status text.
		status: String,
	},
	/// Incremental content from a streamed command.
	Content {
		/// The command's request ID.
		request_id: u64,
		/// The text delta.
		delta: String,
	},
	/// One operation of a streamed command was described.
	Operation {
		/// The command's request ID.
		request_id: u64,
		/// Operation description.
		description: String,
	},
	/// Terminal success event for a streamed command.
	Complete {
		/// The command's request ID.
		request_id: u64,
		/// Summary message.
		message: String,
	},
	/// Terminal failure event for a streamed command, or a channel-level
	/// error with no associated command.
	Error {
		/// The command's request ID, when the error belongs to one.
		request_id: Option<u64>,
		/// Human-readable failure description.
		message: String,
	},
}
