//! Wire types for the vellum IPC protocol.
//!
//! This module defines the frame union and payloads exchanged between the
//! view process (command routing, subscribers, persistence) and the agent
//! process (generation, authoritative document state).

use serde::{Deserialize, Serialize};

use crate::ops::EditOperation;

/// Unique identifier for requests and responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl RequestId {
	/// Sentinel for requests that have not been assigned an ID yet.
	///
	/// The main loop assigns a fresh nonzero ID to such requests; callers
	/// that correlate replies themselves pre-assign a nonzero ID instead.
	pub const UNASSIGNED: Self = Self(0);
}

/// Unique identifier for view sessions (connections to the agent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

/// Unique identifier for documents within one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(pub u64);

/// A single IPC frame between view and agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IpcFrame {
	/// A request expecting a correlated response.
	Request(Request),
	/// A response to an earlier request.
	Response(Response),
	/// An async event (no response expected).
	Event(Event),
}

/// A request expecting a correlated response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
	/// Unique identifier for this request.
	pub id: RequestId,
	/// The request payload.
	pub payload: RequestPayload,
}

impl Request {
	/// Wraps a payload in a new, not-yet-assigned request.
	#[must_use]
	pub fn new(payload: RequestPayload) -> Self {
		Self {
			id: RequestId::UNASSIGNED,
			payload,
		}
	}
}

/// Request payload variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RequestPayload {
	/// Connectivity check.
	Ping,
	/// Register the session for event routing.
	Subscribe {
		/// Session ID for this connection.
		session_id: SessionId,
	},
	/// A UI-originated command for the agent to execute.
	UiCommand {
		/// Command tag (e.g. `"continue"`, `"rewrite"`).
		command: String,
		/// Command parameters.
		params: CommandParams,
		/// Milliseconds since the Unix epoch at routing time.
		timestamp_ms: u64,
	},
	/// Pull the full current content of a document.
	GetDocumentContent {
		/// Document key.
		doc: String,
	},
}

/// Parameters carried by a [`RequestPayload::UiCommand`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandParams {
	/// Document key the command targets.
	pub doc: String,
	/// The user's request text, verbatim.
	pub original_request: String,
	/// Character offset the command was issued at, if any.
	pub cursor: Option<usize>,
}

/// A response to an earlier request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
	/// The request this responds to.
	pub request_id: RequestId,
	/// The response payload when the request was handled.
	pub payload: Option<ResponsePayload>,
	/// The error code when the request was rejected at the protocol level.
	pub error: Option<ErrorCode>,
}

/// Response payload variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponsePayload {
	/// Reply to [`RequestPayload::Ping`].
	Pong,
	/// Subscription acknowledged.
	Subscribed,
	/// Outcome of a [`RequestPayload::UiCommand`].
	CommandResult(CommandOutcome),
	/// Full document content.
	DocumentContent {
		/// The document text.
		content: String,
		/// Milliseconds since the Unix epoch at read time.
		timestamp_ms: u64,
	},
}

/// Command-level outcome of executing a UI command.
///
/// Both arms are ordinary results: failures are data, never errors thrown
/// across the process boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CommandOutcome {
	/// The command ran and its operation batch was applied.
	Applied {
		/// The normalized operations that were applied.
		operations: Vec<EditOperation>,
		/// Human-readable summary for the UI.
		message: String,
	},
	/// The command failed before or during apply.
	Failed {
		/// Failure classification.
		error: CommandFailure,
		/// Human-readable explanation for the UI.
		message: String,
	},
}

impl CommandOutcome {
	/// Returns true for the applied arm.
	#[must_use]
	pub fn success(&self) -> bool {
		matches!(self, Self::Applied { .. })
	}
}

/// Classification of command-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandFailure {
	/// The generation call failed or returned unusable output.
	Generation,
	/// The operation batch could not be applied.
	Apply,
	/// No reply arrived within the command timeout.
	Timeout,
	/// The transport to the agent is gone.
	Transport,
}

/// Error codes for protocol-level rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
	/// Generic internal error.
	Internal,
	/// Unknown request type.
	UnknownRequest,
	/// Invalid arguments.
	InvalidArgs,
	/// No document bound for the given key.
	DocNotFound,
	/// The connection has not subscribed yet.
	NotSubscribed,
}

/// Async event frames (no response expected).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
	/// Replicate an applied operation batch from agent to view.
	///
	/// This is the replication edge of the shared text register: the view
	/// applies the batch to its replica in the given (already normalized)
	/// order, as one atomic batch.
	ApplyOperations {
		/// Document key.
		doc: String,
		/// The normalized operation batch.
		operations: Vec<EditOperation>,
	},
	/// A streamed command started executing.
	CommandStarted {
		/// The command's request ID.
		request_id: RequestId,
		/// Command tag.
		command: String,
	},
	/// Progress status for a streamed command.
	CommandProgress {
		/// The command's request ID.
		request_id: RequestId,
		/// Human-readable status.
		status: String,
	},
	/// Incremental content produced by a streamed command.
	CommandContent {
		/// The command's request ID.
		request_id: RequestId,
		/// The text delta.
		delta: String,
	},
	/// One operation of a streamed command was decided.
	CommandOperation {
		/// The command's request ID.
		request_id: RequestId,
		/// Operation description.
		description: String,
	},
}

/// Milliseconds since the Unix epoch, for wire timestamps.
#[must_use]
pub fn timestamp_ms() -> u64 {
	std::time::SystemTime::now()
		.duration_since(std::time::SystemTime::UNIX_EPOCH)
		.map_or(0, |d| d.as_millis() as u64)
}
