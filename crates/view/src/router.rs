//! Command routing with cross-process correlation.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::timeout;
use vellum_proto::{
	CommandFailure, CommandOutcome, CommandParams, Request, RequestId, RequestPayload, Response,
	ResponsePayload, SessionId, SyncProtocol, timestamp_ms,
};
use vellum_rpc::{CounterIdGen, PeerSocket};

/// Socket to the agent-side connection.
pub type AgentSocket = PeerSocket<SyncProtocol>;

/// A routed command and the ID its reply was correlated under.
#[derive(Debug, Clone)]
pub struct RoutedCommand {
	/// The request ID assigned by this router.
	pub request_id: RequestId,
	/// The command-level outcome.
	pub outcome: CommandOutcome,
}

/// Routes UI-originated commands to the agent and correlates replies.
///
/// One instance per view-process connection, passed by reference to
/// whatever issues commands; there is no global routing table. The router
/// pre-assigns monotonically increasing request IDs from its own counter;
/// uniqueness within the process lifetime is all correlation needs.
#[derive(Debug)]
pub struct CommandRouter {
	socket: AgentSocket,
	ids: Mutex<CounterIdGen>,
	timeout: Duration,
}

impl CommandRouter {
	/// Creates a router over the agent socket.
	#[must_use]
	pub fn new(socket: AgentSocket, timeout: Duration) -> Self {
		Self {
			socket,
			ids: Mutex::new(CounterIdGen::new()),
			timeout,
		}
	}

	fn next_id(&self) -> RequestId {
		RequestId(self.ids.lock().unwrap().next())
	}

	/// Sends a request and awaits its correlated reply under the command
	/// timeout.
	///
	/// On timeout the pending entry is cancelled, so a late reply for the
	/// ID is discarded by the pump rather than resolved twice.
	async fn send_request(&self, id: RequestId, payload: RequestPayload) -> Result<Response, CommandOutcome> {
		let req = Request { id, payload };
		match timeout(self.timeout, self.socket.request(req)).await {
			Ok(Ok(resp)) => Ok(resp),
			Ok(Err(err)) => {
				tracing::warn!(?id, error = %err, "agent connection lost mid-command");
				Err(CommandOutcome::Failed {
					error: CommandFailure::Transport,
					message: "agent connection closed".to_string(),
				})
			}
			Err(_) => {
				let _ = self.socket.cancel(id);
				tracing::warn!(?id, timeout = ?self.timeout, "command timed out");
				Err(CommandOutcome::Failed {
					error: CommandFailure::Timeout,
					message: format!("no reply from agent within {:?}", self.timeout),
				})
			}
		}
	}

	/// Routes one UI command: assign an ID, send, await the correlated
	/// reply, convert every failure into a command-level outcome.
	pub async fn route(&self, command: &str, params: CommandParams) -> RoutedCommand {
		let request_id = self.next_id();
		let payload = RequestPayload::UiCommand {
			command: command.to_string(),
			params,
			timestamp_ms: timestamp_ms(),
		};

		let outcome = match self.send_request(request_id, payload).await {
			Err(outcome) => outcome,
			Ok(resp) => match (resp.payload, resp.error) {
				(Some(ResponsePayload::CommandResult(outcome)), _) => outcome,
				(_, Some(code)) => CommandOutcome::Failed {
					error: CommandFailure::Transport,
					message: format!("agent rejected command: {code:?}"),
				},
				(payload, None) => CommandOutcome::Failed {
					error: CommandFailure::Transport,
					message: format!("malformed agent reply: {payload:?}"),
				},
			},
		};

		RoutedCommand {
			request_id,
			outcome,
		}
	}

	/// Registers this session with the agent.
	///
	/// Returns false when the agent rejected or never answered.
	pub async fn subscribe(&self, session_id: SessionId) -> bool {
		let id = self.next_id();
		matches!(
			self.send_request(id, RequestPayload::Subscribe { session_id }).await,
			Ok(Response {
				payload: Some(ResponsePayload::Subscribed),
				..
			})
		)
	}

	/// Pulls the full content of a document from the agent.
	///
	/// Used by observers reconciling after a missed event window.
	pub async fn pull_content(&self, doc: &str) -> Option<String> {
		let id = self.next_id();
		let payload = RequestPayload::GetDocumentContent {
			doc: doc.to_string(),
		};
		match self.send_request(id, payload).await {
			Ok(Response {
				payload: Some(ResponsePayload::DocumentContent { content, .. }),
				..
			}) => Some(content),
			Ok(resp) => {
				tracing::warn!(?id, error = ?resp.error, "content pull rejected");
				None
			}
			Err(_) => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use vellum_rpc::MainLoopEvent;

	use super::*;

	fn params() -> CommandParams {
		CommandParams {
			doc: "notes".into(),
			original_request: "expand".into(),
			cursor: None,
		}
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn timeout_rejects_and_cancels_pending() {
		let (socket, mut rx) = AgentSocket::channel();
		let router = CommandRouter::new(socket, Duration::from_secs(30));

		// No pump behind the socket, so no reply ever arrives; paused time
		// fast-forwards straight to the timeout.
		let routed = router.route("continue", params()).await;
		let CommandOutcome::Failed { error, .. } = routed.outcome else {
			panic!("expected failure outcome");
		};
		assert_eq!(error, CommandFailure::Timeout);

		// The request went out, then its pending entry was cancelled.
		let Some(MainLoopEvent::OutgoingRequest(req, _)) = rx.recv().await else {
			panic!("expected outgoing request");
		};
		assert_eq!(req.id, routed.request_id);
		let Some(MainLoopEvent::CancelRequest(cancelled)) = rx.recv().await else {
			panic!("expected cancel");
		};
		assert_eq!(cancelled, routed.request_id);
	}

	#[tokio::test(flavor = "current_thread")]
	async fn closed_transport_is_a_command_failure() {
		let (socket, rx) = AgentSocket::channel();
		drop(rx);
		let router = CommandRouter::new(socket, Duration::from_secs(30));

		let routed = router.route("continue", params()).await;
		let CommandOutcome::Failed { error, .. } = routed.outcome else {
			panic!("expected failure outcome");
		};
		assert_eq!(error, CommandFailure::Transport);
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn ids_are_monotonic_and_unique() {
		let (socket, mut rx) = AgentSocket::channel();
		let router = CommandRouter::new(socket, Duration::from_millis(1));

		let first = router.route("a", params()).await;
		let second = router.route("b", params()).await;
		assert_ne!(first.request_id, second.request_id);
		assert!(first.request_id.0 < second.request_id.0);
		assert_ne!(first.request_id, RequestId::UNASSIGNED);

		// Pre-assigned IDs: the pump must not reassign them.
		let Some(MainLoopEvent::OutgoingRequest(req, _)) = rx.recv().await else {
			panic!("expected outgoing request");
		};
		assert!(!<SyncProtocol as vellum_rpc::Protocol>::should_assign_id(&req));
	}
}
