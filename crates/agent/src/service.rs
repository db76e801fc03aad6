//! IPC service for the agent side of the connection.

use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tower_service::Service;
use vellum_proto::{
	ErrorCode, Event, Request, RequestId, RequestPayload, ResponsePayload, SessionId, SyncProtocol,
	timestamp_ms,
};
use vellum_rpc::{AnyEvent, RpcService};

use crate::core::{AgentCore, AgentSocket};
use crate::generate::StreamChunk;

/// Request handlers for one view connection.
///
/// Each IPC connection to the agent is handled by an instance of this
/// service; shared state lives in [`AgentCore`]. Subscription establishes
/// the session identity; dropping the service (connection closed) cleans it
/// up.
pub struct AgentService {
	/// Shared agent core.
	core: Arc<AgentCore>,
	/// Event sink for this connection.
	socket: AgentSocket,
	/// Session ID for this connection (once subscribed).
	session_id: Option<SessionId>,
}

impl std::fmt::Debug for AgentService {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AgentService")
			.field("session_id", &self.session_id)
			.finish_non_exhaustive()
	}
}

impl AgentService {
	/// Creates a service for one connection.
	#[must_use]
	pub fn new(core: Arc<AgentCore>, socket: AgentSocket) -> Self {
		Self {
			core,
			socket,
			session_id: None,
		}
	}
}

impl Drop for AgentService {
	/// Authoritatively cleans up the session when the connection drops.
	fn drop(&mut self) {
		if let Some(session_id) = self.session_id {
			self.core.unregister_session(session_id);
		}
	}
}

impl Service<Request> for AgentService {
	type Response = ResponsePayload;
	type Error = ErrorCode;
	type Future = Pin<
		Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
	>;

	fn poll_ready(
		&mut self,
		_cx: &mut std::task::Context<'_>,
	) -> std::task::Poll<Result<(), Self::Error>> {
		std::task::Poll::Ready(Ok(()))
	}

	/// Handles an incoming request from a view session.
	fn call(&mut self, req: Request) -> Self::Future {
		let core = self.core.clone();
		let socket = self.socket.clone();

		if let RequestPayload::Subscribe { session_id } = req.payload {
			self.session_id = Some(session_id);
			core.register_session(session_id, socket.clone());
		}
		let session_id = self.session_id;

		Box::pin(async move {
			match req.payload {
				RequestPayload::Ping => Ok(ResponsePayload::Pong),
				RequestPayload::Subscribe { .. } => Ok(ResponsePayload::Subscribed),
				RequestPayload::UiCommand {
					command, params, ..
				} => {
					if session_id.is_none() {
						return Err(ErrorCode::NotSubscribed);
					}
					let request_id = req.id;
					let _ = socket.notify(Event::CommandStarted {
						request_id,
						command: command.clone(),
					});

					let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
					let relay = tokio::spawn(relay_chunks(socket.clone(), request_id, chunk_rx));
					let outcome = core.execute_streaming(&command, &params, chunk_tx).await;
					// All chunks are on the socket before the terminal result
					// leaves this handler.
					let _ = relay.await;

					Ok(ResponsePayload::CommandResult(outcome))
				}
				RequestPayload::GetDocumentContent { doc } => core
					.document_content(&doc)
					.map(|content| ResponsePayload::DocumentContent {
						content,
						timestamp_ms: timestamp_ms(),
					})
					.ok_or(ErrorCode::DocNotFound),
			}
		})
	}
}

impl RpcService<SyncProtocol> for AgentService {
	fn notify(&mut self, notif: Event) -> ControlFlow<vellum_rpc::Result<()>> {
		tracing::debug!(?notif, "ignoring event from view");
		ControlFlow::Continue(())
	}

	fn emit(&mut self, _event: AnyEvent) -> ControlFlow<vellum_rpc::Result<()>> {
		ControlFlow::Continue(())
	}
}

/// Forwards streamed chunks as events on the connection socket.
async fn relay_chunks(
	socket: AgentSocket,
	request_id: RequestId,
	mut chunks: mpsc::UnboundedReceiver<StreamChunk>,
) {
	while let Some(chunk) = chunks.recv().await {
		let event = match chunk {
			StreamChunk::Progress(status) => Event::CommandProgress { request_id, status },
			StreamChunk::Content(delta) => Event::CommandContent { request_id, delta },
			StreamChunk::Operation(description) => Event::CommandOperation {
				request_id,
				description,
			},
		};
		if socket.notify(event).is_err() {
			break;
		}
	}
}
