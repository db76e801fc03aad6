//! IPC service for the view side of the connection.

use std::ops::ControlFlow;
use std::sync::Arc;

use tower_service::Service;
use vellum_proto::{ErrorCode, Event, Request, ResponsePayload, SyncProtocol};
use vellum_rpc::{AnyEvent, RpcService};

use crate::core::ViewCore;

/// Handles inbound frames from the agent.
///
/// The agent never initiates requests; its traffic is responses (correlated
/// by the pump) and events, which this service dispatches into
/// [`ViewCore`].
#[derive(Debug)]
pub struct ViewService {
	core: Arc<ViewCore>,
}

impl ViewService {
	/// Creates the service around the shared view core.
	#[must_use]
	pub fn new(core: Arc<ViewCore>) -> Self {
		Self { core }
	}
}

impl Service<Request> for ViewService {
	type Response = ResponsePayload;
	type Error = ErrorCode;
	type Future = std::future::Ready<Result<Self::Response, Self::Error>>;

	fn poll_ready(
		&mut self,
		_cx: &mut std::task::Context<'_>,
	) -> std::task::Poll<Result<(), Self::Error>> {
		std::task::Poll::Ready(Ok(()))
	}

	fn call(&mut self, req: Request) -> Self::Future {
		tracing::warn!(id = ?req.id, "unexpected request from agent");
		std::future::ready(Err(ErrorCode::UnknownRequest))
	}
}

impl RpcService<SyncProtocol> for ViewService {
	fn notify(&mut self, notif: Event) -> ControlFlow<vellum_rpc::Result<()>> {
		self.core.on_agent_event(notif);
		ControlFlow::Continue(())
	}

	fn emit(&mut self, _event: AnyEvent) -> ControlFlow<vellum_rpc::Result<()>> {
		ControlFlow::Continue(())
	}
}
