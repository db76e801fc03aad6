//! Channels for communicating with a running main loop.

use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::event::AnyEvent;
use crate::protocol::Protocol;

/// Internal events consumed by the main loop.
pub enum MainLoopEvent<P: Protocol> {
	/// Write a message to the peer as-is.
	Outgoing(P::Message),
	/// Write a request to the peer and correlate its eventual response.
	OutgoingRequest(P::Request, oneshot::Sender<P::Response>),
	/// Remove a pending outgoing request from the correlation map.
	///
	/// Any response arriving for the ID afterwards is discarded.
	CancelRequest(P::Id),
	/// Deliver a loopback event to the service's `emit` handler.
	Any(AnyEvent),
}

impl<P: Protocol> std::fmt::Debug for MainLoopEvent<P> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			Self::Outgoing(_) => "Outgoing",
			Self::OutgoingRequest(..) => "OutgoingRequest",
			Self::CancelRequest(_) => "CancelRequest",
			Self::Any(_) => "Any",
		};
		f.write_str(name)
	}
}

/// Handle for sending messages and requests into a main loop.
///
/// Cheap to clone; all clones feed the same loop. Sends fail with
/// [`Error::Stopped`] once the loop has shut down.
pub struct PeerSocket<P: Protocol> {
	pub(crate) tx: mpsc::UnboundedSender<MainLoopEvent<P>>,
}

impl<P: Protocol> Clone for PeerSocket<P> {
	fn clone(&self) -> Self {
		Self {
			tx: self.tx.clone(),
		}
	}
}

impl<P: Protocol> std::fmt::Debug for PeerSocket<P> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PeerSocket").finish_non_exhaustive()
	}
}

impl<P: Protocol> PeerSocket<P> {
	/// Creates a socket with no main loop behind it, exposing the raw event
	/// stream instead.
	///
	/// For tests and embeddings that want to observe what a component sends
	/// without running a full connection.
	#[must_use]
	pub fn channel() -> (Self, mpsc::UnboundedReceiver<MainLoopEvent<P>>) {
		let (tx, rx) = mpsc::unbounded_channel();
		(Self { tx }, rx)
	}

	/// Queues a raw event for the main loop.
	///
	/// # Errors
	///
	/// Returns [`Error::Stopped`] if the main loop is gone.
	pub fn send_event(&self, event: MainLoopEvent<P>) -> Result<()> {
		self.tx.send(event).map_err(|_| Error::Stopped)
	}

	/// Queues a message for transmission to the peer.
	///
	/// # Errors
	///
	/// Returns [`Error::Stopped`] if the main loop is gone.
	pub fn send(&self, msg: P::Message) -> Result<()> {
		self.send_event(MainLoopEvent::Outgoing(msg))
	}

	/// Queues a notification for transmission to the peer.
	///
	/// # Errors
	///
	/// Returns [`Error::Stopped`] if the main loop is gone.
	pub fn notify(&self, notif: P::Notification) -> Result<()> {
		self.send(P::wrap_notification(notif))
	}

	/// Sends a request to the peer and awaits its correlated response.
	///
	/// The main loop assigns a fresh ID unless the request carries one
	/// (see [`Protocol::should_assign_id`]).
	///
	/// # Errors
	///
	/// Returns [`Error::Stopped`] if the loop shuts down, or if the pending
	/// entry is removed (cancelled) before a response arrives.
	pub async fn request(&self, req: P::Request) -> Result<P::Response> {
		let (tx, rx) = oneshot::channel();
		self.send_event(MainLoopEvent::OutgoingRequest(req, tx))?;
		rx.await.map_err(|_| Error::Stopped)
	}

	/// Removes a pending outgoing request, discarding any late response.
	///
	/// # Errors
	///
	/// Returns [`Error::Stopped`] if the main loop is gone.
	pub fn cancel(&self, id: P::Id) -> Result<()> {
		self.send_event(MainLoopEvent::CancelRequest(id))
	}

	/// Delivers a loopback event to the service.
	///
	/// # Errors
	///
	/// Returns [`Error::Stopped`] if the main loop is gone.
	pub fn emit(&self, event: AnyEvent) -> Result<()> {
		self.send_event(MainLoopEvent::Any(event))
	}
}
