//! Protocol abstraction for wire formats and message semantics.

use std::hash::Hash;
use std::io::ErrorKind;

use tokio::io::{AsyncBufRead, AsyncWrite};

use crate::error::{Error, Result};

/// Simple counter-based ID generator for protocols.
///
/// Counts from 1 upward; 0 is conventionally reserved as the "unassigned"
/// sentinel so protocols can recognize requests that carry a caller-chosen ID.
#[derive(Debug, Clone, Copy)]
pub struct CounterIdGen(pub u64);

impl CounterIdGen {
	/// Creates a new counter whose first generated ID is 1.
	#[must_use]
	pub const fn new() -> Self {
		Self(1)
	}

	/// Generates the next unique ID and increments the counter.
	#[allow(clippy::should_implement_trait, reason = "convention")]
	pub fn next(&mut self) -> u64 {
		let id = self.0;
		self.0 += 1;
		id
	}
}

impl Default for CounterIdGen {
	fn default() -> Self {
		Self::new()
	}
}

/// Classification of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound<Req, Resp, Notif> {
	/// An incoming request.
	Request(Req),
	/// An incoming response.
	Response(Resp),
	/// An incoming notification.
	Notification(Notif),
}

/// Protocol binding between the generic pump and a concrete message format.
///
/// A protocol defines the wire message union, how it splits into requests,
/// responses, and notifications, how IDs are read and assigned, and how
/// complete frames are read from and written to the transport.
pub trait Protocol: Send + 'static {
	/// Identifier type for requests/responses.
	type Id: Eq + Hash + Clone + std::fmt::Debug + Send + 'static;

	/// The wire message type.
	type Message: Send + 'static;

	/// Request message type.
	type Request: Send + 'static;

	/// Response message type.
	type Response: Send + 'static;

	/// Notification message type.
	type Notification: Send + 'static;

	/// Successful result type from request handlers.
	type ReqResult: Send + 'static;

	/// Error type from request handlers.
	type ReqError: Send + 'static;

	/// State for generating unique request IDs.
	type IdGen: Send + 'static;

	/// Generate the next unique request ID.
	fn next_id(id_gen: &mut Self::IdGen) -> Self::Id;

	/// Read a complete message from the input stream.
	fn read_message(
		&mut self,
		input: &mut (impl AsyncBufRead + Unpin + Send),
	) -> impl std::future::Future<Output = Result<Self::Message>> + Send;

	/// Write a message to the output stream.
	fn write_message(
		&mut self,
		output: &mut (impl AsyncWrite + Unpin + Send),
		msg: &Self::Message,
	) -> impl std::future::Future<Output = Result<()>> + Send;

	/// Classify an inbound message.
	fn split_inbound(msg: Self::Message) -> Inbound<Self::Request, Self::Response, Self::Notification>;

	/// Get the ID from a request.
	fn request_id(req: &Self::Request) -> Self::Id;

	/// Set the ID on a request.
	fn set_request_id(req: &mut Self::Request, id: Self::Id);

	/// Get the ID from a response.
	fn response_id(resp: &Self::Response) -> Self::Id;

	/// Wrap a request into a wire message.
	fn wrap_request(req: Self::Request) -> Self::Message;

	/// Wrap a response into a wire message.
	fn wrap_response(resp: Self::Response) -> Self::Message;

	/// Wrap a notification into a wire message.
	fn wrap_notification(notif: Self::Notification) -> Self::Message;

	/// Create a successful response message.
	fn response_ok(id: Self::Id, result: Self::ReqResult) -> Self::Response;

	/// Create an error response.
	fn response_err(id: Self::Id, error: Self::ReqError) -> Self::Response;

	/// Returns true if the loop should assign a new ID from `id_gen`.
	///
	/// Defaults to `true`. Protocols that support pre-assigned IDs
	/// can override this to skip ID generation.
	fn should_assign_id(req: &Self::Request) -> bool {
		let _ = req;
		true
	}

	/// Returns true if the loop error represents a clean peer disconnect.
	fn is_disconnect(err: &Error) -> bool {
		matches!(
			err,
			Error::Io(e) if matches!(
				e.kind(),
				ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::BrokenPipe
			)
		)
	}
}
