//! Generic message pump driving one peer connection.

use std::collections::HashMap;
use std::future::poll_fn;
use std::ops::ControlFlow;

use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tower_service::Service;

use crate::error::Result;
use crate::event::AnyEvent;
use crate::protocol::{Inbound, Protocol};
use crate::socket::{MainLoopEvent, PeerSocket};

/// Request handling and event hooks for a [`MainLoop`].
///
/// The tower [`Service`] impl handles inbound requests; `notify` and `emit`
/// run synchronously on the loop for inbound notifications and loopback
/// events. Returning `ControlFlow::Break` stops the loop with the given
/// result.
pub trait RpcService<P: Protocol>:
	Service<P::Request, Response = P::ReqResult, Error = P::ReqError>
{
	/// Handle an inbound notification from the peer.
	fn notify(&mut self, notif: P::Notification) -> ControlFlow<Result<()>>;

	/// Handle a loopback event injected through a [`PeerSocket`].
	fn emit(&mut self, event: AnyEvent) -> ControlFlow<Result<()>>;
}

/// Message pump for one connection.
///
/// Owns the outgoing-request correlation map: every request sent through the
/// socket gets exactly one pending entry, removed when the correlated
/// response arrives or the caller cancels. Responses whose ID is not pending
/// are discarded.
pub struct MainLoop<S: RpcService<P>, P: Protocol> {
	/// The wrapped service.
	service: S,
	/// Wire format and message semantics.
	protocol: P,
	/// State for assigning outgoing request IDs.
	id_gen: P::IdGen,
	/// Receiver for internal events from sockets.
	rx: mpsc::UnboundedReceiver<MainLoopEvent<P>>,
	/// Pending outgoing requests awaiting responses.
	outgoing: HashMap<P::Id, oneshot::Sender<P::Response>>,
	/// Concurrent request handlers in flight.
	tasks: JoinSet<P::Response>,
}

impl<S, P> MainLoop<S, P>
where
	P: Protocol,
	S: RpcService<P>,
	S::Future: Send + 'static,
{
	/// Creates a main loop and the socket feeding it.
	///
	/// The builder receives the socket so the service can send messages to
	/// its own loop (replication pushes, loopback events).
	#[must_use]
	pub fn new(
		builder: impl FnOnce(PeerSocket<P>) -> S,
		protocol: P,
		id_gen: P::IdGen,
	) -> (Self, PeerSocket<P>) {
		let (tx, rx) = mpsc::unbounded_channel();
		let socket = PeerSocket { tx };
		let this = Self {
			service: builder(socket.clone()),
			protocol,
			id_gen,
			rx,
			outgoing: HashMap::new(),
			tasks: JoinSet::new(),
		};
		(this, socket)
	}

	/// Drives the connection until the peer disconnects or a socket asks the
	/// loop to stop.
	///
	/// # Errors
	///
	/// Returns transport or codec errors from the underlying streams; a clean
	/// peer disconnect (per [`Protocol::is_disconnect`]) is `Ok(())`.
	pub async fn run(
		mut self,
		mut input: impl AsyncBufRead + Unpin + Send,
		mut output: impl AsyncWrite + Unpin + Send,
	) -> Result<()> {
		let ret = loop {
			let ctl = tokio::select! {
				biased;

				// Socket events drain before handler responses: a service
				// that queues events and then returns its result sees them
				// hit the wire in that order.
				event = self.rx.recv() => match event {
					Some(event) => self.dispatch_event(event),
					None => break Ok(()),
				},

				resp = self.tasks.join_next(), if !self.tasks.is_empty() => match resp {
					Some(Ok(resp)) => ControlFlow::Continue(Some(P::wrap_response(resp))),
					Some(Err(err)) => {
						tracing::error!(error = %err, "request handler panicked or was cancelled");
						ControlFlow::Continue(None)
					}
					None => ControlFlow::Continue(None),
				},

				msg = self.protocol.read_message(&mut input) => match msg {
					Ok(msg) => self.dispatch_message(msg).await,
					Err(err) if P::is_disconnect(&err) => break Ok(()),
					Err(err) => break Err(err),
				},
			};

			match ctl {
				ControlFlow::Continue(Some(msg)) => {
					self.protocol.write_message(&mut output, &msg).await?;
				}
				ControlFlow::Continue(None) => {}
				ControlFlow::Break(ret) => break ret,
			}
		};

		output.shutdown().await?;
		ret
	}

	/// Routes an inbound message to the appropriate handler.
	async fn dispatch_message(
		&mut self,
		msg: P::Message,
	) -> ControlFlow<Result<()>, Option<P::Message>> {
		match P::split_inbound(msg) {
			Inbound::Request(req) => {
				let id = P::request_id(&req);
				if let Err(err) = poll_fn(|cx| self.service.poll_ready(cx)).await {
					return ControlFlow::Continue(Some(P::wrap_response(P::response_err(id, err))));
				}
				let fut = self.service.call(req);
				self.tasks.spawn(async move {
					match fut.await {
						Ok(result) => P::response_ok(id, result),
						Err(err) => P::response_err(id, err),
					}
				});
			}
			Inbound::Response(resp) => {
				let id = P::response_id(&resp);
				if let Some(tx) = self.outgoing.remove(&id) {
					// The caller may have stopped waiting; the send result is
					// intentionally ignored.
					let _: std::result::Result<_, _> = tx.send(resp);
				} else {
					tracing::warn!(?id, "discarding response with no pending request");
				}
			}
			Inbound::Notification(notif) => {
				self.service.notify(notif)?;
			}
		}
		ControlFlow::Continue(None)
	}

	/// Routes an internal event (outgoing traffic or loopback).
	fn dispatch_event(
		&mut self,
		event: MainLoopEvent<P>,
	) -> ControlFlow<Result<()>, Option<P::Message>> {
		match event {
			MainLoopEvent::Outgoing(msg) => ControlFlow::Continue(Some(msg)),
			MainLoopEvent::OutgoingRequest(mut req, resp_tx) => {
				let id = if P::should_assign_id(&req) {
					let id = P::next_id(&mut self.id_gen);
					P::set_request_id(&mut req, id.clone());
					id
				} else {
					P::request_id(&req)
				};
				if self.outgoing.insert(id.clone(), resp_tx).is_some() {
					// The displaced sender drops, failing its waiter.
					tracing::error!(?id, "duplicate in-flight request id");
				}
				ControlFlow::Continue(Some(P::wrap_request(req)))
			}
			MainLoopEvent::CancelRequest(id) => {
				if self.outgoing.remove(&id).is_some() {
					tracing::debug!(?id, "pending request cancelled");
				}
				ControlFlow::Continue(None)
			}
			MainLoopEvent::Any(event) => {
				self.service.emit(event)?;
				ControlFlow::Continue(None)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use std::pin::Pin;
	use std::task::{Context, Poll};

	use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
	use tokio::sync::mpsc;

	use super::*;
	use crate::error::Error;
	use crate::protocol::CounterIdGen;

	/// Line-delimited test wire format: `REQ <id> <body>`, `RES <id> <body>`,
	/// `NOTE <body>`.
	#[derive(Debug, Clone, PartialEq, Eq)]
	enum Frame {
		Req { id: u64, body: String },
		Res { id: u64, body: String },
		Note(String),
	}

	fn encode(frame: &Frame) -> String {
		match frame {
			Frame::Req { id, body } => format!("REQ {id} {body}\n"),
			Frame::Res { id, body } => format!("RES {id} {body}\n"),
			Frame::Note(body) => format!("NOTE {body}\n"),
		}
	}

	fn decode(line: &str) -> Result<Frame> {
		let line = line.trim_end();
		let (tag, rest) = line.split_once(' ').ok_or_else(|| Error::Codec(line.into()))?;
		match tag {
			"NOTE" => Ok(Frame::Note(rest.to_string())),
			"REQ" | "RES" => {
				let (id, body) = rest.split_once(' ').ok_or_else(|| Error::Codec(line.into()))?;
				let id = id.parse().map_err(|_| Error::Codec(line.into()))?;
				let body = body.to_string();
				if tag == "REQ" {
					Ok(Frame::Req { id, body })
				} else {
					Ok(Frame::Res { id, body })
				}
			}
			_ => Err(Error::Codec(line.into())),
		}
	}

	struct LineProtocol;

	impl Protocol for LineProtocol {
		type Id = u64;
		type Message = Frame;
		type Request = (u64, String);
		type Response = (u64, String);
		type Notification = String;
		type ReqResult = String;
		type ReqError = String;
		type IdGen = CounterIdGen;

		fn next_id(id_gen: &mut CounterIdGen) -> u64 {
			id_gen.next()
		}

		async fn read_message(
			&mut self,
			input: &mut (impl AsyncBufRead + Unpin + Send),
		) -> Result<Frame> {
			let mut line = String::new();
			let n = input.read_line(&mut line).await?;
			if n == 0 {
				return Err(Error::Io(std::io::ErrorKind::UnexpectedEof.into()));
			}
			decode(&line)
		}

		async fn write_message(
			&mut self,
			output: &mut (impl AsyncWrite + Unpin + Send),
			msg: &Frame,
		) -> Result<()> {
			output.write_all(encode(msg).as_bytes()).await?;
			output.flush().await?;
			Ok(())
		}

		fn split_inbound(msg: Frame) -> Inbound<(u64, String), (u64, String), String> {
			match msg {
				Frame::Req { id, body } => Inbound::Request((id, body)),
				Frame::Res { id, body } => Inbound::Response((id, body)),
				Frame::Note(body) => Inbound::Notification(body),
			}
		}

		fn request_id(req: &(u64, String)) -> u64 {
			req.0
		}

		fn set_request_id(req: &mut (u64, String), id: u64) {
			req.0 = id;
		}

		fn response_id(resp: &(u64, String)) -> u64 {
			resp.0
		}

		fn wrap_request(req: (u64, String)) -> Frame {
			Frame::Req {
				id: req.0,
				body: req.1,
			}
		}

		fn wrap_response(resp: (u64, String)) -> Frame {
			Frame::Res {
				id: resp.0,
				body: resp.1,
			}
		}

		fn wrap_notification(notif: String) -> Frame {
			Frame::Note(notif)
		}

		fn response_ok(id: u64, result: String) -> (u64, String) {
			(id, result)
		}

		fn response_err(id: u64, error: String) -> (u64, String) {
			(id, format!("ERR {error}"))
		}

		fn should_assign_id(req: &(u64, String)) -> bool {
			req.0 == 0
		}
	}

	/// Uppercases request bodies; records notifications.
	struct EchoService {
		notes: mpsc::UnboundedSender<String>,
	}

	impl Service<(u64, String)> for EchoService {
		type Response = String;
		type Error = String;
		type Future =
			Pin<Box<dyn std::future::Future<Output = std::result::Result<String, String>> + Send>>;

		fn poll_ready(
			&mut self,
			_cx: &mut Context<'_>,
		) -> Poll<std::result::Result<(), Self::Error>> {
			Poll::Ready(Ok(()))
		}

		fn call(&mut self, req: (u64, String)) -> Self::Future {
			Box::pin(async move {
				if req.1 == "boom" {
					Err("rejected".to_string())
				} else {
					Ok(req.1.to_uppercase())
				}
			})
		}
	}

	impl RpcService<LineProtocol> for EchoService {
		fn notify(&mut self, notif: String) -> ControlFlow<Result<()>> {
			let _ = self.notes.send(notif);
			ControlFlow::Continue(())
		}

		fn emit(&mut self, event: AnyEvent) -> ControlFlow<Result<()>> {
			if let Ok(note) = event.downcast::<String>() {
				let _ = self.notes.send(note);
			}
			ControlFlow::Continue(())
		}
	}

	fn spawn_loop(
		stream: tokio::io::DuplexStream,
	) -> (
		PeerSocket<LineProtocol>,
		mpsc::UnboundedReceiver<String>,
		tokio::task::JoinHandle<Result<()>>,
	) {
		let (notes_tx, notes_rx) = mpsc::unbounded_channel();
		let (main_loop, socket) = MainLoop::new(
			|_socket| EchoService { notes: notes_tx },
			LineProtocol,
			CounterIdGen::new(),
		);
		let (reader, writer) = tokio::io::split(stream);
		let handle = tokio::spawn(main_loop.run(BufReader::new(reader), writer));
		(socket, notes_rx, handle)
	}

	#[tokio::test(flavor = "current_thread")]
	async fn request_response_roundtrip() {
		let (a, b) = tokio::io::duplex(4096);
		let (socket_a, _notes_a, _h_a) = spawn_loop(a);
		let (_socket_b, _notes_b, _h_b) = spawn_loop(b);

		let resp = socket_a.request((0, "hello".into())).await.unwrap();
		assert_eq!(resp.1, "HELLO");
	}

	#[tokio::test(flavor = "current_thread")]
	async fn handler_error_becomes_error_response() {
		let (a, b) = tokio::io::duplex(4096);
		let (socket_a, _notes_a, _h_a) = spawn_loop(a);
		let (_socket_b, _notes_b, _h_b) = spawn_loop(b);

		let resp = socket_a.request((0, "boom".into())).await.unwrap();
		assert_eq!(resp.1, "ERR rejected");
	}

	#[tokio::test(flavor = "current_thread")]
	async fn concurrent_requests_correlate_independently() {
		let (a, b) = tokio::io::duplex(4096);
		let (socket_a, _notes_a, _h_a) = spawn_loop(a);
		let (_socket_b, _notes_b, _h_b) = spawn_loop(b);

		let first = socket_a.request((0, "one".into()));
		let second = socket_a.request((0, "two".into()));
		let (first, second) = tokio::join!(first, second);
		assert_eq!(first.unwrap().1, "ONE");
		assert_eq!(second.unwrap().1, "TWO");
	}

	#[tokio::test(flavor = "current_thread")]
	async fn notification_reaches_service() {
		let (a, b) = tokio::io::duplex(4096);
		let (socket_a, _notes_a, _h_a) = spawn_loop(a);
		let (_socket_b, mut notes_b, _h_b) = spawn_loop(b);

		socket_a.notify("ping".into()).unwrap();
		assert_eq!(notes_b.recv().await.unwrap(), "ping");
	}

	#[tokio::test(flavor = "current_thread")]
	async fn cancel_discards_late_response() {
		// Drive the peer side by hand so the response can arrive after the
		// cancel.
		let (a, b) = tokio::io::duplex(4096);
		let (socket_a, mut notes_a, _h_a) = spawn_loop(a);
		let (peer_read, mut peer_write) = tokio::io::split(b);
		let mut peer_read = BufReader::new(peer_read);

		let pending = tokio::spawn({
			let socket_a = socket_a.clone();
			async move { socket_a.request((0, "slow".into())).await }
		});

		// Observe the request on the raw peer, but do not answer yet.
		let mut line = String::new();
		peer_read.read_line(&mut line).await.unwrap();
		let Frame::Req { id, .. } = decode(&line).unwrap() else {
			panic!("expected request frame, got {line:?}");
		};

		socket_a.cancel(id).unwrap();
		let err = pending.await.unwrap().unwrap_err();
		assert!(matches!(err, Error::Stopped));

		// A late response for the cancelled id must be a no-op; the loop must
		// keep serving afterwards.
		peer_write
			.write_all(encode(&Frame::Res {
				id,
				body: "late".into(),
			}).as_bytes())
			.await
			.unwrap();
		peer_write
			.write_all(encode(&Frame::Note("still alive".into())).as_bytes())
			.await
			.unwrap();

		assert_eq!(notes_a.recv().await.unwrap(), "still alive");
	}

	#[tokio::test(flavor = "current_thread")]
	async fn loopback_event_reaches_service() {
		let (a, _b) = tokio::io::duplex(4096);
		let (socket_a, mut notes_a, _h_a) = spawn_loop(a);

		socket_a.emit(AnyEvent::new("looped".to_string())).unwrap();
		assert_eq!(notes_a.recv().await.unwrap(), "looped");
	}
}
