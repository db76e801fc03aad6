//! [`Protocol`] implementation: u32-LE length framing with postcard bodies.

use tokio::io::{AsyncBufRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use vellum_rpc::{CounterIdGen, Error, Inbound, Protocol, Result};

use crate::types::{
	ErrorCode, Event, IpcFrame, Request, RequestId, Response, ResponsePayload,
};

/// The vellum IPC protocol.
///
/// Frames are encoded with postcard and prefixed with their length as a
/// little-endian u32.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncProtocol;

impl SyncProtocol {
	/// Creates the protocol.
	#[must_use]
	pub const fn new() -> Self {
		Self
	}
}

impl Protocol for SyncProtocol {
	type Id = RequestId;
	type Message = IpcFrame;
	type Request = Request;
	type Response = Response;
	type Notification = Event;
	type ReqResult = ResponsePayload;
	type ReqError = ErrorCode;
	type IdGen = CounterIdGen;

	fn next_id(id_gen: &mut CounterIdGen) -> RequestId {
		RequestId(id_gen.next())
	}

	async fn read_message(
		&mut self,
		input: &mut (impl AsyncBufRead + Unpin + Send),
	) -> Result<IpcFrame> {
		let len = input.read_u32_le().await?;
		let mut buf = vec![0u8; len as usize];
		input.read_exact(&mut buf).await?;
		postcard::from_bytes(&buf).map_err(|e| Error::Codec(e.to_string()))
	}

	async fn write_message(
		&mut self,
		output: &mut (impl AsyncWrite + Unpin + Send),
		msg: &IpcFrame,
	) -> Result<()> {
		let buf = postcard::to_allocvec(msg).map_err(|e| Error::Codec(e.to_string()))?;
		output.write_u32_le(buf.len() as u32).await?;
		output.write_all(&buf).await?;
		output.flush().await?;
		Ok(())
	}

	fn split_inbound(msg: IpcFrame) -> Inbound<Request, Response, Event> {
		match msg {
			IpcFrame::Request(req) => Inbound::Request(req),
			IpcFrame::Response(resp) => Inbound::Response(resp),
			IpcFrame::Event(event) => Inbound::Notification(event),
		}
	}

	fn request_id(req: &Request) -> RequestId {
		req.id
	}

	fn set_request_id(req: &mut Request, id: RequestId) {
		req.id = id;
	}

	fn response_id(resp: &Response) -> RequestId {
		resp.request_id
	}

	fn wrap_request(req: Request) -> IpcFrame {
		IpcFrame::Request(req)
	}

	fn wrap_response(resp: Response) -> IpcFrame {
		IpcFrame::Response(resp)
	}

	fn wrap_notification(notif: Event) -> IpcFrame {
		IpcFrame::Event(notif)
	}

	fn response_ok(id: RequestId, result: ResponsePayload) -> Response {
		Response {
			request_id: id,
			payload: Some(result),
			error: None,
		}
	}

	fn response_err(id: RequestId, error: ErrorCode) -> Response {
		Response {
			request_id: id,
			payload: None,
			error: Some(error),
		}
	}

	fn should_assign_id(req: &Request) -> bool {
		req.id == RequestId::UNASSIGNED
	}
}

#[cfg(test)]
mod tests {
	use tokio::io::BufReader;

	use super::*;
	use crate::types::RequestPayload;

	#[tokio::test(flavor = "current_thread")]
	async fn frame_roundtrip() {
		let mut proto = SyncProtocol::new();
		let frame = IpcFrame::Request(Request {
			id: RequestId(9),
			payload: RequestPayload::Ping,
		});

		let mut buf = Vec::new();
		proto.write_message(&mut buf, &frame).await.unwrap();

		let mut reader = BufReader::new(buf.as_slice());
		let decoded = proto.read_message(&mut reader).await.unwrap();
		let IpcFrame::Request(req) = decoded else {
			panic!("expected request frame");
		};
		assert_eq!(req.id, RequestId(9));
		assert!(matches!(req.payload, RequestPayload::Ping));
	}

	#[tokio::test(flavor = "current_thread")]
	async fn eof_is_clean_disconnect() {
		let mut proto = SyncProtocol::new();
		let mut reader = BufReader::new(&[][..]);
		let err = proto.read_message(&mut reader).await.unwrap_err();
		assert!(SyncProtocol::is_disconnect(&err));
	}

	#[tokio::test(flavor = "current_thread")]
	async fn garbage_is_codec_error() {
		let mut proto = SyncProtocol::new();
		// Valid length prefix, invalid body.
		let mut bytes = 4u32.to_le_bytes().to_vec();
		bytes.extend_from_slice(&[0xff, 0xff, 0xff, 0xff]);
		let mut reader = BufReader::new(bytes.as_slice());
		let err = proto.read_message(&mut reader).await.unwrap_err();
		assert!(matches!(err, Error::Codec(_)));
		assert!(!SyncProtocol::is_disconnect(&err));
	}
}
