//! IPC server and client for agent/view communication.

use std::path::Path;
use std::sync::Arc;

use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::sync::CancellationToken;
use vellum_agent::{AgentCore, AgentService};
use vellum_proto::SyncProtocol;
use vellum_rpc::{CounterIdGen, MainLoop, PeerSocket};
use vellum_view::{ViewCore, ViewService};

/// Starts the agent IPC server on a Unix domain socket.
///
/// Each accepted connection gets its own service instance over the shared
/// [`AgentCore`].
///
/// # Errors
///
/// Returns an error if the socket cannot be bound or if filesystem
/// operations on the socket path fail.
pub async fn serve(
	socket_path: impl AsRef<Path>,
	core: Arc<AgentCore>,
	shutdown: CancellationToken,
) -> std::io::Result<()> {
	let path = socket_path.as_ref();
	if path.exists() {
		tokio::fs::remove_file(path).await?;
	}

	let listener = tokio::net::UnixListener::bind(path)?;
	tracing::info!(path = %path.display(), "agent IPC server listening");

	loop {
		tokio::select! {
			_ = shutdown.cancelled() => {
				tracing::info!("agent IPC server shutting down");
				break;
			}
			res = listener.accept() => {
				match res {
					Ok((stream, _addr)) => {
						tokio::spawn(handle_connection(stream, core.clone()));
					}
					Err(e) => {
						tracing::error!(error = %e, "failed to accept connection");
					}
				}
			}
		}
	}

	Ok(())
}

/// Handles a single IPC connection from a view session.
pub async fn handle_connection(stream: UnixStream, core: Arc<AgentCore>) {
	tracing::info!("new view connection");

	let (reader, writer) = stream.into_split();
	let (main_loop, _socket) = MainLoop::new(
		|socket| AgentService::new(core.clone(), socket),
		SyncProtocol::new(),
		CounterIdGen::new(),
	);

	let reader = tokio::io::BufReader::new(reader);
	if let Err(e) = main_loop.run(reader, writer).await {
		tracing::error!(error = %e, "view connection error");
	}

	tracing::info!("view connection closed");
}

/// Connects to the agent as a view session.
///
/// # Errors
///
/// Any IO error from the socket connect.
pub async fn connect(socket_path: impl AsRef<Path>) -> std::io::Result<UnixStream> {
	UnixStream::connect(socket_path).await
}

/// Starts the view main loop over a connected stream.
///
/// Returns the socket for building a
/// [`CommandRouter`](vellum_view::CommandRouter) and the join handle for
/// the pump.
#[must_use]
pub fn start_view_loop(
	stream: UnixStream,
	core: Arc<ViewCore>,
) -> (
	PeerSocket<SyncProtocol>,
	tokio::task::JoinHandle<vellum_rpc::Result<()>>,
) {
	let (reader, writer): (OwnedReadHalf, OwnedWriteHalf) = stream.into_split();
	let (main_loop, socket) = MainLoop::new(
		|_socket| ViewService::new(core),
		SyncProtocol::new(),
		CounterIdGen::new(),
	);
	let handle = tokio::spawn(main_loop.run(tokio::io::BufReader::new(reader), writer));
	(socket, handle)
}
