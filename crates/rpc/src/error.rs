//! Error types shared by the message pump and its callers.

/// Errors raised by the message pump or by sockets talking to it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// The underlying transport raised an IO error.
	#[error("transport error: {0}")]
	Io(#[from] std::io::Error),

	/// A frame could not be encoded or decoded.
	#[error("codec error: {0}")]
	Codec(String),

	/// The main loop has stopped and can no longer service this socket.
	#[error("main loop stopped")]
	Stopped,
}

/// Result alias for pump operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
