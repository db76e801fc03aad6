//! View-process configuration.

use std::time::Duration;

/// Tunables for routing and persistence.
#[derive(Debug, Clone)]
pub struct SyncConfig {
	/// How long a routed command may wait for its reply.
	pub command_timeout: Duration,
	/// Quiet period after the last mutation before persisting.
	pub autosave_debounce: Duration,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			command_timeout: Duration::from_secs(30),
			autosave_debounce: Duration::from_secs(2),
		}
	}
}
