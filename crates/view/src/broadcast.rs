//! One-to-many observer notifications.
//!
//! Best-effort and order-preserving per subscriber: events are pushed in
//! publish order down one unbounded channel per subscriber, with no replay
//! for late subscribers and no buffering of missed events. The channel is a
//! notification layer, not the source of truth; every event re-derives
//! from the document state.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use vellum_proto::BroadcastEvent;

/// Fan-out set of live observers.
#[derive(Debug, Default)]
pub struct BroadcastChannel {
	subscribers: Mutex<HashMap<u64, mpsc::UnboundedSender<BroadcastEvent>>>,
	next_id: AtomicU64,
}

/// One observer's live event stream.
///
/// Dropping the subscription disconnects the observer; it is pruned from
/// the fan-out set on the next publish.
#[derive(Debug)]
pub struct Subscription {
	id: u64,
	rx: mpsc::UnboundedReceiver<BroadcastEvent>,
}

impl Subscription {
	/// The connection identity.
	#[must_use]
	pub fn id(&self) -> u64 {
		self.id
	}

	/// Receives the next event, or `None` once the channel is gone.
	pub async fn recv(&mut self) -> Option<BroadcastEvent> {
		self.rx.recv().await
	}

	/// Non-blocking receive.
	///
	/// # Errors
	///
	/// The underlying channel error when empty or disconnected.
	pub fn try_recv(&mut self) -> Result<BroadcastEvent, mpsc::error::TryRecvError> {
		self.rx.try_recv()
	}
}

impl BroadcastChannel {
	/// Creates an empty fan-out set.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a new observer.
	///
	/// The observer sees only events published after this call.
	pub fn subscribe(&self) -> Subscription {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let (tx, rx) = mpsc::unbounded_channel();
		self.subscribers.lock().unwrap().insert(id, tx);
		tracing::debug!(subscriber = id, "observer subscribed");
		Subscription { id, rx }
	}

	/// Pushes an event to every current subscriber, pruning any whose
	/// stream has closed.
	///
	/// Returns the number of subscribers the event was delivered to.
	pub fn publish(&self, event: &BroadcastEvent) -> usize {
		let mut subscribers = self.subscribers.lock().unwrap();
		let mut delivered = 0;
		subscribers.retain(|id, tx| {
			if tx.send(event.clone()).is_ok() {
				delivered += 1;
				true
			} else {
				tracing::debug!(subscriber = id, "pruning disconnected observer");
				false
			}
		});
		delivered
	}

	/// Number of live subscribers (as of the last publish).
	#[must_use]
	pub fn subscriber_count(&self) -> usize {
		self.subscribers.lock().unwrap().len()
	}
}
