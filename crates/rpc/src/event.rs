//! Type-erased loopback events.

use std::any::{Any, type_name};

/// A type-erased event injected into a main loop from within the same process.
///
/// Loopback events bypass the wire entirely: they are delivered to the
/// service's `emit` handler in socket-send order, interleaved with outgoing
/// traffic.
pub struct AnyEvent {
	inner: Box<dyn Any + Send>,
	type_name: &'static str,
}

impl AnyEvent {
	/// Wraps a value in a type-erased event.
	#[must_use]
	pub fn new<T: Send + 'static>(value: T) -> Self {
		Self {
			inner: Box::new(value),
			type_name: type_name::<T>(),
		}
	}

	/// Attempts to recover the concrete event value.
	///
	/// # Errors
	///
	/// Returns `self` unchanged when the contained value is not a `T`.
	pub fn downcast<T: Send + 'static>(self) -> Result<T, Self> {
		let type_name = self.type_name;
		match self.inner.downcast::<T>() {
			Ok(v) => Ok(*v),
			Err(inner) => Err(Self { inner, type_name }),
		}
	}

	/// Returns true if the contained value is a `T`.
	#[must_use]
	pub fn is<T: Send + 'static>(&self) -> bool {
		self.inner.is::<T>()
	}
}

impl std::fmt::Debug for AnyEvent {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("AnyEvent").field(&self.type_name).finish()
	}
}
