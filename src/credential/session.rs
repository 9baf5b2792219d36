//! Liveness handle for the session that owns a credential.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{_prelude::*, credential::Condition};

/// Shared flag describing whether an owning session is still live.
///
/// A credential bound to a session is dropped by the scheduler once the session ends, and
/// invalidates the session itself when renewal fails terminally so the owner is forced to
/// re-authenticate.
#[derive(Clone, Debug)]
pub struct Session(Arc<AtomicBool>);
impl Session {
	/// Creates a live session.
	pub fn new() -> Self {
		Self(Arc::new(AtomicBool::new(true)))
	}

	/// Returns `true` until [`invalidate`](Self::invalidate) is called.
	pub fn is_live(&self) -> bool {
		self.0.load(Ordering::Acquire)
	}

	/// Ends the session. Idempotent.
	pub fn invalidate(&self) {
		self.0.store(false, Ordering::Release);
	}

	/// Returns the session's liveness as a [`Condition`].
	pub fn liveness(&self) -> Condition {
		let flag = self.0.clone();

		Arc::new(move || flag.load(Ordering::Acquire))
	}
}
impl Default for Session {
	fn default() -> Self {
		Self::new()
	}
}
