//! Observability helpers for credential renewal.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit spans named `token_refresher.refresh` with the `trigger` (refresh
//!   mode) and `credential` (identifier) fields, plus worker lifecycle and failure events.
//! - Enable `metrics` to increment the `token_refresher_refresh_total` counter for every
//!   attempt/outcome, labeled by `trigger` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

pub(crate) use tracing::obs_event;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each renewal attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshOutcome {
	/// Entry to `refresh_if_required` past the lock-free due check.
	Attempt,
	/// The update capability produced new material.
	Refreshed,
	/// Another caller renewed first, or renewal was no longer due under the lock.
	Skipped,
	/// The update capability failed.
	Failure,
	/// The scheduler discarded an inactive credential.
	Dropped,
}
impl RefreshOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshOutcome::Attempt => "attempt",
			RefreshOutcome::Refreshed => "refreshed",
			RefreshOutcome::Skipped => "skipped",
			RefreshOutcome::Failure => "failure",
			RefreshOutcome::Dropped => "dropped",
		}
	}
}
impl Display for RefreshOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
