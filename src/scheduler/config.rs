// std
use std::time::Duration as StdDuration;
// self
use crate::_prelude::*;

/// Tuning knobs for the background renewal worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
	/// Longest the worker blocks waiting for the next due entry before re-checking shutdown.
	pub poll_interval: StdDuration,
	/// Delay applied when a renewed credential is still due, so the worker cannot spin on it.
	pub suppressed_retry_delay: StdDuration,
}
impl SchedulerConfig {
	/// Overrides the poll interval.
	pub fn with_poll_interval(mut self, interval: StdDuration) -> Self {
		self.poll_interval = interval;

		self
	}

	/// Overrides the suppressed retry delay.
	pub fn with_suppressed_retry_delay(mut self, delay: StdDuration) -> Self {
		self.suppressed_retry_delay = delay;

		self
	}
}
impl Default for SchedulerConfig {
	fn default() -> Self {
		Self {
			poll_interval: StdDuration::from_secs(2),
			suppressed_retry_delay: StdDuration::from_secs(2),
		}
	}
}
