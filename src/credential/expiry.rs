//! Expiry buffer policy and lock-free instants shared by credentials and the scheduler.

// std
use std::{
	cmp,
	sync::atomic::{AtomicI64, Ordering},
};
// self
use crate::_prelude::*;

/// Upper bound on how early a credential is renewed.
pub const FIXED_BUFFER: Duration = Duration::seconds(10);
/// Share of the remaining lifetime used as the buffer for short-lived tokens.
pub const BUFFER_FRACTION: f64 = 0.10;

/// Decides how long before expiry renewal should begin.
///
/// `buffer = min(fixed, fraction × (expire_at - now))`, so long-lived tokens renew `fixed`
/// early while short-lived ones renew proportionally earlier and never before they were
/// issued. Tokens that are already expired get a zero buffer.
///
/// Deserialized policies go through [`ExpiryBuffer::new`], so out-of-range inputs are clamped
/// the same way as programmatic ones.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawExpiryBuffer")]
pub struct ExpiryBuffer {
	fixed: Duration,
	fraction: f64,
}
impl ExpiryBuffer {
	/// Creates a policy, clamping negative inputs to zero and the fraction to at most one.
	pub fn new(fixed: Duration, fraction: f64) -> Self {
		let fixed = if fixed.is_negative() { Duration::ZERO } else { fixed };
		let fraction = if fraction.is_finite() { fraction.clamp(0., 1.) } else { 0. };

		Self { fixed, fraction }
	}

	/// Maximum buffer applied to any token.
	pub fn fixed(&self) -> Duration {
		self.fixed
	}

	/// Fraction of the remaining lifetime, within `0.0..=1.0`.
	pub fn fraction(&self) -> f64 {
		self.fraction
	}

	/// Computes the buffer for a token expiring at `expire_at`, observed at `now`.
	///
	/// The result always lies within `0..=expire_at - now`.
	pub fn buffer_for(&self, now: OffsetDateTime, expire_at: OffsetDateTime) -> Duration {
		let lifetime = expire_at - now;

		if !lifetime.is_positive() {
			return Duration::ZERO;
		}

		let proportional =
			Duration::nanoseconds((lifetime.whole_nanoseconds() as f64 * self.fraction) as i64);

		cmp::min(self.fixed, proportional).clamp(Duration::ZERO, lifetime)
	}

	/// Derives both instants for a token expiring at `expire_at`, observed at `now`.
	pub fn window(&self, now: OffsetDateTime, expire_at: OffsetDateTime) -> ExpiryWindow {
		ExpiryWindow { expire_at, expire_with_buffer_at: expire_at - self.buffer_for(now, expire_at) }
	}
}
impl Default for ExpiryBuffer {
	fn default() -> Self {
		Self { fixed: FIXED_BUFFER, fraction: BUFFER_FRACTION }
	}
}
impl From<RawExpiryBuffer> for ExpiryBuffer {
	fn from(raw: RawExpiryBuffer) -> Self {
		Self::new(raw.fixed, raw.fraction)
	}
}

#[derive(Deserialize)]
struct RawExpiryBuffer {
	fixed: Duration,
	fraction: f64,
}

/// Hard and buffered expiry instants for one token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpiryWindow {
	/// Instant the token becomes invalid.
	pub expire_at: OffsetDateTime,
	/// Instant renewal should begin; never later than `expire_at`.
	pub expire_with_buffer_at: OffsetDateTime,
}

/// An [`OffsetDateTime`] stored as UTC unix nanoseconds in one atomic word.
#[derive(Debug)]
pub(crate) struct AtomicInstant(AtomicI64);
impl AtomicInstant {
	pub(crate) fn new(instant: OffsetDateTime) -> Self {
		Self(AtomicI64::new(to_nanos(instant)))
	}

	pub(crate) fn load(&self) -> OffsetDateTime {
		OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.0.load(Ordering::Acquire)))
			.unwrap_or(OffsetDateTime::UNIX_EPOCH)
	}

	pub(crate) fn store(&self, instant: OffsetDateTime) {
		self.0.store(to_nanos(instant), Ordering::Release);
	}
}

fn to_nanos(instant: OffsetDateTime) -> i64 {
	let nanos = instant.unix_timestamp_nanos();

	i64::try_from(nanos).unwrap_or(if nanos.is_negative() { i64::MIN } else { i64::MAX })
}
