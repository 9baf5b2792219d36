//! Fixtures shared by the integration tests.

#![allow(dead_code)]

// std
use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use time::{Duration, OffsetDateTime};
// self
use token_refresher::{
	auth::{Claims, CredentialId, TokenMaterial},
	credential::{
		CredentialState, CredentialUpdate, CredentialUpdater, RefreshableCredential, UpdaterFn,
	},
	error::Error,
};

/// Encodes `payload` as the middle segment of an unsigned compact JWT.
pub fn jwt(payload: serde_json::Value) -> String {
	format!("e30.{}.sig", URL_SAFE_NO_PAD.encode(payload.to_string()))
}

pub fn credential_id(value: &str) -> CredentialId {
	CredentialId::new(value).expect("Credential fixture should be valid.")
}

/// Material and claims for a token expiring `lifetime` from now.
pub fn issued(access: &str, lifetime: Duration) -> CredentialUpdate {
	CredentialUpdate::new(TokenMaterial::new(access), Claims::expiring_in(lifetime))
}

/// Updater that counts invocations and issues `access-<n>` tokens valid for `lifetime`.
#[derive(Clone)]
pub struct CountingUpdater {
	pub calls: Arc<AtomicUsize>,
	pub lifetime: Duration,
	pub delay: StdDuration,
}
impl CountingUpdater {
	pub fn new(lifetime: Duration) -> Self {
		Self { calls: Arc::new(AtomicUsize::new(0)), lifetime, delay: StdDuration::ZERO }
	}

	pub fn with_delay(mut self, delay: StdDuration) -> Self {
		self.delay = delay;

		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn updater(&self) -> Arc<dyn CredentialUpdater> {
		let this = self.clone();

		UpdaterFn::new(move |current: Arc<CredentialState>| {
			let n = this.calls.fetch_add(1, Ordering::SeqCst) + 1;
			let lifetime = this.lifetime;
			let delay = this.delay;

			async move {
				if !delay.is_zero() {
					tokio::time::sleep(delay).await;
				}

				let material =
					TokenMaterial::new(format!("access-{n}")).retain_refresh_token(&current.material);

				Ok(CredentialUpdate::new(material, Claims::expiring_in(lifetime)))
			}
		})
	}
}

/// Updater that always fails with the error built by `make`.
pub fn failing_updater(make: fn() -> Error) -> Arc<dyn CredentialUpdater> {
	UpdaterFn::new(move |_| async move { Err::<CredentialUpdate, _>(make()) })
}

/// Credential expiring `lifetime` from now, renewed by `updater`.
pub fn credential(
	id: &str,
	lifetime: Duration,
	updater: Arc<dyn CredentialUpdater>,
) -> Arc<RefreshableCredential> {
	RefreshableCredential::builder(credential_id(id), updater, issued(id, lifetime)).build()
}

/// Polls `check` until it holds or `timeout` passes; returns the final result.
pub async fn wait_until(timeout: StdDuration, mut check: impl FnMut() -> bool) -> bool {
	let deadline = tokio::time::Instant::now() + timeout;

	loop {
		if check() {
			return true;
		}
		if tokio::time::Instant::now() >= deadline {
			return false;
		}

		tokio::time::sleep(StdDuration::from_millis(10)).await;
	}
}

pub fn now() -> OffsetDateTime {
	OffsetDateTime::now_utc()
}
