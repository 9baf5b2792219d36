//! Renewable credentials with double-checked, per-credential singleflight refresh.
//!
//! A [`RefreshableCredential`] owns the current token material and claims, the instants
//! derived from them, and the capability that renews them. Renewal is due once the buffered
//! expiry has passed (and any extra condition holds). [`RefreshableCredential::refresh_if_required`]
//! tests that without locking, then re-tests it under the credential's own async mutex, so
//! concurrent callers trigger at most one provider round-trip and all observe its result.
//! The credential is mutated in place, which keeps scheduler references valid across renewals.

pub mod expiry;
pub mod session;

pub use expiry::*;
pub use session::*;

// self
use crate::{
	_prelude::*,
	auth::{Claims, CredentialId, TokenMaterial},
	credential::expiry::AtomicInstant,
	obs::{self, RefreshOutcome, RefreshSpan, obs_event},
};

/// Predicate capability (liveness, extra refresh condition).
pub type Condition = Arc<dyn Fn() -> bool + Send + Sync>;

/// Boxed future returned by [`CredentialUpdater::update`].
pub type UpdateFuture<'a> = Pin<Box<dyn Future<Output = Result<CredentialUpdate>> + 'a + Send>>;

/// Capability that fetches replacement token material for a credential.
///
/// Implementations typically perform an OIDC token-endpoint exchange and verify the
/// response. The call runs while the credential's refresh lock is held, so it is never
/// invoked concurrently for the same credential.
pub trait CredentialUpdater
where
	Self: Send + Sync,
{
	/// Produces new material and claims for `current`, or fails without side effects.
	fn update(&self, current: Arc<CredentialState>) -> UpdateFuture<'_>;
}

/// [`CredentialUpdater`] backed by an async closure.
pub struct UpdaterFn<F>(F);
impl<F, Fut> UpdaterFn<F>
where
	F: Fn(Arc<CredentialState>) -> Fut + Send + Sync,
	Fut: 'static + Send + Future<Output = Result<CredentialUpdate>>,
{
	/// Wraps `f` as a shareable updater.
	pub fn new(f: F) -> Arc<Self> {
		Arc::new(Self(f))
	}
}
impl<F, Fut> CredentialUpdater for UpdaterFn<F>
where
	F: Fn(Arc<CredentialState>) -> Fut + Send + Sync,
	Fut: 'static + Send + Future<Output = Result<CredentialUpdate>>,
{
	fn update(&self, current: Arc<CredentialState>) -> UpdateFuture<'_> {
		Box::pin((self.0)(current))
	}
}
impl<F> Debug for UpdaterFn<F> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("UpdaterFn(..)")
	}
}

/// Replacement material and claims produced by an updater.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CredentialUpdate {
	/// New token material.
	pub material: TokenMaterial,
	/// Claims of the new token.
	pub claims: Claims,
}
impl CredentialUpdate {
	/// Pairs material with its claims.
	pub fn new(material: TokenMaterial, claims: Claims) -> Self {
		Self { material, claims }
	}
}

/// Consistent snapshot of a credential's current material and claims.
#[derive(Clone, Debug)]
pub struct CredentialState {
	/// Identifier of the owning credential.
	pub id: CredentialId,
	/// Current token material.
	pub material: TokenMaterial,
	/// Claims of the current token.
	pub claims: Claims,
	/// Instant the material was installed.
	pub installed_at: OffsetDateTime,
}

/// Who asked for a renewal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshMode {
	/// Ahead-of-need renewal driven by the background scheduler.
	Eager,
	/// Renewal on a request path that needs a usable token now.
	JustInTime,
}
impl RefreshMode {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshMode::Eager => "eager",
			RefreshMode::JustInTime => "just_in_time",
		}
	}
}
impl Display for RefreshMode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Credential that renews itself through its [`CredentialUpdater`].
pub struct RefreshableCredential {
	id: CredentialId,
	state: RwLock<Arc<CredentialState>>,
	expire_at: AtomicInstant,
	expire_with_buffer_at: AtomicInstant,
	buffer: ExpiryBuffer,
	updater: Arc<dyn CredentialUpdater>,
	refresh_condition: Option<Condition>,
	liveness: Option<Condition>,
	session: Option<Session>,
	guard: AsyncMutex<()>,
}
impl RefreshableCredential {
	/// Returns a builder seeded with the initially issued material.
	pub fn builder(
		id: CredentialId,
		updater: Arc<dyn CredentialUpdater>,
		initial: CredentialUpdate,
	) -> RefreshableCredentialBuilder {
		RefreshableCredentialBuilder::new(id, updater, initial)
	}

	/// Stable identifier.
	pub fn id(&self) -> &CredentialId {
		&self.id
	}

	/// Returns the current material and claims as one consistent snapshot.
	pub fn snapshot(&self) -> Arc<CredentialState> {
		self.state.read().clone()
	}

	/// Returns a copy of the current token material.
	pub fn material(&self) -> TokenMaterial {
		self.state.read().material.clone()
	}

	/// Returns a copy of the current claims.
	pub fn claims(&self) -> Claims {
		self.state.read().claims.clone()
	}

	/// Instant the current token becomes invalid.
	pub fn expire_at(&self) -> OffsetDateTime {
		self.expire_at.load()
	}

	/// Instant renewal of the current token should begin.
	pub fn expire_with_buffer_at(&self) -> OffsetDateTime {
		self.expire_with_buffer_at.load()
	}

	/// Returns `true` if the current token is past its hard expiry.
	pub fn is_expired(&self) -> bool {
		OffsetDateTime::now_utc() >= self.expire_at()
	}

	/// Returns `true` while the owner still wants this credential kept fresh.
	pub fn is_active(&self) -> bool {
		match (&self.liveness, &self.session) {
			(Some(liveness), _) => liveness(),
			(None, Some(session)) => session.is_live(),
			(None, None) => true,
		}
	}

	/// Returns `true` if renewal is due now. Lock-free.
	pub fn is_refresh_due(&self) -> bool {
		self.is_refresh_due_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` if renewal is due at `now`. Lock-free.
	pub fn is_refresh_due_at(&self, now: OffsetDateTime) -> bool {
		now >= self.expire_with_buffer_at.load()
			&& self.refresh_condition.as_ref().is_none_or(|condition| condition())
	}

	/// Renews the credential if due, returning `true` if this call performed the renewal.
	///
	/// Concurrent callers serialize on the credential's lock and re-check the due condition
	/// once they hold it, so only the first performs the update. An updater failure leaves the
	/// credential untouched and is returned to the caller; terminal failures also invalidate
	/// the bound [`Session`].
	pub async fn refresh_if_required(&self, mode: RefreshMode) -> Result<bool> {
		if !self.is_refresh_due() {
			return Ok(false);
		}

		let span = RefreshSpan::new(mode, &self.id);

		obs::record_refresh_outcome(mode, RefreshOutcome::Attempt);

		let result = span
			.instrument(async {
				let _singleflight = self.guard.lock().await;

				if !self.is_refresh_due() {
					return Ok(false);
				}

				let update = self.updater.update(self.snapshot()).await.inspect_err(|err| {
					let Some(session) = self.session.as_ref().filter(|_| err.is_terminal()) else {
						return;
					};

					obs_event!(info, credential = self.id.as_str(), "Invalidating session after terminal renewal failure.");

					session.invalidate();
				})?;

				self.install(update, OffsetDateTime::now_utc());

				Ok(true)
			})
			.await;

		match &result {
			Ok(true) => {
				obs_event!(debug, credential = self.id.as_str(), trigger = mode.as_str(), expire_at = %self.expire_at(), "Credential renewed.");
				obs::record_refresh_outcome(mode, RefreshOutcome::Refreshed);
			},
			Ok(false) => obs::record_refresh_outcome(mode, RefreshOutcome::Skipped),
			Err(_) => obs::record_refresh_outcome(mode, RefreshOutcome::Failure),
		}

		result
	}

	/// Acquires the credential's refresh lock; registration shares it.
	pub(crate) async fn lock(&self) -> async_lock::MutexGuard<'_, ()> {
		self.guard.lock().await
	}

	fn install(&self, update: CredentialUpdate, now: OffsetDateTime) {
		let window = self.buffer.window(now, update.claims.expires_at);
		let state = CredentialState {
			id: self.id.clone(),
			material: update.material,
			claims: update.claims,
			installed_at: now,
		};

		*self.state.write() = Arc::new(state);

		self.expire_at.store(window.expire_at);
		self.expire_with_buffer_at.store(window.expire_with_buffer_at);
	}
}
impl Debug for RefreshableCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshableCredential")
			.field("id", &self.id)
			.field("expire_at", &self.expire_at())
			.field("expire_with_buffer_at", &self.expire_with_buffer_at())
			.field("has_refresh_condition", &self.refresh_condition.is_some())
			.field("session", &self.session)
			.finish()
	}
}

/// Builder for [`RefreshableCredential`].
pub struct RefreshableCredentialBuilder {
	id: CredentialId,
	updater: Arc<dyn CredentialUpdater>,
	initial: CredentialUpdate,
	buffer: ExpiryBuffer,
	issued_at: Option<OffsetDateTime>,
	refresh_condition: Option<Condition>,
	liveness: Option<Condition>,
	session: Option<Session>,
}
impl RefreshableCredentialBuilder {
	fn new(
		id: CredentialId,
		updater: Arc<dyn CredentialUpdater>,
		initial: CredentialUpdate,
	) -> Self {
		Self {
			id,
			updater,
			initial,
			buffer: ExpiryBuffer::default(),
			issued_at: None,
			refresh_condition: None,
			liveness: None,
			session: None,
		}
	}

	/// Overrides the expiry buffer policy.
	pub fn buffer(mut self, buffer: ExpiryBuffer) -> Self {
		self.buffer = buffer;

		self
	}

	/// Sets the reference instant used for the initial buffer (defaults to now).
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Adds a predicate that must also hold for renewal to be due.
	pub fn refresh_condition(
		mut self,
		condition: impl 'static + Fn() -> bool + Send + Sync,
	) -> Self {
		self.refresh_condition = Some(Arc::new(condition));

		self
	}

	/// Sets the liveness capability consulted by the scheduler.
	pub fn liveness(mut self, liveness: impl 'static + Fn() -> bool + Send + Sync) -> Self {
		self.liveness = Some(Arc::new(liveness));

		self
	}

	/// Binds the credential to an owning session.
	pub fn session(mut self, session: Session) -> Self {
		self.session = Some(session);

		self
	}

	/// Consumes the builder and produces a shareable credential.
	pub fn build(self) -> Arc<RefreshableCredential> {
		let now = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let window = self.buffer.window(now, self.initial.claims.expires_at);
		let state = CredentialState {
			id: self.id.clone(),
			material: self.initial.material,
			claims: self.initial.claims,
			installed_at: now,
		};

		Arc::new(RefreshableCredential {
			id: self.id,
			state: RwLock::new(Arc::new(state)),
			expire_at: AtomicInstant::new(window.expire_at),
			expire_with_buffer_at: AtomicInstant::new(window.expire_with_buffer_at),
			buffer: self.buffer,
			updater: self.updater,
			refresh_condition: self.refresh_condition,
			liveness: self.liveness,
			session: self.session,
			guard: AsyncMutex::new(()),
		})
	}
}
impl Debug for RefreshableCredentialBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshableCredentialBuilder")
			.field("id", &self.id)
			.field("buffer", &self.buffer)
			.field("issued_at", &self.issued_at)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
	// crates.io
	use time::macros;
	// self
	use super::*;

	const NOW: OffsetDateTime = macros::datetime!(2025-06-01 12:00 UTC);

	fn failing_updater() -> Arc<dyn CredentialUpdater> {
		UpdaterFn::new(|_| async { Err(Error::update("unreachable in these tests")) })
	}

	fn credential(expires_in: Duration) -> RefreshableCredentialBuilder {
		RefreshableCredential::builder(
			CredentialId::new("unit").expect("Credential fixture should be valid."),
			failing_updater(),
			CredentialUpdate::new(TokenMaterial::new("access"), Claims::new(NOW + expires_in)),
		)
		.issued_at(NOW)
	}

	#[test]
	fn build_derives_buffered_expiry() {
		let credential = credential(Duration::seconds(60)).build();

		assert_eq!(credential.expire_at(), NOW + Duration::seconds(60));
		assert_eq!(credential.expire_with_buffer_at(), NOW + Duration::seconds(54));
		assert!(!credential.is_refresh_due_at(NOW + Duration::seconds(53)));
		assert!(credential.is_refresh_due_at(NOW + Duration::seconds(54)));
	}

	#[test]
	fn refresh_condition_gates_due_check() {
		let allowed = Arc::new(AtomicBool::new(false));
		let flag = allowed.clone();
		let credential = credential(Duration::seconds(20))
			.refresh_condition(move || flag.load(Ordering::SeqCst))
			.build();
		let later = NOW + Duration::seconds(19);

		assert!(!credential.is_refresh_due_at(later));

		allowed.store(true, Ordering::SeqCst);

		assert!(credential.is_refresh_due_at(later));
	}

	#[test]
	fn liveness_prefers_explicit_capability_over_session() {
		let session = Session::new();
		let credential = credential(Duration::minutes(5)).session(session.clone()).build();

		assert!(credential.is_active());

		session.invalidate();

		assert!(!credential.is_active());

		let pinned = credential_with_liveness();

		assert!(pinned.is_active());
	}

	fn credential_with_liveness() -> Arc<RefreshableCredential> {
		let session = Session::new();

		session.invalidate();

		credential(Duration::minutes(5)).session(session).liveness(|| true).build()
	}

	#[tokio::test]
	async fn not_due_short_circuits_without_calling_updater() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = calls.clone();
		let updater = UpdaterFn::new(move |_| {
			counter.fetch_add(1, Ordering::SeqCst);

			async { Err(Error::update("should not run")) }
		});
		let credential = RefreshableCredential::builder(
			CredentialId::new("fresh").expect("Credential fixture should be valid."),
			updater,
			CredentialUpdate::new(TokenMaterial::new("access"), Claims::expiring_in(Duration::hours(1))),
		)
		.build();

		assert!(!credential.refresh_if_required(RefreshMode::JustInTime).await.expect("Not due."));
		assert_eq!(calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn install_recomputes_buffer_from_new_reference_instant() {
		let updater = UpdaterFn::new(|current: Arc<CredentialState>| {
			let material = TokenMaterial::new("rotated").retain_refresh_token(&current.material);

			async move { Ok(CredentialUpdate::new(material, Claims::expiring_in(Duration::seconds(30)))) }
		});
		let credential = RefreshableCredential::builder(
			CredentialId::new("expired").expect("Credential fixture should be valid."),
			updater,
			CredentialUpdate::new(
				TokenMaterial::new("stale").with_refresh_token("keep-me"),
				Claims::new(NOW),
			),
		)
		.issued_at(NOW)
		.build();

		assert!(credential.refresh_if_required(RefreshMode::Eager).await.expect("Refresh succeeds."));

		let snapshot = credential.snapshot();
		let remaining = credential.expire_at() - credential.expire_with_buffer_at();

		assert_eq!(snapshot.material.access_token.expose(), "rotated");
		assert_eq!(snapshot.material.refresh_token.as_ref().map(|s| s.expose()), Some("keep-me"));
		assert!(remaining <= Duration::seconds(3) && remaining > Duration::seconds(2));
		assert!(!credential.is_refresh_due());
	}
}
