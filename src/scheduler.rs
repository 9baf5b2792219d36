//! Process-wide scheduler that renews registered credentials shortly before they expire.
//!
//! Credentials sit in a [`WaitSet`] ordered by their buffered expiry. One background tokio
//! task takes the earliest due entry (or wakes after [`SchedulerConfig::poll_interval`] to
//! observe shutdown), renews it through [`RefreshableCredential::refresh_if_required`], and
//! registers it again with its new expiry. A failure is logged and leaves the credential
//! unregistered; the worker itself keeps running. Request paths can still renew a credential
//! synchronously at any time, and the per-credential lock keeps both paths consistent.

mod config;
mod metrics;
mod wait_set;

pub use config::SchedulerConfig;
pub use metrics::RefreshMetrics;
pub use wait_set::Schedule;

// std
use std::sync::{
	OnceLock,
	atomic::{AtomicBool, Ordering},
};
// crates.io
use tokio::{runtime::Handle, sync::Notify, task::JoinHandle};
// self
use crate::{
	_prelude::*,
	auth::CredentialId,
	credential::{RefreshMode, RefreshableCredential},
	error::SchedulerError,
	obs::{self, RefreshOutcome, obs_event},
	scheduler::wait_set::{WaitEntry, WaitSet},
};

static GLOBAL: OnceLock<RefreshScheduler> = OnceLock::new();

/// Handle to a refresh scheduler. Clones share the same wait set and worker.
#[derive(Clone, Debug)]
pub struct RefreshScheduler(Arc<Inner>);
impl RefreshScheduler {
	/// Creates an independent scheduler. Most processes use [`global`](Self::global) instead.
	pub fn new(config: SchedulerConfig) -> Self {
		Self(Arc::new(Inner {
			config,
			wait_set: Mutex::new(WaitSet::default()),
			wake: Notify::new(),
			shutting_down: AtomicBool::new(false),
			worker: Mutex::new(None),
			metrics: RefreshMetrics::default(),
		}))
	}

	/// Returns the process-wide scheduler, created with [`SchedulerConfig::default`] on first use.
	pub fn global() -> &'static RefreshScheduler {
		GLOBAL.get_or_init(|| RefreshScheduler::new(SchedulerConfig::default()))
	}

	/// Active configuration.
	pub fn config(&self) -> &SchedulerConfig {
		&self.0.config
	}

	/// Worker counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.0.metrics
	}

	/// Spawns the background worker on the current tokio runtime.
	///
	/// A worker that has already exited (e.g., after a panic) may be started again.
	pub fn start(&self) -> Result<(), SchedulerError> {
		if self.is_shut_down() {
			return Err(SchedulerError::ShutDown);
		}

		let runtime = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
		let mut worker = self.0.worker.lock();

		if worker.as_ref().is_some_and(|handle| !handle.is_finished()) {
			return Err(SchedulerError::AlreadyStarted);
		}

		*worker = Some(runtime.spawn(Inner::run(self.0.clone())));

		Ok(())
	}

	/// Shuts the scheduler down: later registrations are ignored, queued entries are discarded,
	/// and the worker is terminated. Renewals already running on other tasks are not cancelled.
	pub fn stop(&self) {
		self.0.shutting_down.store(true, Ordering::Release);
		self.0.wait_set.lock().clear();
		self.0.wake.notify_waiters();

		if let Some(handle) = self.0.worker.lock().take() {
			handle.abort();
		}

		obs_event!(info, "Refresh scheduler stopped.");
	}

	/// Returns `true` while the worker task is alive.
	pub fn is_running(&self) -> bool {
		self.0.worker.lock().as_ref().is_some_and(|handle| !handle.is_finished())
	}

	/// Returns `true` once [`stop`](Self::stop) has been called.
	pub fn is_shut_down(&self) -> bool {
		self.0.is_shutting_down()
	}

	/// Queues `credential` for renewal at its current buffered expiry.
	///
	/// Registering an id that is already queued replaces the stale entry. No-op after shutdown.
	pub async fn register(&self, credential: &Arc<RefreshableCredential>) {
		let _guard = credential.lock().await;

		self.0.insert(credential, None);
	}

	/// Removes `credential` from the queue if present.
	pub async fn remove(&self, credential: &RefreshableCredential) {
		let _guard = credential.lock().await;

		if self.0.wait_set.lock().remove(credential.id()).is_some() {
			obs_event!(debug, credential = credential.id().as_str(), "Credential unregistered.");
		}
	}

	/// Renews `credential` now if due and, when this call renewed it, registers it with its
	/// new expiry.
	///
	/// Errors are returned to the caller and leave the scheduler untouched.
	pub async fn refresh_now(
		&self,
		credential: &Arc<RefreshableCredential>,
		mode: RefreshMode,
	) -> Result<bool> {
		let refreshed = credential.refresh_if_required(mode).await?;

		if refreshed {
			self.register(credential).await;
		}

		Ok(refreshed)
	}

	/// Number of queued credentials.
	pub fn len(&self) -> usize {
		self.0.wait_set.lock().len()
	}

	/// Returns `true` if no credential is queued.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Returns `true` if a credential with `id` is queued.
	pub fn contains(&self, id: &CredentialId) -> bool {
		self.0.wait_set.lock().contains(id)
	}

	/// Returns the timestamps captured when `id` was queued.
	pub fn schedule_of(&self, id: &CredentialId) -> Option<Schedule> {
		self.0.wait_set.lock().schedule_of(id)
	}

	/// Earliest instant at which a queued credential becomes due.
	pub fn next_due_at(&self) -> Option<OffsetDateTime> {
		self.0.wait_set.lock().next_due_at()
	}
}

#[derive(Debug)]
struct Inner {
	config: SchedulerConfig,
	wait_set: Mutex<WaitSet>,
	wake: Notify,
	shutting_down: AtomicBool,
	worker: Mutex<Option<JoinHandle<()>>>,
	metrics: RefreshMetrics,
}
impl Inner {
	fn is_shutting_down(&self) -> bool {
		self.shutting_down.load(Ordering::Acquire)
	}

	/// Caller must hold the credential's lock.
	fn insert(&self, credential: &Arc<RefreshableCredential>, not_before: Option<OffsetDateTime>) {
		let expire_with_buffer_at = credential.expire_with_buffer_at();
		let schedule = Schedule {
			expire_at: credential.expire_at(),
			expire_with_buffer_at,
			due_at: not_before
				.map_or(expire_with_buffer_at, |instant| instant.max(expire_with_buffer_at)),
		};
		let mut wait_set = self.wait_set.lock();

		// Checked under the wait-set lock so `stop` cannot clear between check and insert.
		if self.is_shutting_down() {
			return;
		}

		let wakes_worker = wait_set.next_due_at().is_none_or(|next| schedule.due_at < next);

		wait_set.upsert(credential.clone(), schedule);

		drop(wait_set);

		if wakes_worker {
			self.wake.notify_one();
		}

		obs_event!(debug, credential = credential.id().as_str(), due_at = %schedule.due_at, "Credential registered.");
	}

	async fn run(self: Arc<Self>) {
		obs_event!(info, poll_interval = ?self.config.poll_interval, "Refresh scheduler worker started.");

		while !self.is_shutting_down() {
			if let Some(entry) = self.take_next().await {
				self.process(entry).await;
			}
		}

		obs_event!(info, "Refresh scheduler worker exiting.");
	}

	/// Pops the earliest due entry, or waits until it is due, a registration lands, or the
	/// poll interval elapses.
	async fn take_next(&self) -> Option<WaitEntry> {
		let woken = self.wake.notified();
		let wait = {
			let mut wait_set = self.wait_set.lock();
			let now = OffsetDateTime::now_utc();

			if let Some(entry) = wait_set.pop_due(now) {
				return Some(entry);
			}

			match wait_set.next_due_at() {
				Some(due_at) => (due_at - now).unsigned_abs().min(self.config.poll_interval),
				None => self.config.poll_interval,
			}
		};
		let _ = tokio::time::timeout(wait, woken).await;

		None
	}

	async fn process(&self, entry: WaitEntry) {
		let credential = entry.credential;

		if !credential.is_active() {
			self.metrics.record_dropped();
			obs::record_refresh_outcome(RefreshMode::Eager, RefreshOutcome::Dropped);
			obs_event!(debug, credential = credential.id().as_str(), "Dropping inactive credential.");

			return;
		}

		self.metrics.record_attempt();

		// Renewal runs on its own task so a panicking updater cannot take the worker down.
		let renewal = {
			let credential = credential.clone();

			tokio::spawn(async move { credential.refresh_if_required(RefreshMode::Eager).await })
		};

		match renewal.await {
			Ok(Ok(refreshed)) => {
				if refreshed {
					self.metrics.record_refreshed();
				} else {
					self.metrics.record_skipped();
				}

				let _guard = credential.lock().await;
				let now = OffsetDateTime::now_utc();
				let not_before = (credential.expire_with_buffer_at() <= now)
					.then(|| now + self.config.suppressed_retry_delay);

				self.insert(&credential, not_before);
			},
			Ok(Err(e)) => {
				self.metrics.record_failure();
				obs_event!(
					warn,
					credential = credential.id().as_str(),
					error = %e,
					terminal = e.is_terminal(),
					"Eager renewal failed; credential left unregistered."
				);

				#[cfg(not(feature = "tracing"))]
				let _ = e;
			},
			Err(e) => {
				self.metrics.record_failure();
				obs_event!(error, credential = credential.id().as_str(), error = %e, "Eager renewal task aborted.");

				#[cfg(not(feature = "tracing"))]
				let _ = e;
			},
		}
	}
}
