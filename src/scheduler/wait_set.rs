//! Deadline-ordered wait set with an id index mirroring its membership.

// self
use crate::{_prelude::*, auth::CredentialId, credential::RefreshableCredential};

type Key = (OffsetDateTime, u64);

/// Timestamps captured when a credential entered the wait set.
///
/// The live credential keeps changing as it renews; ordering relies on this immutable copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Schedule {
	/// Hard expiry at registration time.
	pub expire_at: OffsetDateTime,
	/// Buffered expiry at registration time.
	pub expire_with_buffer_at: OffsetDateTime,
	/// Instant the worker will pick the entry up; later than the buffered expiry only when a
	/// retry was deferred.
	pub due_at: OffsetDateTime,
}

#[derive(Debug)]
pub(crate) struct WaitEntry {
	pub(crate) credential: Arc<RefreshableCredential>,
	pub(crate) schedule: Schedule,
}

/// Entries keyed by `(due_at, seq)`; `seq` breaks ties in registration order.
///
/// `index` holds exactly the ids present in `entries`. Both maps are only touched through
/// `&mut self`, so the scheduler's single lock keeps them consistent.
#[derive(Debug, Default)]
pub(crate) struct WaitSet {
	entries: BTreeMap<Key, WaitEntry>,
	index: HashMap<CredentialId, Key>,
	seq: u64,
}
impl WaitSet {
	/// Inserts `credential`, replacing any stale entry with the same id.
	pub(crate) fn upsert(&mut self, credential: Arc<RefreshableCredential>, schedule: Schedule) {
		self.remove(credential.id());

		let key = (schedule.due_at, self.seq);

		self.seq = self.seq.wrapping_add(1);
		self.index.insert(credential.id().clone(), key);
		self.entries.insert(key, WaitEntry { credential, schedule });
	}

	pub(crate) fn remove(&mut self, id: &CredentialId) -> Option<WaitEntry> {
		let key = self.index.remove(id)?;

		self.entries.remove(&key)
	}

	/// Pops the earliest entry if it is due at `now`.
	pub(crate) fn pop_due(&mut self, now: OffsetDateTime) -> Option<WaitEntry> {
		let entry = self.entries.first_entry().filter(|first| first.key().0 <= now)?.remove();

		self.index.remove(entry.credential.id());

		Some(entry)
	}

	pub(crate) fn next_due_at(&self) -> Option<OffsetDateTime> {
		self.entries.first_key_value().map(|((due_at, _), _)| *due_at)
	}

	pub(crate) fn schedule_of(&self, id: &CredentialId) -> Option<Schedule> {
		self.index.get(id).and_then(|key| self.entries.get(key)).map(|entry| entry.schedule)
	}

	pub(crate) fn contains(&self, id: &CredentialId) -> bool {
		self.index.contains_key(id)
	}

	pub(crate) fn len(&self) -> usize {
		self.index.len()
	}

	pub(crate) fn clear(&mut self) {
		self.entries.clear();
		self.index.clear();
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{
		auth::{Claims, TokenMaterial},
		credential::{CredentialUpdate, ExpiryBuffer, UpdaterFn},
	};

	const NOW: OffsetDateTime = macros::datetime!(2025-06-01 12:00 UTC);

	fn credential(id: &str, expires_in: Duration) -> Arc<RefreshableCredential> {
		RefreshableCredential::builder(
			CredentialId::new(id).expect("Credential fixture should be valid."),
			UpdaterFn::new(|_| async { Err(Error::update("not used")) }),
			CredentialUpdate::new(TokenMaterial::new(id), Claims::new(NOW + expires_in)),
		)
		.issued_at(NOW)
		.build()
	}

	fn schedule_of(credential: &RefreshableCredential) -> Schedule {
		Schedule {
			expire_at: credential.expire_at(),
			expire_with_buffer_at: credential.expire_with_buffer_at(),
			due_at: credential.expire_with_buffer_at(),
		}
	}

	fn assert_consistent(set: &WaitSet) {
		assert_eq!(set.entries.len(), set.index.len());

		for (key, entry) in &set.entries {
			assert_eq!(set.index.get(entry.credential.id()), Some(key));
		}
	}

	#[test]
	fn earlier_buffered_expiry_pops_first() {
		let mut set = WaitSet::default();
		let a = credential("a", Duration::seconds(100));
		let b = credential("b", Duration::seconds(20));

		set.upsert(a.clone(), schedule_of(&a));
		set.upsert(b.clone(), schedule_of(&b));

		assert_eq!(set.next_due_at(), Some(NOW + Duration::seconds(18)));
		assert!(set.pop_due(NOW + Duration::seconds(17)).is_none());

		let first = set.pop_due(NOW + Duration::seconds(90)).expect("B should be due.");
		let second = set.pop_due(NOW + Duration::seconds(90)).expect("A should be due.");

		assert_eq!(first.credential.id().as_str(), "b");
		assert_eq!(second.credential.id().as_str(), "a");
		assert_eq!(set.len(), 0);
		assert_consistent(&set);
	}

	#[test]
	fn upsert_replaces_stale_entry() {
		let mut set = WaitSet::default();
		let a = credential("a", Duration::seconds(60));
		let later = Schedule {
			expire_at: NOW + Duration::hours(1),
			expire_with_buffer_at: NOW + Duration::hours(1) - ExpiryBuffer::default().fixed(),
			due_at: NOW + Duration::hours(1) - ExpiryBuffer::default().fixed(),
		};

		set.upsert(a.clone(), schedule_of(&a));
		set.upsert(a.clone(), later);

		assert_eq!(set.len(), 1);
		assert_eq!(set.schedule_of(a.id()), Some(later));
		assert_consistent(&set);
	}

	#[test]
	fn equal_deadlines_keep_registration_order() {
		let mut set = WaitSet::default();
		let first = credential("first", Duration::seconds(30));
		let second = credential("second", Duration::seconds(30));

		set.upsert(first.clone(), schedule_of(&first));
		set.upsert(second.clone(), schedule_of(&second));

		let popped = set.pop_due(NOW + Duration::minutes(1)).expect("Entry should be due.");

		assert_eq!(popped.credential.id().as_str(), "first");
		assert!(!set.contains(first.id()));
		assert!(set.contains(second.id()));
	}

	#[test]
	fn remove_and_clear_keep_index_in_sync() {
		let mut set = WaitSet::default();
		let a = credential("a", Duration::seconds(30));
		let b = credential("b", Duration::seconds(40));

		set.upsert(a.clone(), schedule_of(&a));
		set.upsert(b.clone(), schedule_of(&b));

		assert!(set.remove(a.id()).is_some());
		assert!(set.remove(a.id()).is_none());
		assert_consistent(&set);

		set.clear();

		assert_eq!(set.len(), 0);
		assert_eq!(set.next_due_at(), None);
	}
}
