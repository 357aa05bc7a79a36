//! Membership resolution for inbound requests
//!
//! Every request is resolved independently against the durable store; the
//! resolver holds no cross-request state. The store is an injected
//! capability, never an ambient dependency.

use super::model::{Conference, ConnectionMeta, Member, MemberSpec, CREATED_FROM_WEB};
use super::policy;
use super::store::{ConferenceStore, StoreError};
use super::types::{ConferenceId, Timestamp};
use std::sync::Arc;
use tracing::{debug, warn};

/// Attempts per room resolution before giving up on optimistic races
const MAX_RESOLVE_ATTEMPTS: usize = 3;

/// Resolution errors
///
/// Everything a caller can observe collapses to these two kinds; a bad
/// token and a bad room id are deliberately indistinguishable.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Token unresolvable, or the conference is not reachable
    #[error("conference not found")]
    NotFound,

    /// The store failed, or an optimistic race outlasted its retry budget
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// A successfully resolved request: the target conference and the acting
/// member, both in their final persisted state.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub conference: Conference,
    pub member: Member,
}

/// Resolves identity hints (room id, member token, display name) to a
/// conference and acting member, creating rooms and admitting members as
/// required.
pub struct MembershipResolver {
    store: Arc<dyn ConferenceStore>,
}

impl MembershipResolver {
    pub fn new(store: Arc<dyn ConferenceStore>) -> Self {
        Self { store }
    }

    /// Token-addressed lookup: return to an existing identity.
    ///
    /// Read-only. An unknown or ambiguous token, or a closed conference,
    /// is a terminal `NotFound`; no conference is ever created here.
    pub fn resolve_token(&self, token: &str) -> Result<Resolution, ResolveError> {
        let (conference, member) = self
            .store
            .find_by_member_token(token)?
            .ok_or(ResolveError::NotFound)?;

        if !policy::is_reachable(&conference) {
            debug!(conference = %conference.id, "token resolved to a closed conference");
            metrics::counter!("huddle_resolutions_total", "outcome" => "not_found").increment(1);
            return Err(ResolveError::NotFound);
        }

        metrics::counter!("huddle_resolutions_total", "outcome" => "token").increment(1);
        Ok(Resolution { conference, member })
    }

    /// Room-addressed lookup: create the room or join it.
    ///
    /// Every visit to a room URL is a new join; returning to an existing
    /// identity goes through `resolve_token`. Optimistic races (lost
    /// creates, concurrent appends) are retried a bounded number of times.
    pub fn resolve_room(
        &self,
        room: &ConferenceId,
        display_name: Option<String>,
        connection: ConnectionMeta,
    ) -> Result<Resolution, ResolveError> {
        for attempt in 0..MAX_RESOLVE_ATTEMPTS {
            match self.store.find_by_id(room)? {
                None => {
                    let creator = MemberSpec::creator(display_name.clone(), connection.clone())
                        .materialize(Timestamp::now());
                    let creator_id = creator.id.clone();
                    let draft = Conference::new(room.clone(), CREATED_FROM_WEB, creator);

                    let persisted = self.store.create_with_creator(&draft)?;
                    if let Some(member) = persisted.member(&creator_id) {
                        debug!(conference = %room, member = %member.id, "conference created");
                        metrics::counter!("huddle_resolutions_total", "outcome" => "created")
                            .increment(1);
                        return Ok(Resolution {
                            member: member.clone(),
                            conference: persisted,
                        });
                    }

                    // Lost the create race; the winner's document came
                    // back. Re-resolve and join it.
                    debug!(conference = %room, attempt, "create raced, joining instead");
                }
                Some(conference) => {
                    if !policy::is_reachable(&conference) {
                        metrics::counter!("huddle_resolutions_total", "outcome" => "not_found")
                            .increment(1);
                        return Err(ResolveError::NotFound);
                    }

                    let joiner = MemberSpec::joiner(display_name.clone(), connection.clone())
                        .materialize(Timestamp::now());
                    match self.store.append_member(room, &joiner, conference.revision) {
                        Ok(updated) => {
                            debug_assert!(updated.contains_member(&joiner.id));
                            metrics::counter!("huddle_resolutions_total", "outcome" => "joined")
                                .increment(1);
                            // The store persists the member verbatim, so the
                            // materialized record is the persisted state.
                            return Ok(Resolution {
                                conference: updated,
                                member: joiner,
                            });
                        }
                        Err(StoreError::RevisionConflict) => {
                            debug!(conference = %room, attempt, "append raced, retrying");
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
            }
        }

        warn!(conference = %room, attempts = MAX_RESOLVE_ATTEMPTS, "room resolution retry budget exhausted");
        Err(ResolveError::Store(StoreError::RevisionConflict))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conference::model::MemberStatus;
    use crate::conference::storage::ConferenceSqlStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn resolver() -> MembershipResolver {
        MembershipResolver::new(Arc::new(ConferenceSqlStore::memory().unwrap()))
    }

    fn connection() -> ConnectionMeta {
        ConnectionMeta::new(Some("test-agent/1.0".to_string()))
    }

    #[test]
    fn test_unknown_room_creates_conference_with_creator() {
        let resolver = resolver();
        let resolution = resolver
            .resolve_room(&ConferenceId::new("123456789"), None, connection())
            .unwrap();

        assert_eq!(resolution.conference.id, ConferenceId::new("123456789"));
        assert!(resolution.conference.active);
        assert_eq!(resolution.conference.created_from, "web");
        assert_eq!(resolution.conference.revision, 0);
        assert_eq!(resolution.conference.member_count(), 1);
        assert!(resolution.conference.history.is_empty());

        // The acting member is the creator: anonymous, no status
        assert_eq!(resolution.member.display_name, "anonymous");
        assert!(resolution.member.status.is_none());
        assert_eq!(
            resolution.member.connection.user_agent.as_deref(),
            Some("test-agent/1.0")
        );
    }

    #[test]
    fn test_display_name_hint_propagates() {
        let resolver = resolver();
        let resolution = resolver
            .resolve_room(
                &ConferenceId::new("123456789"),
                Some("aGuy".to_string()),
                connection(),
            )
            .unwrap();
        assert_eq!(resolution.member.display_name, "aGuy");
        assert_eq!(resolution.conference.creator().display_name, "aGuy");
    }

    #[test]
    fn test_existing_room_appends_online_member() {
        let store = Arc::new(ConferenceSqlStore::memory().unwrap());
        let resolver = MembershipResolver::new(store);

        let first = resolver
            .resolve_room(
                &ConferenceId::new("room"),
                Some("FooBar".to_string()),
                connection(),
            )
            .unwrap();
        let second = resolver
            .resolve_room(
                &ConferenceId::new("room"),
                Some("aGuy".to_string()),
                connection(),
            )
            .unwrap();

        assert_eq!(second.conference.member_count(), 2);
        assert_eq!(second.conference.revision, 1);
        assert_eq!(second.member.display_name, "aGuy");
        assert_eq!(second.member.status, Some(MemberStatus::Online));

        // The creator is untouched
        let creator = second.conference.creator();
        assert_eq!(creator.id, first.member.id);
        assert_eq!(creator.display_name, "FooBar");
        assert!(creator.status.is_none());
    }

    #[test]
    fn test_room_addressing_always_appends() {
        let resolver = resolver();
        let room = ConferenceId::new("room");

        resolver
            .resolve_room(&room, Some("aGuy".to_string()), connection())
            .unwrap();
        let again = resolver
            .resolve_room(&room, Some("aGuy".to_string()), connection())
            .unwrap();

        // Same display name is a new member; identity reuse is token-only
        assert_eq!(again.conference.member_count(), 2);
        assert_ne!(again.member.id, again.conference.creator().id);
    }

    #[test]
    fn test_token_resolves_creator_without_mutation() {
        let resolver = resolver();
        let created = resolver
            .resolve_room(
                &ConferenceId::new("room"),
                Some("FooBar".to_string()),
                connection(),
            )
            .unwrap();

        let token = created.member.id.as_str().to_string();
        let resolved = resolver.resolve_token(&token).unwrap();

        assert_eq!(resolved.conference.id, created.conference.id);
        assert_eq!(resolved.member.id, created.member.id);
        assert_eq!(resolved.member.display_name, "FooBar");
        // No append, no revision bump
        assert_eq!(resolved.conference.member_count(), 1);
        assert_eq!(resolved.conference.revision, 0);
    }

    #[test]
    fn test_unknown_token_is_not_found_and_creates_nothing() {
        let store = Arc::new(ConferenceSqlStore::memory().unwrap());
        let resolver = MembershipResolver::new(store.clone());

        let result = resolver.resolve_token("4fd3d3a0c0a1b2c3d4e5f607");
        assert!(matches!(result, Err(ResolveError::NotFound)));

        // A failed token lookup must not create a conference as a side effect
        assert!(store
            .find_by_id(&ConferenceId::new("4fd3d3a0c0a1b2c3d4e5f607"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_token_to_closed_conference_is_not_found() {
        let store = Arc::new(ConferenceSqlStore::memory().unwrap());
        let resolver = MembershipResolver::new(store.clone());

        let created = resolver
            .resolve_room(&ConferenceId::new("room"), None, connection())
            .unwrap();
        store.set_active(&created.conference.id, false).unwrap();

        let result = resolver.resolve_token(created.member.id.as_str());
        assert!(matches!(result, Err(ResolveError::NotFound)));
    }

    #[test]
    fn test_room_addressing_closed_conference_is_not_found() {
        let store = Arc::new(ConferenceSqlStore::memory().unwrap());
        let resolver = MembershipResolver::new(store.clone());

        let created = resolver
            .resolve_room(&ConferenceId::new("room"), None, connection())
            .unwrap();
        store.set_active(&created.conference.id, false).unwrap();

        let result = resolver.resolve_room(&ConferenceId::new("room"), None, connection());
        assert!(matches!(result, Err(ResolveError::NotFound)));
    }

    /// Store wrapper that forces append races for a while
    struct ContendedStore {
        inner: ConferenceSqlStore,
        conflicts_left: AtomicUsize,
    }

    impl ConferenceStore for ContendedStore {
        fn find_by_id(&self, id: &ConferenceId) -> Result<Option<Conference>, StoreError> {
            self.inner.find_by_id(id)
        }

        fn find_by_member_token(
            &self,
            token: &str,
        ) -> Result<Option<(Conference, Member)>, StoreError> {
            self.inner.find_by_member_token(token)
        }

        fn create_with_creator(&self, draft: &Conference) -> Result<Conference, StoreError> {
            self.inner.create_with_creator(draft)
        }

        fn append_member(
            &self,
            id: &ConferenceId,
            member: &Member,
            expected_revision: i64,
        ) -> Result<Conference, StoreError> {
            if self
                .conflicts_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                    left.checked_sub(1)
                })
                .is_ok()
            {
                return Err(StoreError::RevisionConflict);
            }
            self.inner.append_member(id, member, expected_revision)
        }

        fn set_active(
            &self,
            id: &ConferenceId,
            active: bool,
        ) -> Result<Option<Conference>, StoreError> {
            self.inner.set_active(id, active)
        }
    }

    #[test]
    fn test_append_race_is_retried() {
        let store = Arc::new(ContendedStore {
            inner: ConferenceSqlStore::memory().unwrap(),
            conflicts_left: AtomicUsize::new(1),
        });
        let resolver = MembershipResolver::new(store);
        let room = ConferenceId::new("room");

        resolver.resolve_room(&room, None, connection()).unwrap();
        let joined = resolver
            .resolve_room(&room, Some("aGuy".to_string()), connection())
            .unwrap();

        assert_eq!(joined.conference.member_count(), 2);
        assert_eq!(joined.member.display_name, "aGuy");
    }

    #[test]
    fn test_append_race_retry_budget_is_bounded() {
        let store = Arc::new(ContendedStore {
            inner: ConferenceSqlStore::memory().unwrap(),
            conflicts_left: AtomicUsize::new(usize::MAX),
        });
        let resolver = MembershipResolver::new(store);
        let room = ConferenceId::new("room");

        resolver.resolve_room(&room, None, connection()).unwrap();
        let result = resolver.resolve_room(&room, None, connection());
        assert!(matches!(
            result,
            Err(ResolveError::Store(StoreError::RevisionConflict))
        ));
    }

    #[test]
    fn test_concurrent_room_creation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conferences.db");

        // Three writers: the worst-case race sequence (lost create plus two
        // append conflicts) still fits the resolver's retry budget.
        let handles: Vec<_> = (0..3)
            .map(|i| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let store = Arc::new(ConferenceSqlStore::open(&path).unwrap());
                    MembershipResolver::new(store)
                        .resolve_room(
                            &ConferenceId::new("busy-room"),
                            Some(format!("visitor-{}", i)),
                            ConnectionMeta::default(),
                        )
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let store = ConferenceSqlStore::open(&path).unwrap();
        let persisted = store
            .find_by_id(&ConferenceId::new("busy-room"))
            .unwrap()
            .unwrap();

        // One document, one creator, every other visitor appended
        assert_eq!(persisted.member_count(), 3);
        assert!(persisted.creator().status.is_none());
        assert_eq!(
            persisted
                .members
                .iter()
                .filter(|m| m.status.is_none())
                .count(),
            1
        );
        // Revision advanced once per append
        assert_eq!(persisted.revision, 2);

        // Member ids are unique within the conference
        let mut ids: Vec<_> = persisted.members.iter().map(|m| m.id.clone()).collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }
}
