//! Storage seam for conference documents

use super::model::{Conference, Member};
use super::types::ConferenceId;

/// Storage errors
///
/// `RevisionConflict` is recoverable (re-read and retry); the backend
/// variants mean the store is unavailable for this request.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Optimistic-concurrency check failed; another writer advanced the
    /// document revision first. Nothing was written.
    #[error("conference revision advanced concurrently")]
    RevisionConflict,

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Persistent repository of conference documents.
///
/// Passed into the membership resolver as an explicit capability; nothing
/// in the core reaches for storage through ambient state.
pub trait ConferenceStore: Send + Sync {
    /// Fetch a conference by id.
    fn find_by_id(&self, id: &ConferenceId) -> Result<Option<Conference>, StoreError>;

    /// Resolve a member access token to its conference and member.
    ///
    /// The token must match a member id in exactly one conference; zero or
    /// multiple matches resolve to `None`. A malformed token is simply an
    /// unknown one.
    fn find_by_member_token(
        &self,
        token: &str,
    ) -> Result<Option<(Conference, Member)>, StoreError>;

    /// Atomically persist a freshly built conference document (revision 0,
    /// exactly one member: the creator), or observe the existing document
    /// when another writer created the same id first.
    ///
    /// Find-or-create under the primary-key uniqueness constraint: the
    /// loser of a concurrent create gets the winner's document back (its
    /// draft is discarded, detectable by the absent creator member id).
    fn create_with_creator(&self, draft: &Conference) -> Result<Conference, StoreError>;

    /// Append a member at the given revision.
    ///
    /// Compare-and-swap on the revision column inside one transaction: if
    /// another writer advanced the revision first (or the id is unknown),
    /// nothing is written and `StoreError::RevisionConflict` is returned.
    fn append_member(
        &self,
        id: &ConferenceId,
        member: &Member,
        expected_revision: i64,
    ) -> Result<Conference, StoreError>;

    /// Activate or close a conference.
    ///
    /// This is the explicit lifecycle operation; reachability is never
    /// inferred from inactivity. A state change bumps the revision and
    /// appends a history event; setting the current state again is a no-op.
    /// Returns `None` for an unknown id.
    fn set_active(
        &self,
        id: &ConferenceId,
        active: bool,
    ) -> Result<Option<Conference>, StoreError>;
}
