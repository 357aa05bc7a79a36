//! SQL-based storage implementation for conference documents

use super::super::model::{
    Conference, ConnectionMeta, HistoryEvent, Member, MemberKind, MemberStatus, Timestamps,
};
use super::super::store::{ConferenceStore, StoreError};
use super::super::types::{ConferenceId, MemberId, Timestamp};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQL-based conference store
///
/// All cross-request coordination goes through this store; SQLite
/// serializes concurrent writers and the revision column detects lost
/// updates on member appends.
pub struct ConferenceSqlStore {
    pool: Pool<SqliteConnectionManager>,
}

impl ConferenceSqlStore {
    /// Create a store over an existing connection pool, running any
    /// pending migrations.
    pub fn new(pool: Pool<SqliteConnectionManager>) -> Result<Self, rusqlite::Error> {
        super::migrations::migrate(&pool)?;
        Ok(Self { pool })
    }

    /// Open (or create) a file-backed store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
        });
        let pool = Pool::new(manager)?;
        Ok(Self::new(pool)?)
    }

    /// Create an in-memory store for testing.
    ///
    /// The pool is pinned to a single connection: every pooled `:memory:`
    /// connection would otherwise be a distinct database.
    pub fn memory() -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON"));
        let pool = Pool::builder().max_size(1).build(manager)?;
        Ok(Self::new(pool)?)
    }

    /// Load a full conference document on an existing connection.
    ///
    /// Used both standalone and inside write transactions, so it takes the
    /// connection rather than pulling one from the pool.
    fn read_conference(
        conn: &Connection,
        id: &ConferenceId,
    ) -> Result<Option<Conference>, StoreError> {
        let header = conn
            .query_row(
                "SELECT active, created_from, schema_version, revision, created_at, updated_at
                 FROM conferences WHERE id = ?",
                params![id.as_str()],
                |row| {
                    Ok(Conference {
                        id: id.clone(),
                        active: row.get::<_, i64>(0)? != 0,
                        created_from: row.get(1)?,
                        members: Vec::new(),
                        history: Vec::new(),
                        schema_version: row.get(2)?,
                        timestamps: Timestamps {
                            created: Timestamp::from_millis(row.get::<_, i64>(4)?.max(0) as u64),
                            updated: row
                                .get::<_, Option<i64>>(5)?
                                .map(|ms| Timestamp::from_millis(ms.max(0) as u64)),
                        },
                        revision: row.get(3)?,
                    })
                },
            )
            .optional()?;

        let mut conference = match header {
            Some(conference) => conference,
            None => return Ok(None),
        };

        let mut stmt = conn.prepare(
            "SELECT member_id, display_name, object_type, status, user_agent, joined_at
             FROM conference_members WHERE conference_id = ? ORDER BY seq",
        )?;
        conference.members = stmt
            .query_map(params![id.as_str()], |row| {
                let _object_type: String = row.get(2)?;
                let status: Option<String> = row.get(3)?;
                Ok(Member {
                    id: MemberId::new(row.get::<_, String>(0)?),
                    display_name: row.get(1)?,
                    // Single classification on this surface; the CHECK
                    // constraint keeps the column honest.
                    kind: MemberKind::Anonymous,
                    status: status.map(|_| MemberStatus::Online),
                    connection: ConnectionMeta::new(row.get(4)?),
                    joined_at: Timestamp::from_millis(row.get::<_, i64>(5)?.max(0) as u64),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT event, occurred_at FROM conference_history
             WHERE conference_id = ? ORDER BY seq",
        )?;
        conference.history = stmt
            .query_map(params![id.as_str()], |row| {
                Ok(HistoryEvent {
                    event: row.get(0)?,
                    occurred_at: Timestamp::from_millis(row.get::<_, i64>(1)?.max(0) as u64),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(conference))
    }

    fn insert_member(
        conn: &Connection,
        id: &ConferenceId,
        seq: i64,
        member: &Member,
    ) -> Result<(), StoreError> {
        conn.execute(
            "INSERT INTO conference_members
                (conference_id, seq, member_id, display_name, object_type, status, user_agent, joined_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id.as_str(),
                seq,
                member.id.as_str(),
                &member.display_name,
                match member.kind {
                    MemberKind::Anonymous => "anonymous",
                },
                member.status.map(|status| match status {
                    MemberStatus::Online => "online",
                }),
                &member.connection.user_agent,
                member.joined_at.as_millis() as i64,
            ],
        )?;
        Ok(())
    }
}

impl ConferenceStore for ConferenceSqlStore {
    fn find_by_id(&self, id: &ConferenceId) -> Result<Option<Conference>, StoreError> {
        let conn = self.pool.get()?;
        Self::read_conference(&conn, id)
    }

    fn find_by_member_token(
        &self,
        token: &str,
    ) -> Result<Option<(Conference, Member)>, StoreError> {
        let conn = self.pool.get()?;

        // A token is resolvable only when it names a member in exactly one
        // conference; LIMIT 2 is enough to detect ambiguity.
        let mut stmt = conn.prepare(
            "SELECT DISTINCT conference_id FROM conference_members WHERE member_id = ? LIMIT 2",
        )?;
        let conference_ids = stmt
            .query_map(params![token], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let conference_id = match conference_ids.as_slice() {
            [only] => ConferenceId::new(only.clone()),
            _ => return Ok(None),
        };

        let conference = match Self::read_conference(&conn, &conference_id)? {
            Some(conference) => conference,
            None => return Ok(None),
        };
        let member = match conference.member(&MemberId::new(token)) {
            Some(member) => member.clone(),
            None => return Ok(None),
        };

        Ok(Some((conference, member)))
    }

    fn create_with_creator(&self, draft: &Conference) -> Result<Conference, StoreError> {
        debug_assert_eq!(draft.members.len(), 1);
        debug_assert_eq!(draft.revision, 0);

        let conn = self.pool.get()?;
        let tx = conn.unchecked_transaction()?;

        let inserted = tx.execute(
            "INSERT INTO conferences (id, active, created_from, schema_version, revision, created_at)
             VALUES (?, ?, ?, ?, 0, ?)
             ON CONFLICT(id) DO NOTHING",
            params![
                draft.id.as_str(),
                draft.active as i64,
                &draft.created_from,
                draft.schema_version,
                draft.timestamps.created.as_millis() as i64,
            ],
        )?;

        if inserted == 1 {
            Self::insert_member(&tx, &draft.id, 0, draft.creator())?;
            tx.commit()?;
        } else {
            // Lost race: another writer owns the id. Roll back to discard
            // the draft; the caller observes the winner's document below.
            drop(tx);
        }

        Self::read_conference(&conn, &draft.id)?
            .ok_or(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    fn append_member(
        &self,
        id: &ConferenceId,
        member: &Member,
        expected_revision: i64,
    ) -> Result<Conference, StoreError> {
        let conn = self.pool.get()?;
        let tx = conn.unchecked_transaction()?;

        let now = Timestamp::now().as_millis() as i64;
        let updated = tx.execute(
            "UPDATE conferences SET revision = revision + 1, updated_at = ?
             WHERE id = ? AND revision = ?",
            params![now, id.as_str(), expected_revision],
        )?;
        if updated == 0 {
            // Another writer advanced the revision (or the conference is
            // gone); the open transaction is dropped without writing.
            return Err(StoreError::RevisionConflict);
        }

        let seq: i64 = tx.query_row(
            "SELECT COUNT(*) FROM conference_members WHERE conference_id = ?",
            params![id.as_str()],
            |row| row.get(0),
        )?;
        Self::insert_member(&tx, id, seq, member)?;

        tx.commit()?;

        Self::read_conference(&conn, id)?
            .ok_or(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    fn set_active(
        &self,
        id: &ConferenceId,
        active: bool,
    ) -> Result<Option<Conference>, StoreError> {
        let conn = self.pool.get()?;
        let tx = conn.unchecked_transaction()?;

        let current: Option<bool> = tx
            .query_row(
                "SELECT active FROM conferences WHERE id = ?",
                params![id.as_str()],
                |row| Ok(row.get::<_, i64>(0)? != 0),
            )
            .optional()?;

        match current {
            None => return Ok(None),
            Some(state) if state == active => {
                // Already in the requested state; not a mutation.
                drop(tx);
                return Self::read_conference(&conn, id);
            }
            Some(_) => {}
        }

        let now = Timestamp::now().as_millis() as i64;
        tx.execute(
            "UPDATE conferences SET active = ?, revision = revision + 1, updated_at = ?
             WHERE id = ?",
            params![active as i64, now, id.as_str()],
        )?;

        let seq: i64 = tx.query_row(
            "SELECT COUNT(*) FROM conference_history WHERE conference_id = ?",
            params![id.as_str()],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO conference_history (conference_id, seq, event, occurred_at)
             VALUES (?, ?, ?, ?)",
            params![
                id.as_str(),
                seq,
                if active { "reopened" } else { "closed" },
                now
            ],
        )?;

        tx.commit()?;

        Self::read_conference(&conn, id)
    }
}
