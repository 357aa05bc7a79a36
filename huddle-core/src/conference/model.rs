//! Conference and Member data structures

use super::types::{ConferenceId, MemberId, Timestamp};
use serde::{Deserialize, Serialize};

/// Document schema version stamped on every conference at creation.
///
/// Write-once; migrations of persisted documents key off this value.
pub const CONFERENCE_SCHEMA_VERSION: i32 = 1;

/// Display name given to members that did not supply one
pub const DEFAULT_DISPLAY_NAME: &str = "anonymous";

/// Provenance tag for conferences created through the HTTP surface
pub const CREATED_FROM_WEB: &str = "web";

/// A Conference is a meeting-room aggregate holding membership and
/// lifecycle state.
///
/// A conference is never persisted empty: the first member is always the
/// creator, inserted atomically with the document itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conference {
    /// Unique identifier (client-supplied room name or generated)
    pub id: ConferenceId,

    /// Whether the conference is reachable; cleared only by an explicit close
    pub active: bool,

    /// Creation channel provenance tag, write-once (e.g. "web")
    pub created_from: String,

    /// Members in join order; the first entry is the creator
    pub members: Vec<Member>,

    /// Append-only lifecycle events
    pub history: Vec<HistoryEvent>,

    /// Document schema version, fixed at creation
    pub schema_version: i32,

    /// Creation/update times
    pub timestamps: Timestamps,

    /// Optimistic-concurrency token; +1 per successful mutating write
    pub revision: i64,
}

impl Conference {
    /// Create a new conference document seeded with its creator member.
    ///
    /// The returned document has revision 0 and has not been persisted.
    pub fn new(id: ConferenceId, created_from: impl Into<String>, creator: Member) -> Self {
        Conference {
            id,
            active: true,
            created_from: created_from.into(),
            members: vec![creator],
            history: Vec::new(),
            schema_version: CONFERENCE_SCHEMA_VERSION,
            timestamps: Timestamps {
                created: Timestamp::now(),
                updated: None,
            },
            revision: 0,
        }
    }

    /// The creator is always the first member in join order.
    pub fn creator(&self) -> &Member {
        &self.members[0]
    }

    /// Look up a member by id
    pub fn member(&self, id: &MemberId) -> Option<&Member> {
        self.members.iter().find(|m| &m.id == id)
    }

    pub fn contains_member(&self, id: &MemberId) -> bool {
        self.member(id).is_some()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

/// Creation/update timestamps; `created` is write-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timestamps {
    pub created: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<Timestamp>,
}

/// One participant's identity and status within a Conference
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// Unique within the owning conference; also the member's access token
    pub id: MemberId,

    pub display_name: String,

    /// Participant classification tag
    #[serde(rename = "objectType")]
    pub kind: MemberKind,

    /// Lifecycle marker; absent for the creator at creation time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MemberStatus>,

    /// Client metadata captured at join time
    pub connection: ConnectionMeta,

    pub joined_at: Timestamp,
}

/// Participant classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    /// Display-name-only participant; the only kind admitted on this surface
    Anonymous,
}

/// Member lifecycle marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Online,
}

/// Client connection metadata captured when a member joins
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl ConnectionMeta {
    pub fn new(user_agent: Option<String>) -> Self {
        ConnectionMeta { user_agent }
    }
}

/// An append-only lifecycle event on a conference
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEvent {
    pub event: String,
    pub occurred_at: Timestamp,
}

/// Input for admitting a member; optional fields are defaulted when the
/// member record is materialized.
#[derive(Debug, Clone)]
pub struct MemberSpec {
    pub id: Option<MemberId>,
    pub display_name: Option<String>,
    pub status: Option<MemberStatus>,
    pub connection: ConnectionMeta,
}

impl MemberSpec {
    /// Spec for a conference creator: no status marker.
    pub fn creator(display_name: Option<String>, connection: ConnectionMeta) -> Self {
        MemberSpec {
            id: None,
            display_name,
            status: None,
            connection,
        }
    }

    /// Spec for a later joiner: marked online on admission.
    pub fn joiner(display_name: Option<String>, connection: ConnectionMeta) -> Self {
        MemberSpec {
            id: None,
            display_name,
            status: Some(MemberStatus::Online),
            connection,
        }
    }

    pub fn with_id(mut self, id: MemberId) -> Self {
        self.id = Some(id);
        self
    }

    /// Build the member record, applying defaults.
    ///
    /// Defaults are applied here, before persistence, so the stored record
    /// and everything derived from it agree.
    pub fn materialize(self, joined_at: Timestamp) -> Member {
        Member {
            id: self.id.unwrap_or_else(MemberId::generate),
            display_name: self
                .display_name
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
            kind: MemberKind::Anonymous,
            status: self.status,
            connection: self.connection,
            joined_at,
        }
    }
}
