//! Client-held identity descriptors

use super::model::Member;
use super::types::MemberId;
use serde::{Deserialize, Serialize};

/// The minimal data needed to reconstruct "who the current request belongs
/// to" on subsequent requests.
///
/// Handed to the boundary for cookie emission; the serialized form carries
/// `id` and `displayName`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityDescriptor {
    pub id: MemberId,
    pub display_name: String,
}

/// Project a resolved member into its identity descriptor.
///
/// Pure projection, called once per successfully resolved request with the
/// final persisted member state — never a pre-persistence draft.
pub fn issue(member: &Member) -> IdentityDescriptor {
    IdentityDescriptor {
        id: member.id.clone(),
        display_name: member.display_name.clone(),
    }
}
