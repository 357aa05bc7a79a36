//! Conference lifecycle & membership
//!
//! The conference/membership state machine behind the HTTP surface:
//!
//! - **Store** ([`store`], [`storage`]): durable conference documents with
//!   atomic find-or-create and optimistic member appends
//! - **Resolver** ([`resolver`]): maps a request's identity hints (room id
//!   or member token, display name) to a conference and acting member
//! - **Policy** ([`policy`]): reachability gate for closed conferences
//! - **Identity** ([`identity`]): the client-held descriptor handed to the
//!   boundary for cookie emission
//!
//! ## Key Design Principles
//!
//! 1. Every request resolves independently against durable state; no
//!    session stickiness
//! 2. Room-id addressing is always-append; token addressing is the sole
//!    return-to-identity path
//! 3. The store is an injected capability, never ambient state

pub mod identity;
pub mod model;
pub mod policy;
pub mod resolver;
pub mod storage;
pub mod store;
pub mod types;

pub use identity::{issue, IdentityDescriptor};
pub use model::{
    Conference, ConnectionMeta, HistoryEvent, Member, MemberKind, MemberSpec, MemberStatus,
    Timestamps, CONFERENCE_SCHEMA_VERSION, CREATED_FROM_WEB, DEFAULT_DISPLAY_NAME,
};
pub use policy::is_reachable;
pub use resolver::{MembershipResolver, Resolution, ResolveError};
pub use storage::ConferenceSqlStore;
pub use store::{ConferenceStore, StoreError};
pub use types::{ConferenceId, MemberId, Timestamp};
