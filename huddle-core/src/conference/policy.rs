//! Conference reachability policy

use super::model::Conference;

/// A conference is reachable iff it is active.
///
/// Room-addressed resolution always creates active conferences, so this
/// check principally guards token lookups against conferences explicitly
/// closed by the lifecycle operation. It is applied on both paths.
pub fn is_reachable(conference: &Conference) -> bool {
    conference.active
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conference::model::{ConnectionMeta, MemberSpec, CREATED_FROM_WEB};
    use crate::conference::types::{ConferenceId, Timestamp};

    #[test]
    fn test_new_conference_is_reachable() {
        let conference = Conference::new(
            ConferenceId::new("room"),
            CREATED_FROM_WEB,
            MemberSpec::creator(None, ConnectionMeta::default()).materialize(Timestamp::now()),
        );
        assert!(is_reachable(&conference));
    }

    #[test]
    fn test_closed_conference_is_not_reachable() {
        let mut conference = Conference::new(
            ConferenceId::new("room"),
            CREATED_FROM_WEB,
            MemberSpec::creator(None, ConnectionMeta::default()).materialize(Timestamp::now()),
        );
        conference.active = false;
        assert!(!is_reachable(&conference));
    }
}
