//! Identity cookie emission
//!
//! The `user` cookie is the client-held half of a resolved identity: a
//! percent-encoded JSON rendering of the identity descriptor. Encoding is
//! a boundary concern; the id/displayName linkage inside is the contract.

use axum_extra::extract::cookie::Cookie;
use huddle_core::conference::IdentityDescriptor;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

/// Cookie name carrying the identity descriptor
pub const IDENTITY_COOKIE: &str = "user";

/// Build the identity cookie for a resolved member.
pub fn identity_cookie(
    descriptor: &IdentityDescriptor,
) -> Result<Cookie<'static>, serde_json::Error> {
    let payload = serde_json::to_string(descriptor)?;
    let encoded = utf8_percent_encode(&payload, NON_ALPHANUMERIC).to_string();
    Ok(Cookie::build((IDENTITY_COOKIE, encoded)).path("/").build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::conference::MemberId;
    use percent_encoding::percent_decode_str;

    #[test]
    fn test_cookie_value_decodes_to_descriptor() {
        let descriptor = IdentityDescriptor {
            id: MemberId::new("m-1"),
            display_name: "aGuy".to_string(),
        };

        let cookie = identity_cookie(&descriptor).unwrap();
        assert_eq!(cookie.name(), "user");
        assert_eq!(cookie.path(), Some("/"));

        let decoded = percent_decode_str(cookie.value()).decode_utf8().unwrap();
        let round_trip: IdentityDescriptor = serde_json::from_str(&decoded).unwrap();
        assert_eq!(round_trip, descriptor);
    }

    #[test]
    fn test_cookie_value_is_cookie_safe() {
        let descriptor = IdentityDescriptor {
            id: MemberId::new("m-1"),
            display_name: "weird; name=\",\"".to_string(),
        };

        let cookie = identity_cookie(&descriptor).unwrap();
        // No separators or quotes may survive encoding
        assert!(!cookie.value().contains([';', ',', '"', ' ']));

        let decoded = percent_decode_str(cookie.value()).decode_utf8().unwrap();
        let round_trip: IdentityDescriptor = serde_json::from_str(&decoded).unwrap();
        assert_eq!(round_trip.display_name, "weird; name=\",\"");
    }
}
