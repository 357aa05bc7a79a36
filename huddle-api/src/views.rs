//! Thin HTML shells for the two entry views
//!
//! No domain logic lives here; pages only need to be distinguishable and
//! carry the room context the client bootstraps from.

use axum::response::Html;
use huddle_core::conference::{Conference, Member};

/// Landing page for hint-less visits
pub fn landing_page() -> Html<String> {
    Html(r#"<!DOCTYPE html>
<html>
<head><title>huddle</title></head>
<body data-view="landing">
<h1>huddle</h1>
<p>Pick a room name and share the link to start a conference.</p>
</body>
</html>
"#
    .to_string())
}

/// Live conference page for a resolved member
pub fn conference_page(conference: &Conference, member: &Member) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>huddle - {room}</title></head>
<body data-view="conference" data-room="{room}" data-member="{member}">
<h1>{room}</h1>
<p>Joined as {name}.</p>
</body>
</html>
"#,
        room = escape(conference.id.as_str()),
        member = escape(member.id.as_str()),
        name = escape(&member.display_name),
    ))
}

/// Minimal HTML escaping for interpolated values
fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::conference::{
        Conference, ConferenceId, ConnectionMeta, MemberSpec, Timestamp, CREATED_FROM_WEB,
    };

    fn sample_conference(room: &str, display_name: &str) -> Conference {
        Conference::new(
            ConferenceId::new(room),
            CREATED_FROM_WEB,
            MemberSpec::creator(Some(display_name.to_string()), ConnectionMeta::default())
                .materialize(Timestamp::now()),
        )
    }

    #[test]
    fn test_views_are_distinguishable() {
        let conference = sample_conference("standup", "aGuy");
        let landing = landing_page();
        let live = conference_page(&conference, conference.creator());

        assert!(landing.0.contains(r#"data-view="landing""#));
        assert!(live.0.contains(r#"data-view="conference""#));
        assert!(live.0.contains("standup"));
        assert!(live.0.contains("aGuy"));
    }

    #[test]
    fn test_conference_page_escapes_markup() {
        let conference = sample_conference("room", "<script>alert(1)</script>");
        let live = conference_page(&conference, conference.creator());
        assert!(!live.0.contains("<script>"));
        assert!(live.0.contains("&lt;script&gt;"));
    }
}
