//! HTTP entry points
//!
//! Two routes carry the whole surface: `GET /` (landing page, or a
//! token-addressed return to an existing identity) and `GET /{room_id}`
//! (room-addressed create-or-join). Both successful resolutions set the
//! identity cookie from the issued descriptor.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::Html;
use axum_extra::extract::cookie::CookieJar;
use huddle_core::conference::{identity, ConferenceId, ConnectionMeta, Resolution};
use serde::Deserialize;

use crate::app::AppState;
use crate::cookie::identity_cookie;
use crate::error::ApiError;
use crate::views;

#[derive(Debug, Deserialize)]
pub struct HomeQuery {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoomQuery {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

/// `GET /` — landing page, or token-addressed lookup when `?token=` is given.
///
/// The token path is read-only, so no connection metadata is captured.
pub async fn home(
    State(state): State<AppState>,
    Query(query): Query<HomeQuery>,
    jar: CookieJar,
) -> Result<(CookieJar, Html<String>), ApiError> {
    let token = match query.token {
        None => return Ok((jar, views::landing_page())),
        Some(token) => token,
    };

    let resolution = state.resolver.resolve_token(&token)?;
    respond_with_identity(jar, resolution)
}

/// `GET /{room_id}` — room-addressed create-or-join.
pub async fn room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(query): Query<RoomQuery>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, Html<String>), ApiError> {
    let resolution = state.resolver.resolve_room(
        &ConferenceId::new(room_id),
        query.display_name,
        connection_meta(&headers),
    )?;
    respond_with_identity(jar, resolution)
}

fn respond_with_identity(
    jar: CookieJar,
    resolution: Resolution,
) -> Result<(CookieJar, Html<String>), ApiError> {
    let descriptor = identity::issue(&resolution.member);
    let page = views::conference_page(&resolution.conference, &resolution.member);
    Ok((jar.add(identity_cookie(&descriptor)?), page))
}

fn connection_meta(headers: &HeaderMap) -> ConnectionMeta {
    ConnectionMeta::new(
        headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    )
}
