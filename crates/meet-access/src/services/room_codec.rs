//! Room identifier codec.
//!
//! Room references arrive in three shapes:
//! - empty, meaning "any room"
//! - a bare slug such as `standup`
//! - a canonical `<tenant>/<slug>` name
//!
//! The registry is keyed by the canonical form; capability tokens carry only
//! the slug. All functions here are pure and total.

/// Room reference granting access to every room.
pub const WILDCARD_ROOM: &str = "*";

/// Canonical registry key for a room reference.
///
/// Empty input yields `*`. Input already containing `/` is returned
/// unchanged; anything else is prefixed with `tenant/`. Idempotent for
/// non-empty input.
pub fn canonicalize(raw: &str, tenant: &str) -> String {
    if raw.is_empty() {
        WILDCARD_ROOM.to_string()
    } else if raw.contains('/') {
        raw.to_string()
    } else {
        format!("{tenant}/{raw}")
    }
}

/// Substring after the last `/`, or the whole input when there is none.
pub fn slug_of(canonical: &str) -> &str {
    canonical
        .rsplit_once('/')
        .map_or(canonical, |(_, slug)| slug)
}

/// Room claim for a capability token.
///
/// The conferencing backend scopes rooms by slug, so a canonical name is
/// reduced to its last segment. A reference ending in `/` has no slug and
/// falls back to the full input.
pub fn token_room_scope(raw: &str) -> String {
    if raw.is_empty() {
        return WILDCARD_ROOM.to_string();
    }
    match slug_of(raw) {
        "" => raw.to_string(),
        slug => slug.to_string(),
    }
}
