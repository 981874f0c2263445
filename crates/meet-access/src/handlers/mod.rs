//! HTTP request handlers for the meeting access service.

pub mod health;
pub mod meetings;
pub mod metrics;
pub mod tokens;

pub use health::{health_check, readiness_check};
pub use meetings::{get_meeting, join_meeting, lookup_meeting, toggle_kill_switch};
pub use metrics::metrics_handler;
pub use tokens::issue_token;

use crate::errors::MeetError;
use serde::de::DeserializeOwned;

/// Deserialize a JSON body, mapping any failure to 400 instead of axum's 422.
pub(crate) fn parse_json_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, MeetError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(target: "meet.handlers", error = %e, "Invalid request body");
        MeetError::BadRequest("Invalid request body".to_string())
    })
}

/// Like [`parse_json_body`], but an empty body yields `T::default()`.
pub(crate) fn parse_optional_json_body<T: DeserializeOwned + Default>(
    body: &[u8],
) -> Result<T, MeetError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    parse_json_body(body)
}
