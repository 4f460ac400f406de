//! Request authentication.
//!
//! Authentication proper happens outside this service; requests arrive with
//! the calling doctor's role id in the `x-doctor-id` header, set by the
//! gateway after token validation. When an `API_KEY` is configured in the
//! environment, callers must additionally present it in `x-api-key`.

use crate::response::{ApiError, ApiResult};
use axum::http::HeaderMap;
use expediente_core::guards::parse_identifier;
use expediente_types::EntityId;
use std::env;

const DOCTOR_ID_HEADER: &str = "x-doctor-id";
const API_KEY_HEADER: &str = "x-api-key";

/// Validates the provided API key against the expected key from the
/// environment. When no `API_KEY` is configured the check is skipped
/// (development mode).
pub fn validate_api_key(headers: &HeaderMap) -> ApiResult<()> {
    let Ok(expected_key) = env::var("API_KEY") else {
        return Ok(());
    };

    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if provided == expected_key {
        Ok(())
    } else {
        Err(ApiError::unauthorised("Invalid API key"))
    }
}

/// Extracts and parses the calling doctor's role id.
pub fn doctor_id(headers: &HeaderMap) -> ApiResult<EntityId> {
    let raw = headers
        .get(DOCTOR_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("missing x-doctor-id header"))?;
    Ok(parse_identifier(raw)?)
}

/// Full per-request check: API key plus doctor identity.
pub fn authenticate(headers: &HeaderMap) -> ApiResult<EntityId> {
    validate_api_key(headers)?;
    doctor_id(headers)
}
