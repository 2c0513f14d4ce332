//! # Cursor Utilities
//!
//! Opaque base64 pagination cursors for the list endpoints, with input
//! validation on decode.

use axum::http::StatusCode;
use base64::Engine;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Encode cursor data as an opaque base64 string
pub fn encode_cursor<T: Serialize>(cursor: &T) -> String {
    let json = serde_json::to_string(cursor).expect("cursor serializes");
    base64::engine::general_purpose::STANDARD.encode(json.as_bytes())
}

/// Decode cursor data from an opaque base64 string with validation
pub fn decode_cursor<T: DeserializeOwned>(cursor: &str) -> Result<T, ApiError> {
    if cursor.is_empty() {
        return Err(invalid_cursor("cursor cannot be empty"));
    }

    if cursor.len() > 1000 {
        return Err(invalid_cursor("cursor is too long"));
    }

    if !cursor
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=')
    {
        return Err(invalid_cursor("cursor contains invalid characters"));
    }

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(cursor)
        .map_err(|_| invalid_cursor("cursor is not valid base64"))?;

    serde_json::from_slice(&decoded).map_err(|_| invalid_cursor("cursor payload is malformed"))
}

fn invalid_cursor(message: &str) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message)
}
