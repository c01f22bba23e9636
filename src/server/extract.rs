//! Custom Axum extractors

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;

use super::error::ApiError;

/// JSON body extractor with JSON error payloads
///
/// An empty body is read as `{}` so that missing required fields are reported
/// by the handler (e.g. "No SQL query provided") rather than as a parse failure.
/// The `Content-Type` header is not checked.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::validation(format!("Invalid request body: {e}")))?;

        let parsed = if bytes.iter().all(u8::is_ascii_whitespace) {
            serde_json::from_slice(b"{}")
        } else {
            serde_json::from_slice(&bytes)
        };

        parsed.map(Self).map_err(|e| ApiError::validation(format!("Invalid JSON body: {e}")))
    }
}
