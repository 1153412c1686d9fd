//! Session authentication middleware.
//!
//! Callers present the secret of a login session as a bearer token. Sessions are
//! issued by the account service and looked up here by the SHA-256 of the secret.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::HeaderValue;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use musicspot_core::{Requester, UserId};
use musicspot_metadata::SessionRepo;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tracing::Instrument;
use uuid::Uuid;

/// Header carrying the request id, in both directions.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Maximum length for client-supplied request ids.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Request id for log correlation.
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generate a new random request id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a request id from a client-provided value.
    ///
    /// Truncated to 128 characters and reduced to printable ASCII. An empty result
    /// falls back to a generated id.
    pub fn from_client(value: &str) -> Self {
        let sanitized: String = value
            .chars()
            .take(MAX_REQUEST_ID_LEN)
            .filter(|c| c.is_ascii_graphic())
            .collect();

        if sanitized.is_empty() {
            Self::new()
        } else {
            Self(sanitized)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authenticated request extension.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub session_id: Uuid,
    pub user_id: UserId,
}

impl AuthenticatedUser {
    /// The caller as seen by library operations.
    pub fn requester(&self) -> Requester {
        Requester::new(self.user_id)
    }
}

/// Handlers that take an `AuthenticatedUser` reject unauthenticated requests with 401.
impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))
    }
}

/// Extract bearer token from the Authorization header.
/// The "Bearer" scheme is matched case-insensitively.
fn extract_bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() >= 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(v[7..].trim())
            } else {
                None
            }
        })
}

fn extract_or_generate_request_id(req: &Request) -> RequestId {
    req.headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(RequestId::from_client)
        .unwrap_or_else(RequestId::new)
}

/// Hash a session secret for lookup.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Resolves the bearer session and runs the request inside a span tagged with its id.
///
/// Requests without a token pass through unauthenticated; handlers decide whether
/// that is allowed. A token that matches no live session is rejected here.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let request_id = extract_or_generate_request_id(&req);
    let span = tracing::info_span!("request", request_id = %request_id);
    req.extensions_mut().insert(request_id.clone());

    if let Some(token) = extract_bearer_token(&req) {
        let token_hash = hash_token(token);
        let session = state
            .metadata
            .get_session_by_hash(&token_hash)
            .await?
            .filter(|s| s.is_valid_at(OffsetDateTime::now_utc()))
            .ok_or_else(|| ApiError::Unauthorized("invalid or expired session".to_string()))?;

        // Fire and forget
        let metadata = state.metadata.clone();
        let session_id = session.session_id;
        tokio::spawn(async move {
            if let Err(e) = metadata
                .touch_session(session_id, OffsetDateTime::now_utc())
                .await
            {
                tracing::debug!(session_id = %session_id, error = %e, "failed to touch session");
            }
        });

        req.extensions_mut().insert(AuthenticatedUser {
            session_id: session.session_id,
            user_id: UserId::from_uuid(session.user_id),
        });
    }

    let mut response = next.run(req).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    Ok(response)
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with(header: &str, value: &str) -> Request {
        Request::builder()
            .header(header, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_request_id_sanitized() {
        let id = RequestId::from_client("abc\n\u{1b}[31mdef ghi");
        assert_eq!(id.as_str(), "abc[31mdefghi");

        let long = "x".repeat(500);
        assert_eq!(RequestId::from_client(&long).as_str().len(), 128);

        // Nothing printable left: generate one.
        assert_eq!(RequestId::from_client("\n\t").as_str().len(), 36);
    }

    #[test]
    fn test_bearer_scheme_case_insensitive() {
        let req = request_with("authorization", "bEaReR secret-1");
        assert_eq!(extract_bearer_token(&req), Some("secret-1"));

        let req = request_with("authorization", "Basic dXNlcjpwYXNz");
        assert_eq!(extract_bearer_token(&req), None);
    }

    #[test]
    fn test_hash_token_is_sha256_hex() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
