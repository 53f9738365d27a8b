//! Viewer resolution middleware.
//!
//! Every API request gets a [`Viewer`] in its extensions. The admin key is
//! compared in constant time to mitigate timing attacks.

use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use subtle::ConstantTimeEq;

use crate::errors::{codes, ErrorDetails, ErrorResponse};
use crate::models::{Role, Viewer, VoterIdentity};

/// Header name for the admin key.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Account id of a signed-in member.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Device token of an anonymous voter.
pub const VOTER_TOKEN_HEADER: &str = "x-voter-token";

/// Resolve the caller's role and voting identity, rejecting wrong admin keys.
pub async fn viewer_layer(
    admin_key: Option<String>,
    mut request: Request,
    next: Next,
) -> Response {
    let role = match presented_key(request.headers()) {
        None => Role::Member,
        Some(provided) => match &admin_key {
            Some(expected) if constant_time_compare(&provided, expected) => Role::Admin,
            Some(_) => return unauthorized_response("Invalid API key"),
            None => return unauthorized_response("Admin access is not configured"),
        },
    };

    let viewer = Viewer {
        role,
        voter: voter_from_headers(request.headers()),
    };
    request.extensions_mut().insert(viewer);

    next.run(request).await
}

/// The admin key from `x-api-key`, or else from a bearer token.
fn presented_key(headers: &HeaderMap) -> Option<String> {
    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    api_key.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(|s| s.to_string())
    })
}

/// A signed-in account wins over a device token.
fn voter_from_headers(headers: &HeaderMap) -> Option<VoterIdentity> {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
    };

    header_value(USER_ID_HEADER)
        .map(VoterIdentity::Authenticated)
        .or_else(|| header_value(VOTER_TOKEN_HEADER).map(VoterIdentity::Anonymous))
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Create an unauthorized response.
fn unauthorized_response(message: &str) -> Response {
    let body = ErrorResponse {
        success: false,
        error: ErrorDetails {
            code: codes::UNAUTHORIZED.to_string(),
            message: message.to_string(),
            details: None,
        },
        revision_id: 0,
    };

    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
