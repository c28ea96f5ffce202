//! Request identity and route protection middleware
//!
//! Lifts the session token, member signal and client details out of the
//! request, then applies the route table before the handler runs. Handlers
//! read the results from request extensions.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;

use crate::api::response::ApiError;
use crate::context::RequestIdentity;
use crate::guard::{self, RouteClass};
use crate::storage::models::ClientInfo;
use crate::AppState;

pub const SESSION_COOKIE: &str = "household_session";
pub const MEMBER_HEADER: &str = "x-member-id";

/// Middleware that attaches [`RequestIdentity`] and [`ClientInfo`] to the
/// request and rejects it when the route's guard fails.
///
/// Permission-guarded routes also get the resolved
/// [`AuthContext`](crate::context::AuthContext) attached.
pub async fn route_guard(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let identity = identity_from_headers(request.headers());
    let client = client_from_headers(request.headers());
    let now = Utc::now();

    match guard::classify(request.uri().path()) {
        RouteClass::Public => {}
        RouteClass::PinProtected => {
            if let Err(e) = guard::require_pin_auth(&state.db, &identity, now) {
                tracing::debug!(path = %request.uri().path(), error = %e, "PIN guard rejected request");
                return ApiError::from(e).into_response();
            }
        }
        RouteClass::Permission(permission) => {
            match guard::require_permission(
                &state.db,
                state.directory.as_ref(),
                &identity,
                permission,
                now,
            ) {
                Ok(context) => {
                    request.extensions_mut().insert(context);
                }
                Err(e) => return ApiError::from(e).into_response(),
            }
        }
    }

    request.extensions_mut().insert(identity);
    request.extensions_mut().insert(client);
    next.run(request).await
}

/// Session token from the session cookie, else from `Authorization: Bearer`
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string());

    from_cookie
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(|token| token.trim().to_string())
        })
        .filter(|token| !token.is_empty())
}

pub fn identity_from_headers(headers: &HeaderMap) -> RequestIdentity {
    RequestIdentity {
        member_id: header_text(headers, MEMBER_HEADER),
        session_token: session_token_from_headers(headers),
    }
}

/// Client address (first `x-forwarded-for` hop) and user agent
pub fn client_from_headers(headers: &HeaderMap) -> ClientInfo {
    ClientInfo {
        ip_address: header_text(headers, "x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
            .filter(|ip| !ip.is_empty()),
        user_agent: header_text(headers, header::USER_AGENT.as_str()),
    }
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_cookie_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; household_session=abc123"),
        );
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer other"));
        assert_eq!(session_token_from_headers(&headers).as_deref(), Some("abc123"));

        headers.remove(header::COOKIE);
        assert_eq!(session_token_from_headers(&headers).as_deref(), Some("other"));
    }

    #[test]
    fn test_blank_signals_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        headers.insert(MEMBER_HEADER, HeaderValue::from_static("  "));
        assert_eq!(identity_from_headers(&headers), RequestIdentity::default());
    }

    #[test]
    fn test_client_uses_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("192.168.1.20, 10.0.0.1"),
        );
        headers.insert(header::USER_AGENT, HeaderValue::from_static("KitchenTablet/1.0"));

        let client = client_from_headers(&headers);
        assert_eq!(client.ip_address.as_deref(), Some("192.168.1.20"));
        assert_eq!(client.user_agent.as_deref(), Some("KitchenTablet/1.0"));
    }
}
