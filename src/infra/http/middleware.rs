use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, MatchedPath, State},
    http::{HeaderValue, Method, Request, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::auth::Principal;
use crate::application::error::ErrorReport;

use super::error::ApiError;
use super::state::HttpState;

const ACCESS_TOKEN_PARAM: &str = "access_token";
const EVENTS_PATH: &str = "/events";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let user_id = response
            .extensions()
            .get::<Principal>()
            .map(|principal| principal.user_id.to_string());
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "agora::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                user_id = user_id.as_deref().unwrap_or(""),
                "request failed",
            );
        } else {
            warn!(
                target = "agora::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                user_id = user_id.as_deref().unwrap_or(""),
                "client request error",
            );
        }
    }

    response
}

/// Resolve the session token, if any, into a `Principal` request extension.
///
/// Anonymous requests pass through untouched; a token that is present but
/// does not authenticate is rejected outright.
pub async fn resolve_principal(
    State(state): State<HttpState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = request_token(&request) else {
        return next.run(request).await;
    };

    let principal = match state.auth.authenticate(&token).await {
        Ok(principal) => principal,
        Err(err) => return ApiError::from(err).into_response(),
    };

    request.extensions_mut().insert(principal.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(principal);
    response
}

/// Throttle mutating requests per user, or per client address when anonymous.
pub async fn rate_limit(
    State(state): State<HttpState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if matches!(
        *request.method(),
        Method::GET | Method::HEAD | Method::OPTIONS
    ) {
        return next.run(request).await;
    }

    let route = route_key(
        request.method(),
        request.extensions().get::<MatchedPath>().map(MatchedPath::as_str),
    );
    let key = match request.extensions().get::<Principal>() {
        Some(principal) => principal.user_id.to_string(),
        None => request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip().to_string())
            .unwrap_or_else(|| "anonymous".to_string()),
    };

    let (allowed, remaining) = state.rate_limiter.allow(&key, &route);
    if !allowed {
        warn!(
            target = "agora::http::rate_limit",
            key = %key,
            route = %route,
            "rate limit exceeded"
        );
        return ApiError::rate_limited(state.rate_limiter.retry_after_secs());
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(state.rate_limiter.limit()));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
    response
}

// Unmatched paths share one bucket so arbitrary URLs cannot mint new keys.
fn route_key(method: &Method, matched: Option<&str>) -> String {
    format!("{method} {}", matched.unwrap_or("<unmatched>"))
}

fn request_token(request: &Request<Body>) -> Option<String> {
    extract_token(request.headers().get(header::AUTHORIZATION)).or_else(|| {
        if request.uri().path() == EVENTS_PATH {
            query_token(request.uri().query())
        } else {
            None
        }
    })
}

fn extract_token(header: Option<&HeaderValue>) -> Option<String> {
    let raw = header?.to_str().ok()?;
    let bearer = raw.strip_prefix("Bearer ")?;
    Some(bearer.trim().to_string()).filter(|token| !token.is_empty())
}

// EventSource cannot set headers, so `/events` also accepts `?access_token=`.
fn query_token(query: Option<&str>) -> Option<String> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == ACCESS_TOKEN_PARAM)
        .map(|(_, value)| value.to_string())
        .filter(|token| !token.is_empty())
}

/// Extractor for handlers that require a signed-in user.
pub struct CurrentUser(pub Principal);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(ApiError::unauthorized)
    }
}

/// Extractor for handlers that personalise output when a user is signed in.
pub struct MaybeUser(pub Option<Principal>);

impl MaybeUser {
    pub fn user_id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|principal| principal.user_id)
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<Principal>().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_tokens_are_extracted() {
        let value = HeaderValue::from_static("Bearer ag_abc_secret");
        assert_eq!(
            extract_token(Some(&value)).as_deref(),
            Some("ag_abc_secret")
        );

        let basic = HeaderValue::from_static("Basic dXNlcjpwYXNz");
        assert!(extract_token(Some(&basic)).is_none());
        assert!(extract_token(None).is_none());
    }

    #[test]
    fn query_tokens_are_found_among_other_params() {
        assert_eq!(
            query_token(Some("foo=1&access_token=ag_x_y")).as_deref(),
            Some("ag_x_y")
        );
        assert!(query_token(Some("access_token=")).is_none());
        assert!(query_token(Some("token=ag_x_y")).is_none());
        assert!(query_token(None).is_none());
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).expect("request")
    }

    #[test]
    fn query_tokens_are_honoured_only_on_the_event_stream() {
        assert_eq!(
            request_token(&get("/events?access_token=ag_x_y")).as_deref(),
            Some("ag_x_y")
        );
        assert!(request_token(&get("/notification?access_token=ag_x_y")).is_none());

        let with_header = Request::builder()
            .uri("/notification")
            .header(header::AUTHORIZATION, "Bearer ag_h_s")
            .body(Body::empty())
            .expect("request");
        assert_eq!(request_token(&with_header).as_deref(), Some("ag_h_s"));
    }

    #[test]
    fn unmatched_routes_share_a_rate_limit_key() {
        assert_eq!(
            route_key(&Method::POST, Some("/question/{id}/vote")),
            "POST /question/{id}/vote"
        );
        assert_eq!(route_key(&Method::POST, None), "POST <unmatched>");
    }
}
