use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header::RETRY_AFTER},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::metrics::{ADMISSIONS_TOTAL, REQUEST_TOTAL};
use crate::rate_limit::{Decision, RejectReason, Rejection};
use crate::state::AppState;

// Key used when nothing identifies the caller
pub const UNKNOWN_CLIENT: &str = "unknown";

// 429 body
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct TooManyRequests {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    violations: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_violations: Option<u32>,
}

impl From<&Rejection> for TooManyRequests {
    fn from(rejection: &Rejection) -> Self {
        match rejection.reason {
            RejectReason::Banned => Self {
                error: "Too many requests",
                message: format!(
                    "You are temporarily banned for {} minutes due to rate limit violations",
                    rejection.retry_after_minutes()
                ),
                violations: None,
                max_violations: None,
            },
            RejectReason::TooFrequent => Self {
                error: "Too many requests",
                message: format!(
                    "Please wait {} seconds between requests",
                    rejection.retry_after.as_secs()
                ),
                violations: Some(rejection.violations),
                max_violations: Some(rejection.max_violations),
            },
        }
    }
}

impl IntoResponse for TooManyRequests {
    fn into_response(self) -> Response {
        (StatusCode::TOO_MANY_REQUESTS, Json(self)).into_response()
    }
}

/// Derive the rate limit key for a request.
///
/// Behind a trusted proxy the left-most `X-Forwarded-For` entry wins, then
/// `X-Real-IP`; otherwise only the peer address counts. A request with none
/// of these still gets a key so it goes through the limiter.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = real_ip {
            return ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn request_client_key(req: &Request, trust_proxy: bool) -> String {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    client_key(req.headers(), peer, trust_proxy)
}

// Admission check in front of the token routes
pub async fn admission(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    REQUEST_TOTAL.inc();
    let key = request_client_key(&req, state.api.trust_proxy);

    match state.controller.admit_now(&key) {
        Decision::Admit => {
            ADMISSIONS_TOTAL.with_label_values(&["admit"]).inc();
            next.run(req).await
        }
        Decision::Reject(rejection) => {
            let label = match rejection.reason {
                RejectReason::Banned => "banned",
                RejectReason::TooFrequent => "too_frequent",
            };
            ADMISSIONS_TOTAL.with_label_values(&[label]).inc();

            let mut response = TooManyRequests::from(&rejection).into_response();
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(rejection.retry_after.as_secs()));
            response
        }
    }
}

// One line per response
pub async fn request_log(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let client = request_client_key(&req, state.api.trust_proxy);

    let response = next.run(req).await;
    info!(
        %method,
        path = %path,
        client = %client,
        status = response.status().as_u16(),
        "request"
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.9:51000".parse().unwrap())
    }

    #[test]
    fn forwarded_for_left_most_entry() {
        let h = headers(&[("x-forwarded-for", " 203.0.113.7 , 10.0.0.1")]);
        assert_eq!(client_key(&h, peer(), true), "203.0.113.7");
    }

    #[test]
    fn real_ip_when_no_forwarded_for() {
        let h = headers(&[("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_key(&h, peer(), true), "198.51.100.2");
    }

    #[test]
    fn headers_ignored_without_trusted_proxy() {
        let h = headers(&[("x-forwarded-for", "203.0.113.7")]);
        assert_eq!(client_key(&h, peer(), false), "10.0.0.9");
    }

    #[test]
    fn empty_forwarded_for_falls_back_to_peer() {
        let h = headers(&[("x-forwarded-for", "")]);
        assert_eq!(client_key(&h, peer(), true), "10.0.0.9");
    }

    #[test]
    fn nothing_known_is_unknown() {
        assert_eq!(client_key(&HeaderMap::new(), None, true), UNKNOWN_CLIENT);
    }

    #[test]
    fn banned_body() {
        let body = TooManyRequests::from(&Rejection {
            reason: RejectReason::Banned,
            retry_after: Duration::from_secs(600),
            violations: 3,
            max_violations: 3,
        });
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "error": "Too many requests",
                "message": "You are temporarily banned for 10 minutes due to rate limit violations"
            })
        );
    }

    #[test]
    fn too_frequent_body() {
        let body = TooManyRequests::from(&Rejection {
            reason: RejectReason::TooFrequent,
            retry_after: Duration::from_secs(3),
            violations: 2,
            max_violations: 10,
        });
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "error": "Too many requests",
                "message": "Please wait 3 seconds between requests",
                "violations": 2,
                "maxViolations": 10
            })
        );
    }
}
