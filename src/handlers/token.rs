use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::error::ValidationError;
use crate::metrics::{TOKEN_CHECK_LATENCY, TOKEN_CHECKS_TOTAL};
use crate::models::{TokenCheckResponse, TokenRequest};
use crate::state::AppState;

// missing or malformed JSON reads as an empty body
fn request_body(body: Result<Json<TokenRequest>, JsonRejection>) -> TokenRequest {
    body.map(|Json(req)| req).unwrap_or_default()
}

fn non_empty(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.is_empty())
}

async fn run_check(state: &AppState, token: &str) -> TokenCheckResponse {
    let start_time = Instant::now();
    let result = state.validator.check(token).await;
    TOKEN_CHECK_LATENCY.observe(start_time.elapsed().as_secs_f64());

    match result {
        Ok(info) => {
            TOKEN_CHECKS_TOTAL.with_label_values(&["valid"]).inc();
            info!(username = %info.username, guilds = info.guilds.len(), "token check valid");
            TokenCheckResponse::valid(info)
        }
        Err(e) => {
            TOKEN_CHECKS_TOTAL.with_label_values(&["invalid"]).inc();
            match &e {
                ValidationError::InvalidToken => info!("token check invalid"),
                other => error!(error = %other, "token check failed"),
            }
            TokenCheckResponse::invalid(e.client_message())
        }
    }
}

// POST /check_token
pub async fn check_token_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TokenRequest>, JsonRejection>,
) -> Json<TokenCheckResponse> {
    let Some(token) = non_empty(request_body(body).token) else {
        warn!("token check attempted without providing a token");
        return Json(TokenCheckResponse::invalid("No token provided"));
    };

    info!("checking token validity");
    Json(run_check(&state, &token).await)
}

// GET on the configured api path, optionally guarded by a shared secret
pub async fn api_info_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TokenRequest>, JsonRejection>,
) -> Response {
    info!("API info endpoint accessed");
    let body = request_body(body);

    if state.api.restricted && body.code.as_deref() != Some(state.api.secret_key.as_str()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(TokenCheckResponse::invalid(
                "You are not authorized to access this endpoint.",
            )),
        )
            .into_response();
    }

    let Some(token) = non_empty(body.token) else {
        return Json(TokenCheckResponse::invalid(
            "No token provided. Please include a token in the request body.",
        ))
        .into_response();
    };

    Json(run_check(&state, &token).await).into_response()
}
