use lazy_static::lazy_static;
use prometheus::{
    Counter, Histogram, IntCounterVec, IntGauge, register_counter, register_histogram,
    register_int_counter_vec, register_int_gauge,
};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("token_gate_requests_total", "Total number of guarded requests").unwrap();
    pub static ref ADMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "token_gate_admissions_total",
        "Admission decisions by outcome",
        &["decision"]
    )
    .unwrap();
    pub static ref BANS_TOTAL: Counter =
        register_counter!("token_gate_bans_total", "Total bans imposed").unwrap();
    pub static ref TRACKED_CLIENTS: IntGauge =
        register_int_gauge!("token_gate_tracked_clients", "Client keys with rate limit state").unwrap();
    pub static ref TOKEN_CHECKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "token_gate_token_checks_total",
        "Token checks by result",
        &["result"]
    )
    .unwrap();
    pub static ref TOKEN_CHECK_LATENCY: Histogram = register_histogram!(
        "token_gate_token_check_latency_seconds",
        "Token check latency in seconds"
    )
    .unwrap();
}
