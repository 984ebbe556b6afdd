mod health;
mod metrics;
mod token;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use token::{api_info_handler, check_token_handler};
