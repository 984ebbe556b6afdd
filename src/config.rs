use clap::Parser;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::rate_limit::Policy;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "token-gate")]
#[command(about = "Rate limited Discord bot token checker")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "TOKEN_GATE_PORT", default_value_t = 3000)]
    pub port: u16,

    // Path of the token info endpoint
    #[arg(long, env = "TOKEN_GATE_API_PATH", default_value = "/api")]
    pub api_path: String,

    // Require `code` in the body of api_path requests
    #[arg(long, env = "TOKEN_GATE_RESTRICTED", default_value_t = false)]
    pub restricted: bool,

    // Secret compared against `code` when restricted
    #[arg(long, env = "TOKEN_GATE_SECRET_KEY", default_value = "", hide_env_values = true)]
    pub secret_key: String,

    // Minimum seconds between accepted requests per client
    #[arg(long, env = "TOKEN_GATE_REQUEST_INTERVAL", default_value_t = 3)]
    pub request_interval: u64,

    // Ban duration in minutes
    #[arg(long, env = "TOKEN_GATE_BAN_DURATION", default_value_t = 10)]
    pub ban_duration: u64,

    // Violations before a client gets banned
    #[arg(long, env = "TOKEN_GATE_MAX_VIOLATIONS", default_value_t = 10)]
    pub max_violations: u32,

    // Discord REST API base url
    #[arg(long, env = "TOKEN_GATE_DISCORD_API", default_value = "https://discord.com/api/v10")]
    pub discord_api: String,

    // Directory served for everything else
    #[arg(long, env = "TOKEN_GATE_STATIC_DIR", default_value = "public")]
    pub static_dir: PathBuf,

    // Take the client address from forwarding headers
    #[arg(long, env = "TOKEN_GATE_TRUST_PROXY", default_value_t = true, action = clap::ArgAction::Set)]
    pub trust_proxy: bool,
}

// Settings for the token endpoints
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub path: String,
    pub restricted: bool,
    pub secret_key: String,
    pub trust_proxy: bool,
}

impl Args {
    pub fn policy(&self) -> Result<Policy, ConfigError> {
        Policy::new(self.request_interval, self.ban_duration, self.max_violations)
    }

    pub fn api(&self) -> Result<ApiConfig, ConfigError> {
        let reserved = ["/check_token", "/health", "/metrics"];
        if !self.api_path.starts_with('/')
            || self.api_path.len() < 2
            || reserved.contains(&self.api_path.as_str())
        {
            return Err(ConfigError::InvalidApiPath(self.api_path.clone()));
        }
        if self.restricted && self.secret_key.is_empty() {
            return Err(ConfigError::MissingSecretKey);
        }
        Ok(ApiConfig {
            path: self.api_path.clone(),
            restricted: self.restricted,
            secret_key: self.secret_key.clone(),
            trust_proxy: self.trust_proxy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["token-gate"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_documented_policy() {
        let args = parse(&[]);
        let policy = args.policy().unwrap();
        assert_eq!(policy.min_interval, TimeDelta::seconds(3));
        assert_eq!(policy.ban_duration, TimeDelta::minutes(10));
        assert_eq!(policy.max_violations, 10);
        assert_eq!(args.port, 3000);
        assert!(args.trust_proxy);

        let api = args.api().unwrap();
        assert_eq!(api.path, "/api");
        assert!(!api.restricted);
    }

    #[test]
    fn policy_flags_are_applied() {
        let args = parse(&[
            "--request-interval",
            "5",
            "--ban-duration",
            "2",
            "--max-violations",
            "4",
        ]);
        let policy = args.policy().unwrap();
        assert_eq!(policy.min_interval, TimeDelta::seconds(5));
        assert_eq!(policy.ban_duration, TimeDelta::minutes(2));
        assert_eq!(policy.max_violations, 4);
    }

    #[test]
    fn trust_proxy_can_be_turned_off() {
        assert!(!parse(&["--trust-proxy", "false"]).trust_proxy);
    }

    #[test]
    fn restricted_without_secret_is_rejected() {
        let args = parse(&["--restricted"]);
        assert!(matches!(args.api(), Err(ConfigError::MissingSecretKey)));

        let args = parse(&["--restricted", "--secret-key", "s3cret"]);
        assert!(args.api().unwrap().restricted);
    }

    #[test]
    fn api_path_needs_leading_slash() {
        let args = parse(&["--api-path", "api"]);
        assert!(matches!(args.api(), Err(ConfigError::InvalidApiPath(_))));
        let args = parse(&["--api-path", "/"]);
        assert!(matches!(args.api(), Err(ConfigError::InvalidApiPath(_))));
    }

    #[test]
    fn api_path_cannot_shadow_other_routes() {
        for path in ["/check_token", "/health", "/metrics"] {
            let args = parse(&["--api-path", path]);
            assert!(matches!(args.api(), Err(ConfigError::InvalidApiPath(_))));
        }
        assert_eq!(parse(&["--api-path", "/v1/bot"]).api().unwrap().path, "/v1/bot");
    }
}
