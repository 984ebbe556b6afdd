use reqwest::StatusCode;

// Startup configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("max violations must be at least 1")]
    ZeroMaxViolations,

    #[error("ban duration must be at least 1 minute")]
    ZeroBanDuration,

    #[error("{0} is out of range")]
    OutOfRange(&'static str),

    #[error("api path must start with '/' and not clash with a built-in route (got {0:?})")]
    InvalidApiPath(String),

    #[error("restricted mode requires a non-empty secret key")]
    MissingSecretKey,
}

// Credential check failures
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("An invalid token was provided.")]
    InvalidToken,

    #[error("failed to fetch guild {id}: {source}")]
    Guild {
        id: String,
        #[source]
        source: Box<ValidationError>,
    },

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("unexpected upstream status {0}")]
    UnexpectedStatus(StatusCode),
}

impl ValidationError {
    // Message sent back to the caller in the `error` field
    pub fn client_message(&self) -> String {
        match self {
            Self::InvalidToken => "Error [TokenInvalid]: An invalid token was provided.".to_string(),
            Self::Guild { source, .. } => format!(
                "An error occurred while fetching guild information\n{source}"
            ),
            Self::Upstream(_) | Self::UnexpectedStatus(_) => {
                "Error [TokenCheckFailed]: An error occurred while checking the token".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_token_message() {
        assert_eq!(
            ValidationError::InvalidToken.client_message(),
            "Error [TokenInvalid]: An invalid token was provided."
        );
    }

    #[test]
    fn guild_message_carries_detail() {
        let err = ValidationError::Guild {
            id: "42".to_string(),
            source: Box::new(ValidationError::UnexpectedStatus(StatusCode::FORBIDDEN)),
        };
        assert_eq!(
            err.client_message(),
            "An error occurred while fetching guild information\nunexpected upstream status 403 Forbidden"
        );
    }

    #[test]
    fn other_failures_are_generic() {
        let err = ValidationError::UnexpectedStatus(StatusCode::BAD_GATEWAY);
        assert_eq!(
            err.client_message(),
            "Error [TokenCheckFailed]: An error occurred while checking the token"
        );
    }
}
