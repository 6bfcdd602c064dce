use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubjectTreeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{provider} API error ({status}): {message}")]
    Provider {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Empty response from {0}")]
    EmptyResponse(String),

    #[error("Could not find JSON in model output: {0}")]
    Extraction(String),

    #[error("Invalid tree structure: {0}")]
    Validation(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Stale result for {0}")]
    StaleTarget(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification used when surfacing an error to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Provider,
    Extraction,
    Validation,
    Internal,
}

impl SubjectTreeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SubjectTreeError::Configuration(_) => ErrorKind::Configuration,
            SubjectTreeError::Provider { .. }
            | SubjectTreeError::Transport(_)
            | SubjectTreeError::MalformedResponse(_)
            | SubjectTreeError::EmptyResponse(_) => ErrorKind::Provider,
            SubjectTreeError::Extraction(_) => ErrorKind::Extraction,
            SubjectTreeError::Validation(_) => ErrorKind::Validation,
            SubjectTreeError::NodeNotFound(_)
            | SubjectTreeError::StaleTarget(_)
            | SubjectTreeError::Io(_)
            | SubjectTreeError::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// The single message shown to the user for a failed request.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Configuration => format!("Setup problem: {}", self),
            ErrorKind::Provider => format!("The model provider request failed: {}", self),
            ErrorKind::Extraction => format!(
                "The provider responded, but its output could not be interpreted: {}",
                self
            ),
            ErrorKind::Validation => format!(
                "The provider returned JSON that is not a valid subject tree: {}",
                self
            ),
            ErrorKind::Internal => self.to_string(),
        }
    }

    /// Whether a fresh attempt could plausibly succeed without user changes.
    pub fn is_transient(&self) -> bool {
        match self {
            SubjectTreeError::Transport(_) => true,
            SubjectTreeError::Provider { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SubjectTreeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_distinct() {
        let extraction = SubjectTreeError::Extraction("no brace".into());
        let validation = SubjectTreeError::Validation("missing name".into());
        let provider = SubjectTreeError::Provider {
            provider: "anthropic".into(),
            status: 401,
            message: "invalid x-api-key".into(),
        };

        assert_eq!(extraction.kind(), ErrorKind::Extraction);
        assert_eq!(validation.kind(), ErrorKind::Validation);
        assert_eq!(provider.kind(), ErrorKind::Provider);
        assert!(extraction.user_message().contains("could not be interpreted"));
        assert!(provider.user_message().contains("401"));
    }

    #[test]
    fn test_transient_statuses() {
        let rate_limited = SubjectTreeError::Provider {
            provider: "openai".into(),
            status: 429,
            message: "slow down".into(),
        };
        let unauthorized = SubjectTreeError::Provider {
            provider: "openai".into(),
            status: 401,
            message: "bad key".into(),
        };
        assert!(rate_limited.is_transient());
        assert!(!unauthorized.is_transient());
        assert!(!SubjectTreeError::Configuration("x".into()).is_transient());
    }
}
