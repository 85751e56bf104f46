use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("chat api `{operation}` failed: {message}")]
    Chat { operation: &'static str, message: String },
    #[error("search index `{operation}` failed: {message}")]
    Index { operation: &'static str, message: String },
}

impl UpstreamError {
    pub fn chat(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Chat { operation, message: message.into() }
    }

    pub fn index(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Index { operation, message: message.into() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("credential store failure: {0}")]
    Store(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("configuration failure: {0}")]
    Configuration(String),
    #[error("no credential record for team `{team_id}`")]
    UnknownTeam { team_id: String },
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("invalid event payload: {0}")]
    InvalidPayload(String),
}

impl ApplicationError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::UnknownTeam { .. } => "unknown_team",
            Self::Upstream(UpstreamError::Chat { .. }) => "upstream_chat",
            Self::Upstream(UpstreamError::Index { .. }) => "upstream_index",
            Self::Credential(_) => "credential_store",
            Self::InvalidPayload(_) => "invalid_payload",
        }
    }
}

/// Raised at the transport boundary before an envelope is dispatched.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("Invalid Slack verification token received: {token}")]
pub struct VerificationError {
    pub token: String,
}

impl VerificationError {
    pub fn check(expected: &str, received: &str) -> Result<(), Self> {
        if expected == received {
            Ok(())
        } else {
            Err(Self { token: received.to_owned() })
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, UpstreamError, VerificationError};

    #[test]
    fn verification_error_renders_literal_message() {
        let error = VerificationError::check("expected", "forged").expect_err("mismatch");

        assert_eq!(error.to_string(), "Invalid Slack verification token received: forged");
    }

    #[test]
    fn matching_token_passes_verification() {
        assert!(VerificationError::check("expected", "expected").is_ok());
    }

    #[test]
    fn upstream_errors_are_classified_by_collaborator() {
        let chat = ApplicationError::from(UpstreamError::chat("chat.postMessage", "ratelimited"));
        let index = ApplicationError::from(UpstreamError::index("batch", "timeout"));

        assert_eq!(chat.error_class(), "upstream_chat");
        assert_eq!(index.error_class(), "upstream_index");
        assert_eq!(chat.to_string(), "chat api `chat.postMessage` failed: ratelimited");
    }

    #[test]
    fn unknown_team_has_its_own_class() {
        let error = ApplicationError::UnknownTeam { team_id: "T404".to_owned() };

        assert_eq!(error.error_class(), "unknown_team");
    }
}
