use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::errors::ApplicationError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamId(pub String);

impl TeamId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Every team searches its own index, named after the team id.
    pub fn index_name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TeamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug)]
pub struct AccessToken(SecretString);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_blank(&self) -> bool {
        self.0.expose_secret().trim().is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct TeamCredential {
    pub team_id: TeamId,
    pub bot_access_token: AccessToken,
    pub user_access_token: AccessToken,
    pub bot_user_id: String,
}

impl TeamCredential {
    pub fn new(
        team_id: impl Into<String>,
        bot_access_token: impl Into<String>,
        user_access_token: impl Into<String>,
        bot_user_id: impl Into<String>,
    ) -> Self {
        Self {
            team_id: TeamId(team_id.into()),
            bot_access_token: AccessToken::new(bot_access_token),
            user_access_token: AccessToken::new(user_access_token),
            bot_user_id: bot_user_id.into(),
        }
    }

    pub fn bot_token(&self) -> Result<&AccessToken, ApplicationError> {
        require_token(&self.bot_access_token, &self.team_id, "bot")
    }

    /// History reads are scoped to a human identity, so backfill uses this token.
    pub fn user_token(&self) -> Result<&AccessToken, ApplicationError> {
        require_token(&self.user_access_token, &self.team_id, "user")
    }
}

fn require_token<'a>(
    token: &'a AccessToken,
    team_id: &TeamId,
    kind: &str,
) -> Result<&'a AccessToken, ApplicationError> {
    if token.is_blank() {
        return Err(ApplicationError::Configuration(format!(
            "missing {kind} access token for team `{team_id}`"
        )));
    }
    Ok(token)
}
