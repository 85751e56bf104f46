use async_trait::async_trait;

use crate::domain::team::TeamCredential;
use crate::errors::{ApplicationError, CredentialError};

/// Read-only lookup of per-team install records.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, team_id: &str) -> Result<Option<TeamCredential>, CredentialError>;
}

/// Like [`CredentialStore::get`] but turns a missing record into `UnknownTeam`.
pub async fn require_credential(
    store: &dyn CredentialStore,
    team_id: &str,
) -> Result<TeamCredential, ApplicationError> {
    store
        .get(team_id)
        .await?
        .ok_or_else(|| ApplicationError::UnknownTeam { team_id: team_id.to_owned() })
}
