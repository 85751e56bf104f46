use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use sift_core::credentials::CredentialStore;
use sift_core::domain::team::{TeamCredential, TeamId};
use sift_core::errors::CredentialError;

pub mod memory;
pub mod team_credential;

pub use memory::InMemoryTeamCredentialRepository;
pub use team_credential::SqlTeamCredentialRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for CredentialError {
    fn from(error: RepositoryError) -> Self {
        CredentialError::Store(error.to_string())
    }
}

/// A team's install record as stored, tokens included.
#[derive(Clone, Debug)]
pub struct TeamInstall {
    pub credential: TeamCredential,
    pub installed_at: DateTime<Utc>,
}

impl TeamInstall {
    pub fn new(credential: TeamCredential) -> Self {
        Self { credential, installed_at: Utc::now() }
    }
}

#[async_trait]
pub trait TeamCredentialRepository: Send + Sync {
    async fn find_by_team_id(&self, id: &TeamId) -> Result<Option<TeamInstall>, RepositoryError>;

    /// Inserts or replaces the record for `install.credential.team_id`. The original
    /// install time is kept on replace.
    async fn save(&self, install: TeamInstall) -> Result<(), RepositoryError>;

    async fn list(&self) -> Result<Vec<TeamInstall>, RepositoryError>;
}

#[async_trait]
impl CredentialStore for SqlTeamCredentialRepository {
    async fn get(&self, team_id: &str) -> Result<Option<TeamCredential>, CredentialError> {
        lookup(self, team_id).await
    }
}

#[async_trait]
impl CredentialStore for InMemoryTeamCredentialRepository {
    async fn get(&self, team_id: &str) -> Result<Option<TeamCredential>, CredentialError> {
        lookup(self, team_id).await
    }
}

async fn lookup(
    repository: &dyn TeamCredentialRepository,
    team_id: &str,
) -> Result<Option<TeamCredential>, CredentialError> {
    let install = repository.find_by_team_id(&TeamId(team_id.to_owned())).await?;
    Ok(install.map(|install| install.credential))
}
