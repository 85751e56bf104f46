use std::collections::HashMap;

use tokio::sync::RwLock;

use sift_core::domain::team::{TeamCredential, TeamId};

use super::{RepositoryError, TeamCredentialRepository, TeamInstall};

#[derive(Default)]
pub struct InMemoryTeamCredentialRepository {
    installs: RwLock<HashMap<String, TeamInstall>>,
}

impl InMemoryTeamCredentialRepository {
    pub fn with_credentials(credentials: impl IntoIterator<Item = TeamCredential>) -> Self {
        let installs = credentials
            .into_iter()
            .map(|credential| (credential.team_id.0.clone(), TeamInstall::new(credential)))
            .collect();
        Self { installs: RwLock::new(installs) }
    }
}

#[async_trait::async_trait]
impl TeamCredentialRepository for InMemoryTeamCredentialRepository {
    async fn find_by_team_id(&self, id: &TeamId) -> Result<Option<TeamInstall>, RepositoryError> {
        let installs = self.installs.read().await;
        Ok(installs.get(&id.0).cloned())
    }

    async fn save(&self, install: TeamInstall) -> Result<(), RepositoryError> {
        let mut installs = self.installs.write().await;
        let key = install.credential.team_id.0.clone();
        let installed_at =
            installs.get(&key).map(|existing| existing.installed_at).unwrap_or(install.installed_at);
        installs.insert(key, TeamInstall { installed_at, ..install });
        Ok(())
    }

    async fn list(&self) -> Result<Vec<TeamInstall>, RepositoryError> {
        let installs = self.installs.read().await;
        let mut all: Vec<TeamInstall> = installs.values().cloned().collect();
        all.sort_by(|left, right| left.credential.team_id.0.cmp(&right.credential.team_id.0));
        Ok(all)
    }
}
