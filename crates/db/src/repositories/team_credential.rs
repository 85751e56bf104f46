use chrono::{DateTime, Utc};
use sqlx::Row;

use sift_core::domain::team::{TeamCredential, TeamId};

use super::{RepositoryError, TeamCredentialRepository, TeamInstall};
use crate::DbPool;

pub struct SqlTeamCredentialRepository {
    pool: DbPool,
}

impl SqlTeamCredentialRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_install(row: &sqlx::sqlite::SqliteRow) -> Result<TeamInstall, RepositoryError> {
    let team_id: String =
        row.try_get("team_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let bot_access_token: String =
        row.try_get("bot_access_token").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_access_token: String =
        row.try_get("user_access_token").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let bot_user_id: String =
        row.try_get("bot_user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let installed_at_str: String =
        row.try_get("installed_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let installed_at = DateTime::parse_from_rfc3339(&installed_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("installed_at for `{team_id}`: {e}")))?;

    Ok(TeamInstall {
        credential: TeamCredential::new(team_id, bot_access_token, user_access_token, bot_user_id),
        installed_at,
    })
}

#[async_trait::async_trait]
impl TeamCredentialRepository for SqlTeamCredentialRepository {
    async fn find_by_team_id(&self, id: &TeamId) -> Result<Option<TeamInstall>, RepositoryError> {
        let row = sqlx::query(
            "SELECT team_id, bot_access_token, user_access_token, bot_user_id, installed_at
             FROM team_credential WHERE team_id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_install(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, install: TeamInstall) -> Result<(), RepositoryError> {
        let credential = &install.credential;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO team_credential (team_id, bot_access_token, user_access_token,
                                          bot_user_id, installed_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(team_id) DO UPDATE SET
                 bot_access_token = excluded.bot_access_token,
                 user_access_token = excluded.user_access_token,
                 bot_user_id = excluded.bot_user_id,
                 updated_at = excluded.updated_at",
        )
        .bind(credential.team_id.as_str())
        .bind(credential.bot_access_token.expose())
        .bind(credential.user_access_token.expose())
        .bind(&credential.bot_user_id)
        .bind(install.installed_at.to_rfc3339())
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<TeamInstall>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT team_id, bot_access_token, user_access_token, bot_user_id, installed_at
             FROM team_credential ORDER BY team_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_install).collect::<Result<Vec<_>, _>>()
    }
}

#[cfg(test)]
mod tests {
    use sift_core::credentials::{require_credential, CredentialStore};
    use sift_core::domain::team::{TeamCredential, TeamId};
    use sift_core::errors::ApplicationError;

    use super::SqlTeamCredentialRepository;
    use crate::repositories::{TeamCredentialRepository, TeamInstall};
    use crate::{connect_with_settings, migrations};

    async fn repository() -> SqlTeamCredentialRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlTeamCredentialRepository::new(pool)
    }

    #[tokio::test]
    async fn save_then_find_round_trips_tokens() {
        let repo = repository().await;
        repo.save(TeamInstall::new(TeamCredential::new("T1", "xoxb-1", "xoxp-1", "UBOT")))
            .await
            .expect("save");

        let found = repo.find_by_team_id(&TeamId("T1".to_owned())).await.expect("find");
        let install = found.expect("install exists");

        assert_eq!(install.credential.bot_access_token.expose(), "xoxb-1");
        assert_eq!(install.credential.user_access_token.expose(), "xoxp-1");
        assert_eq!(install.credential.bot_user_id, "UBOT");
    }

    #[tokio::test]
    async fn reinstall_replaces_tokens_and_keeps_install_time() {
        let repo = repository().await;
        let first = TeamInstall::new(TeamCredential::new("T1", "xoxb-old", "xoxp-old", "UBOT"));
        let installed_at = first.installed_at;
        repo.save(first).await.expect("save first");
        repo.save(TeamInstall::new(TeamCredential::new("T1", "xoxb-new", "xoxp-new", "UBOT2")))
            .await
            .expect("save second");

        let all = repo.list().await.expect("list");

        assert_eq!(all.len(), 1);
        assert_eq!(all[0].credential.bot_access_token.expose(), "xoxb-new");
        assert_eq!(all[0].credential.bot_user_id, "UBOT2");
        assert_eq!(all[0].installed_at.timestamp(), installed_at.timestamp());
    }

    #[tokio::test]
    async fn credential_store_reports_unknown_team() {
        let repo = repository().await;

        assert!(repo.get("T404").await.expect("lookup").is_none());
        let error = require_credential(&repo, "T404").await.expect_err("unknown team");
        assert!(matches!(error, ApplicationError::UnknownTeam { ref team_id } if team_id == "T404"));
    }
}
