use async_trait::async_trait;
use tokio::sync::Mutex;

use sift_core::chat::{ChatApi, HistoryPage};
use sift_core::domain::reply::ReplyPayload;
use sift_core::domain::team::AccessToken;
use sift_core::errors::UpstreamError;

/// Chat fake for route tests: records posted replies, serves fixed lookups and
/// an empty channel history.
#[derive(Default)]
pub struct RecordingChat {
    posted: Mutex<Vec<ReplyPayload>>,
}

impl RecordingChat {
    pub async fn posted(&self) -> Vec<ReplyPayload> {
        self.posted.lock().await.clone()
    }
}

#[async_trait]
impl ChatApi for RecordingChat {
    async fn post_message(
        &self,
        _token: &AccessToken,
        payload: &ReplyPayload,
    ) -> Result<(), UpstreamError> {
        self.posted.lock().await.push(payload.clone());
        Ok(())
    }

    async fn channel_history(
        &self,
        _token: &AccessToken,
        _channel: &str,
        _latest: Option<&str>,
    ) -> Result<HistoryPage, UpstreamError> {
        Ok(HistoryPage::default())
    }

    async fn channel_name(
        &self,
        _token: &AccessToken,
        _channel: &str,
    ) -> Result<String, UpstreamError> {
        Ok("general".to_owned())
    }

    async fn user_real_name(
        &self,
        _token: &AccessToken,
        _user: &str,
    ) -> Result<String, UpstreamError> {
        Ok("Ada".to_owned())
    }

    async fn team_url(&self, _token: &AccessToken) -> Result<String, UpstreamError> {
        Ok("https://acme.slack.com/".to_owned())
    }
}
