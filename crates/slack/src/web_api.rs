//! Slack Web API client for the handful of methods the bridge calls.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use sift_core::chat::{ChatApi, HistoryPage};
use sift_core::config::SlackConfig;
use sift_core::domain::message::MessageEvent;
use sift_core::domain::reply::ReplyPayload;
use sift_core::domain::team::AccessToken;
use sift_core::errors::UpstreamError;

#[derive(Debug, Error)]
pub enum SlackClientError {
    #[error("failed to build slack http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Identity reported by `auth.test` for a token.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AuthIdentity {
    pub url: String,
    pub team_id: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    messages: Vec<MessageEvent>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct ChannelInfoResponse {
    channel: NamedChannel,
}

#[derive(Debug, Deserialize)]
struct NamedChannel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    user: SlackUser,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    name: String,
    #[serde(default)]
    real_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Acknowledged {}

/// Tokens are passed per call; one client serves every team.
#[derive(Clone)]
pub struct SlackWebClient {
    http: reqwest::Client,
    api_base: String,
}

impl SlackWebClient {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Result<Self, SlackClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, api_base: api_base.into().trim_end_matches('/').to_owned() })
    }

    pub fn from_config(config: &SlackConfig) -> Result<Self, SlackClientError> {
        Self::new(config.api_base_url.clone(), Duration::from_secs(config.timeout_secs))
    }

    pub async fn auth_identity(&self, token: &AccessToken) -> Result<AuthIdentity, UpstreamError> {
        let request = self.http.post(self.method_url("auth.test"));
        self.call("auth.test", token, request).await
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        token: &AccessToken,
        request: RequestBuilder,
    ) -> Result<T, UpstreamError> {
        let response = request
            .bearer_auth(token.expose())
            .send()
            .await
            .map_err(|error| UpstreamError::chat(method, error.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|value| value.to_str().ok())
                .unwrap_or("unspecified")
                .to_owned();
            return Err(UpstreamError::chat(
                method,
                format!("rate limited (retry after {retry_after})"),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::chat(method, format!("{status}: {body}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|error| UpstreamError::chat(method, format!("invalid response: {error}")))?;
        if body.get("ok").and_then(Value::as_bool) != Some(true) {
            let reason = body.get("error").and_then(Value::as_str).unwrap_or("unknown error");
            return Err(UpstreamError::chat(method, reason));
        }

        serde_json::from_value(body)
            .map_err(|error| UpstreamError::chat(method, format!("unexpected response: {error}")))
    }
}

#[async_trait]
impl ChatApi for SlackWebClient {
    async fn post_message(
        &self,
        token: &AccessToken,
        payload: &ReplyPayload,
    ) -> Result<(), UpstreamError> {
        let request = self.http.post(self.method_url("chat.postMessage")).json(payload);
        let _: Acknowledged = self.call("chat.postMessage", token, request).await?;
        debug!(
            channel_id = %payload.channel,
            attachments = payload.attachments.len(),
            "posted reply"
        );
        Ok(())
    }

    async fn channel_history(
        &self,
        token: &AccessToken,
        channel: &str,
        latest: Option<&str>,
    ) -> Result<HistoryPage, UpstreamError> {
        let mut params = vec![("channel", channel)];
        if let Some(latest) = latest {
            params.push(("latest", latest));
        }
        let request = self.http.get(self.method_url("conversations.history")).query(&params);
        let response: HistoryResponse = self.call("conversations.history", token, request).await?;
        Ok(HistoryPage { messages: response.messages, has_more: response.has_more })
    }

    async fn channel_name(
        &self,
        token: &AccessToken,
        channel: &str,
    ) -> Result<String, UpstreamError> {
        let request =
            self.http.get(self.method_url("conversations.info")).query(&[("channel", channel)]);
        let response: ChannelInfoResponse = self.call("conversations.info", token, request).await?;
        Ok(response.channel.name)
    }

    async fn user_real_name(
        &self,
        token: &AccessToken,
        user: &str,
    ) -> Result<String, UpstreamError> {
        let request = self.http.get(self.method_url("users.info")).query(&[("user", user)]);
        let response: UserInfoResponse = self.call("users.info", token, request).await?;
        let SlackUser { name, real_name } = response.user;
        Ok(real_name.filter(|real_name| !real_name.trim().is_empty()).unwrap_or(name))
    }

    async fn team_url(&self, token: &AccessToken) -> Result<String, UpstreamError> {
        self.auth_identity(token).await.map(|identity| identity.url)
    }
}
