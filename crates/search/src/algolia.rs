use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use sift_core::config::SearchConfig;
use sift_core::domain::message::{IndexDocument, SearchHit};
use sift_core::errors::UpstreamError;
use sift_core::search::{IndexSettings, SearchIndex, SearchQuery};

const APPLICATION_ID_HEADER: &str = "X-Algolia-Application-Id";
const API_KEY_HEADER: &str = "X-Algolia-API-Key";

#[derive(Debug, Error)]
pub enum AlgoliaSetupError {
    #[error("failed to build search http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// REST client for a hosted Algolia application. One index per team, named
/// after the team id.
#[derive(Clone)]
pub struct AlgoliaIndexClient {
    http: reqwest::Client,
    base_url: String,
    application_id: String,
    api_key: SecretString,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

impl AlgoliaIndexClient {
    pub fn new(
        base_url: impl Into<String>,
        application_id: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, AlgoliaSetupError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok(Self { http, base_url, application_id: application_id.into(), api_key })
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self, AlgoliaSetupError> {
        Self::new(
            config.endpoint(),
            config.application_id.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn index_url(&self, index: &str, suffix: &str) -> String {
        format!("{}/1/indexes/{index}/{suffix}", self.base_url)
    }

    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<reqwest::Response, UpstreamError> {
        let response = request
            .header(APPLICATION_ID_HEADER, &self.application_id)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .send()
            .await
            .map_err(|error| UpstreamError::index(operation, error.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|value| value.to_str().ok())
                .unwrap_or("unspecified")
                .to_owned();
            return Err(UpstreamError::index(
                operation,
                format!("rate limited (retry after {retry_after})"),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::index(operation, format!("{status}: {body}")));
        }

        Ok(response)
    }
}

#[async_trait]
impl SearchIndex for AlgoliaIndexClient {
    async fn apply_settings(
        &self,
        index: &str,
        settings: &IndexSettings,
    ) -> Result<(), UpstreamError> {
        let body = json!({
            "searchableAttributes": settings.searchable_attributes,
            "customRanking": settings.custom_ranking,
        });
        let request = self.http.put(self.index_url(index, "settings")).json(&body);
        self.send("settings", request).await?;
        Ok(())
    }

    async fn upsert(&self, index: &str, documents: &[IndexDocument]) -> Result<(), UpstreamError> {
        if documents.is_empty() {
            return Ok(());
        }
        let requests: Vec<_> = documents
            .iter()
            .map(|document| json!({ "action": "updateObject", "body": document }))
            .collect();
        let body = json!({ "requests": requests });

        self.send("batch", self.http.post(self.index_url(index, "batch")).json(&body)).await?;
        debug!(index, documents = documents.len(), "submitted index batch");
        Ok(())
    }

    async fn upsert_one(&self, index: &str, document: &IndexDocument) -> Result<(), UpstreamError> {
        let url = self.index_url(index, &document.object_id);
        self.send("saveObject", self.http.put(url).json(document)).await?;
        Ok(())
    }

    async fn search(
        &self,
        index: &str,
        query: &SearchQuery,
    ) -> Result<Vec<SearchHit>, UpstreamError> {
        let body = json!({
            "query": query.text,
            "attributesToRetrieve": query.attributes_to_retrieve,
            "hitsPerPage": query.hits_per_page,
        });
        let response =
            self.send("query", self.http.post(self.index_url(index, "query")).json(&body)).await?;

        let parsed: QueryResponse = response.json().await.map_err(|error| {
            UpstreamError::index("query", format!("invalid response: {error}"))
        })?;
        Ok(parsed.hits)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use sift_core::domain::message::{IndexDocument, MessageEvent};
    use sift_core::errors::UpstreamError;
    use sift_core::search::{IndexSettings, SearchIndex, SearchQuery};

    use super::AlgoliaIndexClient;

    fn client(server: &MockServer) -> AlgoliaIndexClient {
        AlgoliaIndexClient::new(
            server.uri(),
            "APPID",
            "admin-key".to_owned().into(),
            Duration::from_secs(5),
        )
        .expect("client")
    }

    fn document(ts: &str, text: &str) -> IndexDocument {
        IndexDocument::from_message(
            MessageEvent {
                ts: Some(ts.to_owned()),
                user: Some("U1".to_owned()),
                text: text.to_owned(),
                ..MessageEvent::default()
            },
            Some("C1"),
        )
        .expect("document")
    }

    #[tokio::test]
    async fn settings_are_sent_with_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/1/indexes/T1/settings"))
            .and(header("X-Algolia-Application-Id", "APPID"))
            .and(header("X-Algolia-API-Key", "admin-key"))
            .and(body_json(json!({
                "searchableAttributes": ["text", "attachments.text"],
                "customRanking": ["desc(ts)"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "taskID": 1 })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .apply_settings("T1", &IndexSettings::for_messages())
            .await
            .expect("settings");
    }

    #[tokio::test]
    async fn batch_upserts_every_document_by_object_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/indexes/T1/batch"))
            .and(body_json(json!({
                "requests": [
                    { "action": "updateObject", "body": {
                        "objectID": "C1.1.000001", "channel": "C1", "ts": "1.000001",
                        "user": "U1", "text": "first"
                    }},
                    { "action": "updateObject", "body": {
                        "objectID": "C1.1.000002", "channel": "C1", "ts": "1.000002",
                        "user": "U1", "text": "second"
                    }}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "taskID": 2 })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .upsert("T1", &[document("1.000001", "first"), document("1.000002", "second")])
            .await
            .expect("batch");
    }

    #[tokio::test]
    async fn single_document_is_saved_under_its_object_id() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/1/indexes/T1/C1.1.000001"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "taskID": 3 })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).upsert_one("T1", &document("1.000001", "only")).await.expect("save");
    }

    #[tokio::test]
    async fn query_requests_attributes_and_page_size() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/indexes/T1/query"))
            .and(body_json(json!({
                "query": "runbook",
                "attributesToRetrieve": ["channel", "ts", "user", "text"],
                "hitsPerPage": 5
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": [
                    { "channel": "C1", "ts": "2.000001", "user": "U1", "text": "runbook v2",
                      "objectID": "C1.2.000001", "_highlightResult": {} },
                    { "channel": "C2", "ts": "1.000001", "text": "old runbook",
                      "objectID": "C2.1.000001" }
                ],
                "nbHits": 2
            })))
            .mount(&server)
            .await;

        let hits = client(&server)
            .search("T1", &SearchQuery::for_hits("runbook", 5))
            .await
            .expect("query");

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].channel, "C1");
        assert_eq!(hits[1].user, None);
    }

    #[tokio::test]
    async fn rate_limit_is_reported_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/indexes/T1/query"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .expect(1)
            .mount(&server)
            .await;

        let error = client(&server)
            .search("T1", &SearchQuery::for_hits("x", 5))
            .await
            .expect_err("rate limited");

        assert_eq!(error, UpstreamError::index("query", "rate limited (retry after 7)"));
    }

    #[tokio::test]
    async fn empty_batch_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        client(&server).upsert("T1", &[]).await.expect("empty batch");
    }
}
