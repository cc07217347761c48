//! `reqwest` implementation of the library API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::{ApiError, LibraryApi};
use crate::config::ApiConfig;
use crate::models::{
    BulkIngestRequest, BulkIngestResponse, CheckLibraryRequest, CheckLibraryResponse,
    DownloadStats, IngestRequest, IngestResponse, LibraryListResponse, LibraryQuery, Paper,
    RetryDownloadsResponse, RetryScope, SearchRequest, SearchResponse,
};

const API_KEY_HEADER: &str = "x-api-key";

/// Error envelope used by the backend for every non-2xx response
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: String,
    message: String,
    #[serde(default)]
    suggestion: Option<String>,
}

/// HTTP client for the library service
#[derive(Debug, Clone)]
pub struct HttpLibraryClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpLibraryClient {
    /// Build a client from the `[api]` config section
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Self::from_client(client, &config.base_url, config.api_key.clone())
    }

    /// Wrap an existing reqwest client
    pub fn from_client(
        client: Client,
        base_url: &str,
        api_key: Option<String>,
    ) -> Result<Self, ApiError> {
        // Url::join drops the last path segment unless the base ends with '/'
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }

        Ok(Self {
            client,
            base_url: Url::parse(&base)?,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        tracing::debug!(%url, "POST");
        let response = self.authorize(self.client.post(url)).json(body).send().await?;
        read_json(response).await
    }

    async fn get_json<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        tracing::debug!(%url, params = query.len(), "GET");
        let response = self.authorize(self.client.get(url)).query(query).send().await?;
        read_json(response).await
    }
}

/// Decode a 2xx body, or turn the backend's error envelope into [`ApiError::Api`]
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        return Ok(serde_json::from_str(&body)?);
    }

    match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => Err(ApiError::Api {
            status: status.as_u16(),
            code: envelope.error.code,
            message: envelope.error.message,
            suggestion: envelope.error.suggestion,
        }),
        Err(_) => Err(ApiError::Api {
            status: status.as_u16(),
            code: format!("HTTP_{}", status.as_u16()),
            message: status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string(),
            suggestion: None,
        }),
    }
}

#[async_trait]
impl LibraryApi for HttpLibraryClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ApiError> {
        self.post_json("search", request).await
    }

    async fn ingest_one(
        &self,
        paper: &Paper,
        search_query: &str,
    ) -> Result<IngestResponse, ApiError> {
        let body = IngestRequest {
            paper,
            search_query,
        };
        self.post_json("library/ingest", &body).await
    }

    async fn ingest_batch(
        &self,
        papers: &[Paper],
        search_query: &str,
    ) -> Result<BulkIngestResponse, ApiError> {
        let body = BulkIngestRequest {
            papers,
            search_query,
        };
        self.post_json("library/ingest/bulk", &body).await
    }

    async fn check_saved(&self, external_ids: &[String]) -> Result<Vec<String>, ApiError> {
        let body = CheckLibraryRequest { external_ids };
        let response: CheckLibraryResponse = self.post_json("library/check", &body).await?;
        Ok(response.saved_ids)
    }

    async fn list_library(&self, query: &LibraryQuery) -> Result<LibraryListResponse, ApiError> {
        self.get_json("library", &query.to_query_pairs()).await
    }

    async fn download_stats(&self) -> Result<DownloadStats, ApiError> {
        self.get_json("library/download-stats", &[]).await
    }

    async fn retry_downloads(
        &self,
        scope: RetryScope,
    ) -> Result<RetryDownloadsResponse, ApiError> {
        let mut url = self.endpoint("library/retry-downloads")?;
        url.query_pairs_mut().append_pair("scope", scope.as_str());
        tracing::debug!(%url, "POST");
        let response = self.authorize(self.client.post(url)).send().await?;
        read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DownloadStatus, PaperSource};
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard, api_key: Option<&str>) -> HttpLibraryClient {
        HttpLibraryClient::from_client(
            Client::new(),
            &format!("{}/api/v2", server.url()),
            api_key.map(str::to_string),
        )
        .unwrap()
    }

    #[test]
    fn test_base_url_keeps_prefix() {
        let client =
            HttpLibraryClient::from_client(Client::new(), "http://localhost:8000/api/v2", None)
                .unwrap();
        assert_eq!(
            client.endpoint("library/check").unwrap().as_str(),
            "http://localhost:8000/api/v2/library/check"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = HttpLibraryClient::from_client(Client::new(), "not a url", None);
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_search_posts_filters_with_api_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/search")
            .match_header("x-api-key", "secret")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "query": "protein folding",
                "year_start": 2020
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"results": [{"title": "AlphaFold", "citation_count": 3, "authors": [],
                    "source": "semantic", "external_id": "10.1038/s41586-021-03819-2"}],
                    "meta": {"raw_semantic": 1, "total": 1}}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server, Some("secret"));
        let response = client
            .search(&SearchRequest::new("protein folding").year_start(2020))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].source, PaperSource::Semantic);
        assert_eq!(response.meta.total, 1);
    }

    #[tokio::test]
    async fn test_error_envelope_is_parsed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v2/library/ingest/bulk")
            .with_status(503)
            .with_body(
                r#"{"success": false, "error": {"code": "DB_UNAVAILABLE",
                    "message": "database is down", "suggestion": "try again later"}}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server, None);
        let papers = vec![Paper::new("A", PaperSource::Arxiv)];
        let err = client.ingest_batch(&papers, "q").await.unwrap_err();

        match err {
            ApiError::Api {
                status,
                code,
                suggestion,
                ..
            } => {
                assert_eq!(status, 503);
                assert_eq!(code, "DB_UNAVAILABLE");
                assert_eq!(suggestion.as_deref(), Some("try again later"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_plain_error_body_falls_back_to_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v2/library/download-stats")
            .with_status(500)
            .with_body("Internal Server Error")
            .create_async()
            .await;

        let client = client_for(&server, None);
        let err = client.download_stats().await.unwrap_err();
        assert!(matches!(err, ApiError::Api { status: 500, ref code, .. } if code == "HTTP_500"));
    }

    #[tokio::test]
    async fn test_malformed_success_body_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v2/library/check")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = client_for(&server, None);
        let err = client.check_saved(&["10.1/x".to_string()]).await.unwrap_err();
        assert!(matches!(err, ApiError::Parse(_)));
    }

    #[tokio::test]
    async fn test_list_library_sends_only_set_params() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v2/library")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("limit".into(), "100".into()),
                Matcher::UrlEncoded("status".into(), "completed".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"items": [], "total": 0, "page": 1, "limit": 100}"#)
            .create_async()
            .await;

        let client = client_for(&server, None);
        let query = LibraryQuery {
            limit: Some(100),
            status: Some(DownloadStatus::Completed),
            year_start: Some(20),
            ..Default::default()
        };
        let response = client.list_library(&query).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.total, 0);
    }

    #[tokio::test]
    async fn test_retry_downloads_scope_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/library/retry-downloads")
            .match_query(Matcher::UrlEncoded("scope".into(), "all".into()))
            .with_status(200)
            .with_body(r#"{"status": "ok", "message": "3 downloads re-queued"}"#)
            .create_async()
            .await;

        let client = client_for(&server, None);
        let response = client.retry_downloads(RetryScope::All).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.message, "3 downloads re-queued");
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let client =
            HttpLibraryClient::from_client(Client::new(), "http://127.0.0.1:9/api/v2", None)
                .unwrap();
        let err = client.download_stats().await.unwrap_err();
        assert_eq!(err.class(), crate::client::ErrorClass::Transport);
    }
}
