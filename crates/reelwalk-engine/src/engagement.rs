//! HTTP clients for the image-analysis and comment-suggestion services.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use crate::error::EngineError;
use crate::ports::{AnalysisLabel, Analyzer, CommentGenerator, CommentRequest};

const ANALYSIS_FEATURES: &str = "labels,text,faces,safe_search";

#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    success: bool,
    #[serde(default)]
    results: Option<AnalysisResults>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnalysisResults {
    #[serde(default)]
    labels: Vec<AnalysisLabel>,
}

#[derive(Debug, Deserialize)]
struct SuggestResponse {
    #[serde(default)]
    suggestions: Vec<String>,
}

fn build_client(timeout_secs: u64, user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(user_agent)
        .build()
}

/// Client for `POST /analyze/image`.
pub struct AnalysisClient {
    client: Client,
    endpoint: String,
}

impl AnalysisClient {
    /// # Errors
    ///
    /// Returns [`EngineError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout_secs: u64, user_agent: &str) -> Result<Self, EngineError> {
        let client = build_client(timeout_secs, user_agent).map_err(|source| EngineError::Http {
            service: "analysis",
            source,
        })?;
        Ok(Self {
            client,
            endpoint: format!("{}/analyze/image", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl Analyzer for AnalysisClient {
    async fn analyze(
        &self,
        image: &[u8],
        content_type: &str,
    ) -> Result<Vec<AnalysisLabel>, EngineError> {
        let http = |source| EngineError::Http {
            service: "analysis",
            source,
        };
        let part = Part::bytes(image.to_vec())
            .file_name("story")
            .mime_str(content_type)
            .map_err(http)?;
        let form = Form::new()
            .part("file", part)
            .text("features", ANALYSIS_FEATURES);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(http)?;
        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Analysis(format!("HTTP {status}")));
        }

        let body: AnalysisResponse = response.json().await.map_err(http)?;
        if !body.success {
            return Err(EngineError::Analysis(
                body.error.unwrap_or_else(|| "analysis reported failure".to_owned()),
            ));
        }
        Ok(body.results.map(|r| r.labels).unwrap_or_default())
    }
}

/// Client for `POST /comments/suggest`.
pub struct CommentClient {
    client: Client,
    endpoint: String,
}

impl CommentClient {
    /// # Errors
    ///
    /// Returns [`EngineError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout_secs: u64, user_agent: &str) -> Result<Self, EngineError> {
        let client = build_client(timeout_secs, user_agent).map_err(|source| EngineError::Http {
            service: "comments",
            source,
        })?;
        Ok(Self {
            client,
            endpoint: format!("{}/comments/suggest", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl CommentGenerator for CommentClient {
    async fn suggest(&self, request: &CommentRequest) -> Result<Vec<String>, EngineError> {
        let http = |source| EngineError::Http {
            service: "comments",
            source,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(http)?;
        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Comment(format!("HTTP {status}")));
        }
        let body: SuggestResponse = response.json().await.map_err(http)?;
        Ok(body
            .suggestions
            .into_iter()
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect())
    }
}

/// Engagement collaborators that are not configured. Analysis yields no
/// labels and suggestion yields nothing, so every candidate story ends in
/// `no_comment_suggestion`.
pub struct Disabled;

#[async_trait]
impl Analyzer for Disabled {
    async fn analyze(&self, _: &[u8], _: &str) -> Result<Vec<AnalysisLabel>, EngineError> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl CommentGenerator for Disabled {
    async fn suggest(&self, _: &CommentRequest) -> Result<Vec<String>, EngineError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn analyze_posts_multipart_and_reads_labels() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze/image"))
            .and(body_string_contains("labels,text,faces,safe_search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "results": {
                    "labels": [
                        { "label": "Beach", "confidence": 0.91, "bbox": null },
                        { "label": "Text", "confidence": 0.42, "bbox": null }
                    ]
                }
            })))
            .mount(&server)
            .await;

        let client = AnalysisClient::new(&server.uri(), 5, "reelwalk-test").unwrap();
        let labels = client.analyze(&[0xFF, 0xD8, 0xFF], "image/jpeg").await.unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].label, "Beach");
    }

    #[tokio::test]
    async fn analyze_failure_flag_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze/image"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "error": "model not loaded"
            })))
            .mount(&server)
            .await;

        let client = AnalysisClient::new(&server.uri(), 5, "reelwalk-test").unwrap();
        let err = client.analyze(&[1, 2, 3], "image/png").await.unwrap_err();
        assert!(matches!(err, EngineError::Analysis(ref m) if m == "model not loaded"));
    }

    #[tokio::test]
    async fn suggest_drops_blank_suggestions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/comments/suggest"))
            .and(body_partial_json(serde_json::json!({ "story_id": "3301" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "suggestions": ["  ", "Gorgeous light!"]
            })))
            .mount(&server)
            .await;

        let client = CommentClient::new(&server.uri(), 5, "reelwalk-test").unwrap();
        let request = CommentRequest {
            profile_username: "alice".into(),
            story_id: "3301".into(),
            media_url: "https://cdn.example/a.jpg".into(),
            labels: vec!["beach".into()],
        };
        let suggestions = client.suggest(&request).await.unwrap();
        assert_eq!(suggestions, vec!["Gorgeous light!".to_owned()]);
    }
}
