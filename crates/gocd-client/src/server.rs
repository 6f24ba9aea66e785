//! GoCD server access abstraction
//!
//! Only the endpoints needed to build the pipeline graph and to poll for
//! scheduled instances and artifacts are covered.

use async_trait::async_trait;
use gocd_core::{
    ArtifactLocator, GocdConfig, GocdError, PipelineGroup, PipelineHistory, PipelineInstance,
    Result,
};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::{debug, instrument};

use crate::auth::Credentials;

const ACCEPT_V1: &str = "application/vnd.go.cd.v1+json";
const ACCEPT_JSON: &str = "application/json";

/// Trait for talking to a GoCD server (allows mocking in tests)
#[async_trait]
pub trait GoServer: Send + Sync {
    /// Every pipeline group with its pipeline configurations
    async fn pipeline_groups(&self) -> Result<Vec<PipelineGroup>>;

    /// Most recent instances of a pipeline, newest first
    async fn pipeline_history(&self, name: &str) -> Result<Vec<PipelineInstance>>;

    /// Trigger a new run of a pipeline
    async fn schedule(&self, name: &str) -> Result<()>;

    /// Whether an artifact has been published yet
    async fn artifact_exists(&self, locator: &ArtifactLocator) -> Result<bool>;
}

/// Real server reached over HTTP
#[derive(Clone)]
pub struct HttpServer {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl HttpServer {
    /// Create a client for the configured server with explicit credentials
    pub fn new(config: &GocdConfig, credentials: Credentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.server.timeout())
            .build()
            .map_err(|e| GocdError::Http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            credentials,
        })
    }

    /// Create a client using credentials from the environment
    pub fn from_config(config: &GocdConfig) -> Result<Self> {
        Self::new(config, Credentials::from_env(&config.server))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a path below `/go/`
    pub fn url(&self, path: &str) -> String {
        format!("{}/go/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str, accept: &str) -> RequestBuilder {
        let request = self
            .client
            .request(method, self.url(path))
            .header("Accept", accept);
        self.credentials.apply(request)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        request
            .send()
            .await
            .map_err(|e| GocdError::Http(format!("Failed to send request: {}", e)))
    }
}

/// Turn a non-success response into an `Api` error
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown".to_string());

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(GocdError::Auth(format!("Server refused credentials ({})", status)));
    }

    Err(GocdError::Api {
        status: status.as_u16(),
        body,
    })
}

async fn parse<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| GocdError::Http(format!("Failed to parse response: {}", e)))
}

#[async_trait]
impl GoServer for HttpServer {
    #[instrument(skip(self), fields(server = %self.base_url))]
    async fn pipeline_groups(&self) -> Result<Vec<PipelineGroup>> {
        let request = self.request(Method::GET, "api/config/pipeline_groups", ACCEPT_JSON);
        let response = check(self.send(request).await?).await?;
        let groups: Vec<PipelineGroup> = parse(response).await?;

        debug!("Fetched {} pipeline groups", groups.len());
        Ok(groups)
    }

    #[instrument(skip(self), fields(server = %self.base_url))]
    async fn pipeline_history(&self, name: &str) -> Result<Vec<PipelineInstance>> {
        let path = format!("api/pipelines/{}/history", name);
        let response = self.send(self.request(Method::GET, &path, ACCEPT_V1)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(GocdError::PipelineNotFound(name.to_string()));
        }

        let history: PipelineHistory = parse(check(response).await?).await?;
        debug!("Pipeline {} has {} recent instances", name, history.pipelines.len());
        Ok(history.pipelines)
    }

    #[instrument(skip(self), fields(server = %self.base_url))]
    async fn schedule(&self, name: &str) -> Result<()> {
        let path = format!("api/pipelines/{}/schedule", name);
        let request = self
            .request(Method::POST, &path, ACCEPT_V1)
            .header("X-GoCD-Confirm", "true");
        let response = self.send(request).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(GocdError::PipelineNotFound(name.to_string()));
        }

        check(response).await?;
        tracing::info!("Scheduled pipeline {}", name);
        Ok(())
    }

    #[instrument(skip(self), fields(server = %self.base_url))]
    async fn artifact_exists(&self, locator: &ArtifactLocator) -> Result<bool> {
        let path = format!("files/{}", locator.url_path());
        let response = self.send(self.request(Method::GET, &path, "*/*")).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            // the server answers 202 while it is still zipping a directory
            StatusCode::ACCEPTED => Ok(false),
            _ => check(response).await.map(|_| true),
        }
    }
}

/// Mock server for testing
///
/// History and artifact answers are queues: each call consumes the front
/// entry until one remains, which is then repeated forever.
#[derive(Default)]
pub struct MockServer {
    groups: Vec<PipelineGroup>,
    histories: Mutex<HashMap<String, VecDeque<Vec<PipelineInstance>>>>,
    artifacts: Mutex<HashMap<String, VecDeque<bool>>>,
    scheduled: Mutex<Vec<String>>,
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_groups(mut self, groups: Vec<PipelineGroup>) -> Self {
        self.groups = groups;
        self
    }

    /// Queue one answer for `pipeline_history(name)`
    pub fn with_history(self, name: &str, instances: Vec<PipelineInstance>) -> Self {
        lock(&self.histories)
            .entry(name.to_string())
            .or_default()
            .push_back(instances);
        self
    }

    /// Queue one answer for `artifact_exists(locator)`
    pub fn with_artifact(self, locator: &ArtifactLocator, exists: bool) -> Self {
        lock(&self.artifacts)
            .entry(locator.url_path())
            .or_default()
            .push_back(exists);
        self
    }

    /// Pipelines scheduled so far, in call order
    pub fn scheduled(&self) -> Vec<String> {
        lock(&self.scheduled).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn next_answer<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

#[async_trait]
impl GoServer for MockServer {
    async fn pipeline_groups(&self) -> Result<Vec<PipelineGroup>> {
        Ok(self.groups.clone())
    }

    async fn pipeline_history(&self, name: &str) -> Result<Vec<PipelineInstance>> {
        lock(&self.histories)
            .get_mut(name)
            .and_then(next_answer)
            .ok_or_else(|| GocdError::PipelineNotFound(name.to_string()))
    }

    async fn schedule(&self, name: &str) -> Result<()> {
        let known = self
            .groups
            .iter()
            .flat_map(|g| &g.pipelines)
            .any(|p| p.name == name)
            || lock(&self.histories).contains_key(name);

        if !known {
            return Err(GocdError::PipelineNotFound(name.to_string()));
        }

        lock(&self.scheduled).push(name.to_string());
        Ok(())
    }

    async fn artifact_exists(&self, locator: &ArtifactLocator) -> Result<bool> {
        Ok(lock(&self.artifacts)
            .get_mut(&locator.url_path())
            .and_then(next_answer)
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gocd_core::Pipeline;

    fn instance(name: &str, counter: u64) -> PipelineInstance {
        PipelineInstance {
            name: name.to_string(),
            counter,
            label: Some(counter.to_string()),
            stages: vec![],
        }
    }

    #[test]
    fn test_url_building() {
        let config = GocdConfig::default().with_url("https://ci.example.com/");
        let server = HttpServer::new(&config, Credentials::Anonymous).unwrap();

        assert_eq!(server.base_url(), "https://ci.example.com");
        assert_eq!(
            server.url("api/config/pipeline_groups"),
            "https://ci.example.com/go/api/config/pipeline_groups"
        );
        assert_eq!(
            server.url("/files/up42/1/s/1/j/a.txt"),
            "https://ci.example.com/go/files/up42/1/s/1/j/a.txt"
        );
    }

    #[tokio::test]
    async fn test_mock_history_queue() {
        let server = MockServer::new()
            .with_history("up42", vec![instance("up42", 1)])
            .with_history("up42", vec![instance("up42", 2), instance("up42", 1)]);

        let first = server.pipeline_history("up42").await.unwrap();
        assert_eq!(first[0].counter, 1);

        // last answer repeats
        for _ in 0..2 {
            let next = server.pipeline_history("up42").await.unwrap();
            assert_eq!(next[0].counter, 2);
        }
    }

    #[tokio::test]
    async fn test_mock_unknown_pipeline() {
        let server = MockServer::new();
        let err = server.pipeline_history("nope").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(server.schedule("nope").await.is_err());
    }

    #[tokio::test]
    async fn test_mock_schedule_records_calls() {
        let server = MockServer::new().with_groups(vec![PipelineGroup {
            name: "g".to_string(),
            pipelines: vec![Pipeline::new("up42")],
        }]);

        server.schedule("up42").await.unwrap();
        server.schedule("up42").await.unwrap();
        assert_eq!(server.scheduled(), vec!["up42", "up42"]);
    }

    #[tokio::test]
    async fn test_mock_artifact_defaults_to_missing() {
        let locator = ArtifactLocator {
            pipeline: "up42".to_string(),
            pipeline_counter: 1,
            stage: "s".to_string(),
            stage_counter: 1,
            job: "j".to_string(),
            path: "out.txt".to_string(),
        };
        let server = MockServer::new();
        assert!(!server.artifact_exists(&locator).await.unwrap());

        let server = MockServer::new()
            .with_artifact(&locator, false)
            .with_artifact(&locator, true);
        assert!(!server.artifact_exists(&locator).await.unwrap());
        assert!(server.artifact_exists(&locator).await.unwrap());
        assert!(server.artifact_exists(&locator).await.unwrap());
    }
}
