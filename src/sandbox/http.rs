//! HTTP client for the remote sandbox REST API.
//!
//! All endpoints live under the configured `api_url`:
//! `templates/{name}`, `sandboxes/{name}`, `sandboxes/{name}/run` and
//! `sandboxes/{name}/files?path=...`.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{RemoteSandbox, RunOutput, SandboxError, SandboxService, TemplateInfo};
use crate::config::ServiceConfig;

/// Header carrying the API key.
const API_KEY_HEADER: &str = "X-Api-Key";

/// Added on top of server-side timeouts so the service can answer first.
const REQUEST_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct CreateTemplateRequest<'a> {
    name: &'a str,
    image: &'a str,
}

#[derive(Debug, Deserialize)]
struct TemplateBody {
    name: String,
    #[serde(default)]
    image: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateSandboxRequest<'a> {
    template_name: &'a str,
    timeout: u64,
}

#[derive(Debug, Deserialize)]
struct SandboxBody {
    name: String,
}

#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    command: &'a str,
    timeout: u64,
}

#[derive(Debug, Deserialize)]
struct RunBody {
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stderr: Option<String>,
    exit_code: i64,
}

/// Connection details shared by the service client and every sandbox handle.
struct ApiClient {
    api_url: String,
    api_key: Option<String>,
    request_timeout: Duration,
    http: reqwest::Client,
}

impl ApiClient {
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!("{} {}", method, url);

        let mut req = self
            .http
            .request(method, url)
            .timeout(self.request_timeout);
        if let Some(ref key) = self.api_key {
            req = req.header(API_KEY_HEADER, key);
        }
        req
    }

    /// Sends a request and maps transport failures and non-success statuses.
    ///
    /// `timeout` is only used to describe a timeout in the returned error.
    async fn send(
        &self,
        req: RequestBuilder,
        resource: &str,
        timeout: Duration,
    ) -> Result<Response, SandboxError> {
        let resp = req.send().await.map_err(|e| transport_error(&e, timeout))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SandboxError::not_found(resource));
        }
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable>".to_string());
            return Err(SandboxError::api(status.as_u16(), body));
        }

        Ok(resp)
    }
}

fn transport_error(err: &reqwest::Error, timeout: Duration) -> SandboxError {
    if err.is_timeout() {
        SandboxError::timeout(timeout)
    } else {
        SandboxError::request(err.to_string())
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, SandboxError> {
    resp.json::<T>()
        .await
        .map_err(|e| SandboxError::invalid_response(e.to_string()))
}

fn segment(name: &str) -> String {
    urlencoding::encode(name).into_owned()
}

/// Sandbox service client speaking the REST API.
#[derive(Clone)]
pub(crate) struct HttpSandboxService {
    client: Arc<ApiClient>,
}

impl HttpSandboxService {
    /// Creates a client for `api_url`.
    pub fn new(
        api_url: impl Into<String>,
        api_key: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, SandboxError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| SandboxError::request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client: Arc::new(ApiClient {
                api_url: api_url.into(),
                api_key,
                request_timeout,
                http,
            }),
        })
    }

    /// Creates a client from configuration, reading the API key from the
    /// environment variable named in the config.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, SandboxError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| SandboxError::missing_api_key(&config.api_key_env))?;

        Self::new(
            config.api_url.clone(),
            Some(api_key),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn handle(&self, name: String) -> Arc<dyn RemoteSandbox> {
        Arc::new(HttpSandbox {
            name,
            client: Arc::clone(&self.client),
        })
    }
}

#[async_trait]
impl SandboxService for HttpSandboxService {
    async fn get_template(&self, name: &str) -> Result<TemplateInfo, SandboxError> {
        let client = &self.client;
        let req = client.request(Method::GET, &format!("templates/{}", segment(name)));
        let resp = client
            .send(req, &format!("template {name}"), client.request_timeout)
            .await?;
        let body: TemplateBody = decode(resp).await?;

        Ok(TemplateInfo {
            name: body.name,
            image: body.image,
        })
    }

    async fn create_template(&self, name: &str, image: &str) -> Result<(), SandboxError> {
        let client = &self.client;
        let req = client
            .request(Method::POST, "templates")
            .json(&CreateTemplateRequest { name, image });
        client
            .send(req, &format!("template {name}"), client.request_timeout)
            .await?;
        Ok(())
    }

    async fn create_sandbox(
        &self,
        template: &str,
        timeout: Duration,
    ) -> Result<Arc<dyn RemoteSandbox>, SandboxError> {
        let client = &self.client;
        let req = client
            .request(Method::POST, "sandboxes")
            .timeout(timeout + REQUEST_GRACE)
            .json(&CreateSandboxRequest {
                template_name: template,
                timeout: timeout.as_secs(),
            });
        let resp = client
            .send(req, &format!("template {template}"), timeout)
            .await?;
        let body: SandboxBody = decode(resp).await?;

        if body.name.is_empty() {
            return Err(SandboxError::invalid_response(
                "service returned an empty sandbox name",
            ));
        }

        Ok(self.handle(body.name))
    }

    async fn get_sandbox(&self, name: &str) -> Result<Arc<dyn RemoteSandbox>, SandboxError> {
        let client = &self.client;
        let req = client.request(Method::GET, &format!("sandboxes/{}", segment(name)));
        let resp = client
            .send(req, &format!("sandbox {name}"), client.request_timeout)
            .await?;
        let body: SandboxBody = decode(resp).await?;

        Ok(self.handle(body.name))
    }

    async fn delete_sandbox(&self, name: &str) -> Result<(), SandboxError> {
        let client = &self.client;
        let req = client.request(Method::DELETE, &format!("sandboxes/{}", segment(name)));
        client
            .send(req, &format!("sandbox {name}"), client.request_timeout)
            .await?;
        Ok(())
    }
}

/// Handle to one sandbox on the REST API.
struct HttpSandbox {
    name: String,
    client: Arc<ApiClient>,
}

impl HttpSandbox {
    fn files_path(&self, path: &str) -> String {
        format!(
            "sandboxes/{}/files?path={}",
            segment(&self.name),
            urlencoding::encode(path)
        )
    }
}

#[async_trait]
impl RemoteSandbox for HttpSandbox {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, command: &str, timeout: Duration) -> Result<RunOutput, SandboxError> {
        let client = &self.client;
        let req = client
            .request(Method::POST, &format!("sandboxes/{}/run", segment(&self.name)))
            .timeout(timeout + REQUEST_GRACE)
            .json(&RunRequest {
                command,
                timeout: timeout.as_secs(),
            });
        let resp = client
            .send(req, &format!("sandbox {}", self.name), timeout)
            .await?;
        let body: RunBody = decode(resp).await?;

        Ok(RunOutput {
            stdout: body.stdout.unwrap_or_default(),
            stderr: body.stderr.unwrap_or_default(),
            exit_code: body.exit_code,
        })
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, SandboxError> {
        let client = &self.client;
        let req = client.request(Method::GET, &self.files_path(path));
        let resp = client
            .send(req, &format!("file {path}"), client.request_timeout)
            .await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| transport_error(&e, client.request_timeout))?;

        Ok(bytes.to_vec())
    }

    async fn write(&self, path: &str, content: &[u8]) -> Result<(), SandboxError> {
        let client = &self.client;
        let req = client
            .request(Method::PUT, &self.files_path(path))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(content.to_vec());
        client
            .send(req, &format!("file {path}"), client.request_timeout)
            .await?;
        Ok(())
    }
}
