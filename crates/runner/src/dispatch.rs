//! Executing test cases against the server

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;

use crate::case::{Method, TestCase};
use crate::error::{TowelError, TowelResult};

/// What the server answered, before any checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseResult {
    pub status: u16,
    pub body: String,
    /// As received; the dispatcher folds it
    pub content_type: String,
}

/// Capability to issue one HTTP request
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        method: reqwest::Method,
        url: &Url,
        body: Option<String>,
        headers: &[(&str, &str)],
    ) -> TowelResult<ResponseResult>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// `timeout` bounds each request; `None` waits as long as the server takes
    pub fn new(timeout: Option<Duration>) -> TowelResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        method: reqwest::Method,
        url: &Url,
        body: Option<String>,
        headers: &[(&str, &str)],
    ) -> TowelResult<ResponseResult> {
        let mut request = self.client.request(method, url.clone());
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.text().await?;

        Ok(ResponseResult {
            status,
            body,
            content_type,
        })
    }
}

/// Lower-case a content type and drop parameters such as `; charset=utf-8`.
pub fn fold_content_type(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Result of dispatching one case
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// GET or POST answer, content type folded
    Response(ResponseResult),
    /// Setup script ran to a successful exit
    SetupDone,
    /// Setup case without a script
    SetupSkipped,
}

/// Runs test cases one at a time
pub struct Dispatcher {
    transport: Box<dyn Transport>,
    setup_shell: String,
}

impl Dispatcher {
    pub fn new(transport: Box<dyn Transport>, setup_shell: impl Into<String>) -> Self {
        Self {
            transport,
            setup_shell: setup_shell.into(),
        }
    }

    pub async fn dispatch(&self, case: &TestCase) -> TowelResult<Dispatched> {
        match case.method {
            Method::Get => self.request(case, reqwest::Method::GET, None).await,
            Method::Post => {
                let body = match &case.request_data_path {
                    Some(path) => tokio::fs::read_to_string(path).await?,
                    None => String::new(),
                };
                self.request(case, reqwest::Method::POST, Some(body)).await
            }
            Method::Setup => self.setup(case).await,
        }
    }

    async fn request(
        &self,
        case: &TestCase,
        method: reqwest::Method,
        body: Option<String>,
    ) -> TowelResult<Dispatched> {
        let url = case.url.as_ref().ok_or(TowelError::MissingAttribute {
            index: case.index,
            attribute: "url",
        })?;

        debug!("{} {}", method, url);
        let headers: Vec<(&str, &str)> = match body {
            Some(_) => vec![("content-type", case.request_content_type.as_str())],
            None => Vec::new(),
        };

        let mut response = self.transport.send(method, url, body, &headers).await?;
        response.content_type = fold_content_type(&response.content_type);
        Ok(Dispatched::Response(response))
    }

    async fn setup(&self, case: &TestCase) -> TowelResult<Dispatched> {
        let Some(script) = case.request_data_path.as_deref() else {
            warn!("No file given in setup call, ignoring it.");
            return Ok(Dispatched::SetupSkipped);
        };

        self.run_script(script).await?;
        Ok(Dispatched::SetupDone)
    }

    async fn run_script(&self, script: &Path) -> TowelResult<()> {
        let failure = |reason: String| TowelError::SetupActionFailure {
            script: script.to_path_buf(),
            reason,
        };

        if !script.is_file() {
            return Err(failure("script not found".to_string()));
        }

        info!("Running setup script {} with {}", script.display(), self.setup_shell);
        let status = Command::new(&self.setup_shell)
            .arg(script)
            .status()
            .await
            .map_err(|e| failure(format!("cannot start {}: {}", self.setup_shell, e)))?;

        if !status.success() {
            return Err(failure(format!("exited with {}", status)));
        }
        Ok(())
    }
}
