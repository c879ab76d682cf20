//! HTTP transport against the task backend.
//!
//! Owns one `reqwest` client and the base endpoint. One-shot requests are
//! returned as whole bodies; event streams are exposed as lazily produced
//! lines read straight off the chunked response.

use std::pin::Pin;
use std::time::Duration;

use futures::{Stream, TryStreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::multipart::Form;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Result, TaskError};

/// Lines of a streamed response body, without their `\n` or `\r\n` terminators.
///
/// Lines that are not valid UTF-8 are logged and skipped. A read failure is
/// yielded once and ends the stream. Dropping the stream closes the
/// underlying connection.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Successful (2xx) response to a one-shot request.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status, always 2xx.
    pub status: StatusCode,
    /// Full response body.
    pub body: Vec<u8>,
}

/// HTTP access to one backend.
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    base_url: Url,
    request_timeout: Option<Duration>,
}

impl Transport {
    /// Build the underlying client from `config`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        let client = builder.build().map_err(|e| {
            TaskError::Network(format!("failed to create HTTP client: {e}"))
        })?;

        debug!(base_url = %config.base_url, "created task transport");

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            request_timeout: config.request_timeout,
        })
    }

    /// Backend root all endpoints are built from.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build `{base}/{route...}[/{task_id}]`.
    pub fn endpoint(&self, route: &[&str], task_id: Option<&str>) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                TaskError::InvalidEndpoint(format!(
                    "{} cannot be used as a base URL",
                    self.base_url
                ))
            })?;
            segments.pop_if_empty().extend(route);

            if let Some(task_id) = task_id {
                if task_id.trim().is_empty() {
                    return Err(TaskError::InvalidEndpoint(
                        "task id must not be empty".to_string(),
                    ));
                }
                segments.push(task_id);
            }
        }
        Ok(url)
    }

    /// One-shot `GET`.
    pub async fn get(&self, url: Url) -> Result<RawResponse> {
        self.execute(self.client.get(url)).await
    }

    /// One-shot `DELETE`.
    pub async fn delete(&self, url: Url) -> Result<RawResponse> {
        self.execute(self.client.delete(url)).await
    }

    /// One-shot `POST` with a JSON body.
    pub async fn post_json<B>(&self, url: Url, body: &B) -> Result<RawResponse>
    where
        B: Serialize + ?Sized,
    {
        self.execute(self.client.post(url).json(body)).await
    }

    /// One-shot `POST` with a multipart form.
    pub async fn post_multipart(&self, url: Url, form: Form) -> Result<RawResponse> {
        self.execute(self.client.post(url).multipart(form)).await
    }

    /// Open a `text/event-stream` response and expose its body as lines.
    ///
    /// The handshake status is checked before any of the body is read.
    pub async fn open_stream(&self, url: Url) -> Result<LineStream> {
        debug!(%url, "opening event stream");

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TaskError::Network(format!(
                "stream handshake for {url} failed with status {status}"
            )));
        }

        let body = Box::pin(response.bytes_stream().map_err(std::io::Error::other));
        let mut lines = StreamReader::new(body).split(b'\n');

        let stream = async_stream::stream! {
            loop {
                match lines.next_segment().await {
                    Ok(Some(mut raw)) => {
                        if raw.last() == Some(&b'\r') {
                            raw.pop();
                        }
                        match String::from_utf8(raw) {
                            Ok(line) => yield Ok::<String, TaskError>(line),
                            Err(err) => {
                                warn!(%url, error = %err, "dropping line that is not UTF-8");
                            }
                        }
                    }
                    Ok(None) => {
                        debug!(%url, "event stream closed by server");
                        break;
                    }
                    Err(err) => {
                        warn!(%url, error = %err, "event stream read failed");
                        yield Err(TaskError::Network(format!("event stream read failed: {err}")));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<RawResponse> {
        let request = match self.request_timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TaskError::Network(format!(
                "Request failed with status {status}: {error_text}"
            )));
        }

        let body = response.bytes().await?.to_vec();
        Ok(RawResponse { status, body })
    }
}
