//! Purpose: Provide the synchronous HTTP client used in forward mode.
//! Exports: `PeerClient`.
//! Role: Blind relay to the sibling gateway; always requests `direct=true`.
//! Invariants: The peer base URL is http/https with no path component.
//! Invariants: Every request carries an explicit timeout; there are no retries.
//! Invariants: Peer error statuses are preserved on the returned `Error`.

use crate::core::catalog::{Dataset, FileType};
use crate::core::error::{Error, ErrorKind};
use serde_json::Value;
use std::time::Duration;
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct PeerClient {
    base_url: Url,
    agent: ureq::Agent,
}

impl PeerClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        Ok(Self {
            base_url: normalize_base_url(base_url.into())?,
            agent: build_agent(DEFAULT_TIMEOUT),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Forward a parse-one-type request: `GET /parse/{set}/{type}?direct=true`.
    pub fn fetch_one(&self, dataset: Dataset, file_type: FileType) -> Result<Value, Error> {
        self.fetch(&["parse", dataset.as_str(), file_type.as_str()])
    }

    /// Forward a parse-all-types request: `GET /parse/{set}?direct=true`.
    pub fn fetch_all(&self, dataset: Dataset) -> Result<Value, Error> {
        self.fetch(&["parse", dataset.as_str()])
    }

    fn fetch(&self, segments: &[&str]) -> Result<Value, Error> {
        let mut url = build_url(&self.base_url, segments)?;
        url.query_pairs_mut().append_pair("direct", "true");

        let response = self
            .agent
            .request("GET", url.as_str())
            .set("Accept", "application/json")
            .call();
        match response {
            Ok(resp) => read_json_response(resp),
            Err(ureq::Error::Status(status, resp)) => Err(parse_error_response(status, resp)),
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Io)
                .with_message(format!("error communicating with peer service: {err}"))
                .with_source(err)),
        }
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::builder().timeout(timeout).build()
}

fn normalize_base_url(raw: String) -> Result<Url, Error> {
    let mut url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid peer base url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(
            Error::new(ErrorKind::Usage).with_message("peer base url must use http or https scheme")
        );
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(
            Error::new(ErrorKind::Usage).with_message("peer base url must not include a path")
        );
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn build_url(base_url: &Url, segments: &[&str]) -> Result<Url, Error> {
    let mut url = base_url.clone();
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            Error::new(ErrorKind::Usage).with_message("peer base url cannot be a base")
        })?;
        path.clear();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

fn read_json_response(response: ureq::Response) -> Result<Value, Error> {
    let body = response.into_string().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read peer response body")
            .with_source(err)
    })?;
    serde_json::from_str(&body).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("invalid json in peer response")
            .with_source(err)
    })
}

/// Peer errors are expected to carry a `detail` field; fall back to a generic
/// status message when the body is not our envelope.
fn parse_error_response(status: u16, response: ureq::Response) -> Error {
    let body = response.into_string().unwrap_or_default();
    let detail = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| value.get("detail").and_then(Value::as_str).map(str::to_string));
    let message = detail.unwrap_or_else(|| format!("peer error status {status}"));
    Error::new(error_kind_from_status(status))
        .with_message(message)
        .with_status(status)
}

fn error_kind_from_status(status: u16) -> ErrorKind {
    match status {
        400 | 405 | 413 => ErrorKind::Usage,
        404 => ErrorKind::NotFound,
        500..=599 => ErrorKind::Internal,
        _ => ErrorKind::Io,
    }
}
