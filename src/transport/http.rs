use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;

use super::{SourceRef, Transport, commit_part, part_path};
use crate::error::{EngineError, JobError};

/// HTTP GET download with a bounded timeout and an identifying user agent.
/// The body is read fully, written to a temp sibling and renamed into place.
#[derive(Debug, Clone)]
pub struct HttpDownload {
    client: Client,
}

impl HttpDownload {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(user_agent.to_string())
            .build()
            .map_err(|e| EngineError::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }
}

fn classify(err: reqwest::Error) -> JobError {
    if err.is_timeout() {
        JobError::Timeout(err.to_string())
    } else if err.is_connect() {
        JobError::Connect(err.to_string())
    } else if let Some(status) = err.status() {
        JobError::HttpStatus(status.as_u16())
    } else {
        JobError::Http(err.to_string())
    }
}

impl Transport for HttpDownload {
    fn transfer(&self, source: &SourceRef, dest: &Path) -> Result<u64, JobError> {
        let SourceRef::Url(url) = source else {
            return Err(JobError::Http(format!("not a url: {}", source)));
        };
        let resp = self.client.get(url).send().map_err(classify)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(JobError::HttpStatus(status.as_u16()));
        }
        let body = resp.bytes().map_err(classify)?;
        let tmp = part_path(dest);
        if let Err(e) = std::fs::write(&tmp, &body) {
            let _ = std::fs::remove_file(&tmp);
            return Err(JobError::from_io(&e));
        }
        commit_part(&tmp, dest)?;
        tracing::debug!(url = %url, bytes = body.len(), "downloaded");
        Ok(body.len() as u64)
    }
}
