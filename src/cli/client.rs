//! HTTP client for the running mediarec service.

use anyhow::{bail, Context, Result};
use reqwest::header::CONTENT_DISPOSITION;
use serde_json::Value;
use std::path::PathBuf;

use crate::session::SessionSnapshot;

const FALLBACK_FILENAME: &str = "recording.webm";

/// Where `download` writes the recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadTarget {
    /// Save under the server-provided filename, creating the directory if needed.
    Directory(PathBuf),
    /// Save to exactly this file.
    File(PathBuf),
}

impl DownloadTarget {
    /// Interpret a user-supplied `-o` path.
    ///
    /// Existing directories, paths ending in a separator and paths without
    /// an extension are directories; anything else names the file.
    pub fn from_output(path: PathBuf) -> Self {
        let trailing_separator = path
            .as_os_str()
            .to_string_lossy()
            .ends_with(std::path::is_separator);
        if path.is_dir() || trailing_separator || path.extension().is_none() {
            Self::Directory(path)
        } else {
            Self::File(path)
        }
    }

    pub fn resolve(&self, filename: &str) -> PathBuf {
        match self {
            Self::Directory(dir) => dir.join(filename),
            Self::File(path) => path.clone(),
        }
    }
}

pub struct SessionClient {
    client: reqwest::Client,
    base_url: String,
}

impl SessionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub async fn status(&self) -> Result<SessionSnapshot> {
        let response = self
            .client
            .get(format!("{}/status", self.base_url))
            .send()
            .await
            .context("Failed to connect to mediarec service. Is it running?")?;

        Ok(response.json().await?)
    }

    /// POST a session command and return the resulting snapshot.
    pub async fn command(&self, path: &str) -> Result<SessionSnapshot> {
        let json = self.post(path).await?;
        serde_json::from_value(json).context("Unexpected response from mediarec service")
    }

    pub async fn toggle_mode(&self) -> Result<String> {
        let json = self.post("toggle-mode").await?;
        Ok(json
            .get("mode")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown")
            .to_string())
    }

    /// Fetch the finished recording and write it to `output`.
    pub async fn download(&self, output: &DownloadTarget) -> Result<PathBuf> {
        let response = self
            .client
            .get(format!("{}/download", self.base_url))
            .send()
            .await
            .context("Failed to connect to mediarec service. Is it running?")?;

        let status = response.status();
        if !status.is_success() {
            let json: Value = response.json().await.unwrap_or(Value::Null);
            bail!("Download failed: {}", error_message(&json));
        }

        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| FALLBACK_FILENAME.to_string());

        let bytes = response.bytes().await?;

        let target = output.resolve(&filename);
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        tokio::fs::write(&target, &bytes)
            .await
            .with_context(|| format!("Failed to write recording to {:?}", target))?;

        Ok(target)
    }

    async fn post(&self, path: &str) -> Result<Value> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .send()
            .await
            .context("Failed to connect to mediarec service. Is it running?")?;

        let status = response.status();
        let json: Value = response.json().await?;

        if !status.is_success() {
            bail!("{}", error_message(&json));
        }

        Ok(json)
    }
}

fn error_message(json: &Value) -> &str {
    json.get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("Unknown error")
}

/// Extract `filename` from a `Content-Disposition` header value.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}
