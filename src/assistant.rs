// src/assistant.rs
//! Assistant chat stream and per-user recommendations.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::session::anon_id;

/// Reassembles newline-delimited text from arbitrary byte chunks.
/// Splitting happens on raw bytes, so a UTF-8 sequence cut between chunks
/// is decoded only once its line is complete.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns the complete, non-blank lines it finished.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]).into_owned();
            if !line.trim().is_empty() {
                lines.push(line);
            }
        }
        lines
    }

    /// Whatever followed the last newline, if not blank.
    pub fn finish(self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        (!rest.trim().is_empty()).then_some(rest)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    user_id: &'a str,
    message: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub user_id: String,
    /// Shape is owned by the API; passed through untouched.
    #[serde(default)]
    pub recommendations: Vec<serde_json::Value>,
}

#[derive(Clone)]
pub struct AssistantClient {
    base_url: String,
    client: Client,
}

impl AssistantClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Stream the assistant's answer; `on_line` gets every non-blank line
    /// as soon as it is complete. Returns the number of lines delivered.
    pub async fn chat_stream<F>(&self, user_id: &str, message: &str, mut on_line: F) -> Result<usize>
    where
        F: FnMut(&str),
    {
        let url = self.url("chat/stream");
        let mut resp = self
            .client
            .post(&url)
            .json(&ChatRequest { user_id, message })
            .send()
            .await
            .with_context(|| format!("POST {url}"))?
            .error_for_status()
            .context("chat stream rejected")?;

        let mut buf = LineBuffer::new();
        let mut delivered = 0usize;
        while let Some(chunk) = resp.chunk().await.context("reading chat stream")? {
            for line in buf.push(&chunk) {
                on_line(&line);
                delivered += 1;
            }
        }
        if let Some(rest) = buf.finish() {
            on_line(&rest);
            delivered += 1;
        }

        debug!(target: "assistant", user = %anon_id(user_id), delivered, "chat stream finished");
        Ok(delivered)
    }

    /// Whole answer as one string, lines joined with `\n`.
    pub async fn chat(&self, user_id: &str, message: &str) -> Result<String> {
        let mut lines = Vec::new();
        self.chat_stream(user_id, message, |l| lines.push(l.to_string()))
            .await?;
        Ok(lines.join("\n"))
    }

    pub async fn recommendations(&self, user_id: &str) -> Result<Recommendations> {
        let url = self.url(&format!("users/{user_id}/recommendations"));
        self.client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .context("recommendations rejected")?
            .json::<Recommendations>()
            .await
            .context("decoding recommendations")
    }
}
