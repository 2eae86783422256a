// src/client.rs
//! Typed page source: one capability, `fetch_page`, for every collection.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::model::Collection;

/// Raw page body as returned by the API. `Value::Null` stands for an empty
/// or unreadable body; the fetcher decides what a body means.
pub type PageBody = Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub collection: Collection,
    /// 1-based.
    pub page: u32,
    pub limit: usize,
    /// Extra query parameters (e.g. `area=Salud`), sent after page/limit.
    pub filters: Vec<(String, String)>,
}

impl PageRequest {
    pub fn new(collection: Collection, page: u32, limit: usize) -> Self {
        Self {
            collection,
            page: page.max(1),
            limit: limit.max(1),
            filters: Vec::new(),
        }
    }

    pub fn with_filters(mut self, filters: Vec<(String, String)>) -> Self {
        self.filters = filters;
        self
    }

    /// Query string pairs in wire order.
    pub fn query(&self) -> Vec<(String, String)> {
        let mut q = Vec::with_capacity(2 + self.filters.len());
        q.push(("page".to_string(), self.page.to_string()));
        q.push(("limit".to_string(), self.limit.to_string()));
        q.extend(self.filters.iter().cloned());
        q
    }
}

#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, req: &PageRequest) -> Result<PageBody>;
    fn name(&self) -> &'static str;
}

/// HTTP implementation over the directory API.
#[derive(Clone)]
pub struct HttpPageSource {
    base_url: String,
    client: Client,
}

impl HttpPageSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    pub fn endpoint(&self, collection: Collection) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            collection.path()
        )
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch_page(&self, req: &PageRequest) -> Result<PageBody> {
        let url = self.endpoint(req.collection);
        let resp = self
            .client
            .get(&url)
            .query(&req.query())
            .send()
            .await
            .with_context(|| format!("GET {url} page={}", req.page))?;
        let resp = resp
            .error_for_status()
            .with_context(|| format!("{} page {} rejected", req.collection, req.page))?;
        let text = resp.text().await.context("reading page body")?;
        Ok(parse_body(&text))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Empty or non-JSON bodies become `Null`.
pub fn parse_body(text: &str) -> PageBody {
    if text.trim().is_empty() {
        return Value::Null;
    }
    match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(target: "fetch", error = %e, "page body is not json");
            Value::Null
        }
    }
}

// --- Test helper ---

/// One scripted answer for `ScriptedPageSource`.
#[derive(Debug, Clone)]
pub enum Scripted {
    Body(PageBody),
    Fail(String),
}

/// Replays a fixed script of answers and records every request.
/// Once the script runs out it answers with an empty body.
pub struct ScriptedPageSource {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<PageRequest>>,
}

impl ScriptedPageSource {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Each inner vector becomes one JSON array page.
    pub fn from_pages(pages: Vec<Vec<Value>>) -> Self {
        Self::new(
            pages
                .into_iter()
                .map(|p| Scripted::Body(Value::Array(p)))
                .collect(),
        )
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests
            .lock()
            .expect("scripted source mutex poisoned")
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .expect("scripted source mutex poisoned")
            .len()
    }
}

#[async_trait]
impl PageSource for ScriptedPageSource {
    async fn fetch_page(&self, req: &PageRequest) -> Result<PageBody> {
        self.requests
            .lock()
            .expect("scripted source mutex poisoned")
            .push(req.clone());
        let next = self
            .script
            .lock()
            .expect("scripted source mutex poisoned")
            .pop_front();
        match next {
            Some(Scripted::Body(v)) => Ok(v),
            Some(Scripted::Fail(msg)) => Err(anyhow!(msg)),
            None => Ok(Value::Null),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_orders_page_limit_then_filters() {
        let req = PageRequest::new(Collection::Careers, 3, 20)
            .with_filters(vec![("area".into(), "Salud".into())]);
        let q = req.query();
        assert_eq!(q[0], ("page".to_string(), "3".to_string()));
        assert_eq!(q[1], ("limit".to_string(), "20".to_string()));
        assert_eq!(q[2], ("area".to_string(), "Salud".to_string()));
    }

    #[test]
    fn request_clamps_page_and_limit() {
        let req = PageRequest::new(Collection::Universities, 0, 0);
        assert_eq!(req.page, 1);
        assert_eq!(req.limit, 1);
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let src = HttpPageSource::new("http://localhost:9000/");
        assert_eq!(
            src.endpoint(Collection::Careers),
            "http://localhost:9000/careers/"
        );
        assert_eq!(
            src.endpoint(Collection::Universities),
            "http://localhost:9000/universities"
        );
    }

    #[test]
    fn empty_and_garbage_bodies_are_null() {
        assert_eq!(parse_body("   "), Value::Null);
        assert_eq!(parse_body("<html>502</html>"), Value::Null);
        assert!(parse_body("[]").is_array());
    }
}
