// src/config/catalog.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::fetch::{FetchOptions, DEFAULT_PAGE_SIZE};
use crate::model::Collection;

// --- env defaults & names ---
pub const DEFAULT_CATALOG_CONFIG_PATH: &str = "config/catalog.toml";
pub const DEFAULT_API_URL: &str = "http://3.144.209.174";
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_SESSION_PATH: &str = "data/session.json";

pub const ENV_CATALOG_CONFIG_PATH: &str = "CATALOG_CONFIG_PATH";
pub const ENV_API_URL: &str = "CATALOG_API_URL";
pub const ENV_PAGE_SIZE: &str = "CATALOG_PAGE_SIZE";
pub const ENV_BIND: &str = "CATALOG_BIND";
pub const ENV_SESSION_PATH: &str = "CATALOG_SESSION_PATH";
pub const ENV_SYNTHETIC_SCORES: &str = "CATALOG_SYNTHETIC_SCORES";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Base URL of the directory API.
    pub api_url: String,
    /// Records requested per page; clamped to >= 1.
    pub page_size: usize,
    /// Listen address of the JSON service.
    pub bind: String,
    pub session_path: PathBuf,
    pub synthesize_scores: bool,
    pub fallback_universities: bool,
    /// Extra query parameters for every careers page request.
    pub career_filters: BTreeMap<String, String>,
    pub university_filters: BTreeMap<String, String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            bind: DEFAULT_BIND.to_string(),
            session_path: PathBuf::from(DEFAULT_SESSION_PATH),
            synthesize_scores: true,
            fallback_universities: true,
            career_filters: BTreeMap::new(),
            university_filters: BTreeMap::new(),
        }
    }
}

impl CatalogConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: CatalogConfig = toml::from_str(s).context("parsing catalog config")?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading catalog config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $CATALOG_CONFIG_PATH (must exist)
    /// 2) config/catalog.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CATALOG_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!(
                    "{ENV_CATALOG_CONFIG_PATH} points to non-existent path {}",
                    pb.display()
                ));
            }
            Self::load_from(&pb)?
        } else {
            let default_p = PathBuf::from(DEFAULT_CATALOG_CONFIG_PATH);
            if default_p.exists() {
                Self::load_from(&default_p)?
            } else {
                Self::default()
            }
        };
        cfg.apply_overrides(|k| std::env::var(k).ok());
        Ok(cfg)
    }

    /// Apply `CATALOG_*` overrides from `lookup`. Values that do not parse
    /// are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_url = v.trim().to_string();
        }
        if let Some(v) = lookup(ENV_PAGE_SIZE) {
            match v.trim().parse::<usize>() {
                Ok(n) => self.page_size = n,
                Err(_) => tracing::warn!(key = ENV_PAGE_SIZE, value = %v, "ignoring invalid override"),
            }
        }
        if let Some(v) = lookup(ENV_BIND).filter(|v| !v.trim().is_empty()) {
            self.bind = v.trim().to_string();
        }
        if let Some(v) = lookup(ENV_SESSION_PATH).filter(|v| !v.trim().is_empty()) {
            self.session_path = PathBuf::from(v.trim());
        }
        if let Some(v) = lookup(ENV_SYNTHETIC_SCORES) {
            match parse_bool(&v) {
                Some(b) => self.synthesize_scores = b,
                None => {
                    tracing::warn!(key = ENV_SYNTHETIC_SCORES, value = %v, "ignoring invalid override")
                }
            }
        }
        self.sanitize();
    }

    fn sanitize(&mut self) {
        if self.page_size == 0 {
            self.page_size = 1;
        }
        while self.api_url.ends_with('/') {
            self.api_url.pop();
        }
    }

    pub fn fetch_options(&self, collection: Collection) -> FetchOptions {
        let filters = match collection {
            Collection::Careers => &self.career_filters,
            Collection::Universities => &self.university_filters,
        };
        FetchOptions {
            page_size: self.page_size,
            filters: filters
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            synthesize_scores: self.synthesize_scores,
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
