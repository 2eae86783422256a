// src/session.rs
//! Client-local session: a generated user id and the "AI profile created"
//! flag, persisted as a small JSON document.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

pub const USER_ID_LEN: usize = 21;
/// URL-safe alphabet (64 symbols).
const ALPHABET: &[u8; 64] = b"useandom-26T198340PX75pxJACKVERYMINDBUSHWOLF_GQZbfghjklqvwyzrict";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct SessionDoc {
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    #[serde(rename = "perfilIA_creado", default)]
    profile_created: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    doc: Mutex<SessionDoc>,
}

impl SessionStore {
    /// Open the store at `path`. A missing file starts an empty session;
    /// an unreadable one is logged and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let doc = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("reading session from {}", path.display()))?;
            match serde_json::from_str::<SessionDoc>(&raw) {
                Ok(d) => d,
                Err(e) => {
                    warn!(target: "session", error = %e, path = %path.display(), "corrupt session file; starting fresh");
                    SessionDoc::default()
                }
            }
        } else {
            SessionDoc::default()
        };
        Ok(Self {
            path,
            doc: Mutex::new(doc),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored user id, generated and persisted on first use.
    pub fn user_id(&self) -> Result<String> {
        let mut doc = self.doc.lock().expect("session mutex poisoned");
        if let Some(id) = &doc.user_id {
            return Ok(id.clone());
        }
        let id = generate_user_id();
        doc.user_id = Some(id.clone());
        doc.created_at = Some(Utc::now());
        write_doc(&self.path, &doc)?;
        info!(target: "session", user = %anon_id(&id), "new session id");
        Ok(id)
    }

    /// Forget the user id; the next `user_id()` call creates a new one.
    pub fn reset(&self) -> Result<()> {
        let mut doc = self.doc.lock().expect("session mutex poisoned");
        doc.user_id = None;
        doc.created_at = None;
        write_doc(&self.path, &doc)
    }

    pub fn profile_created(&self) -> bool {
        self.doc.lock().expect("session mutex poisoned").profile_created
    }

    pub fn set_profile_created(&self, created: bool) -> Result<()> {
        let mut doc = self.doc.lock().expect("session mutex poisoned");
        doc.profile_created = created;
        write_doc(&self.path, &doc)
    }
}

fn write_doc(path: &Path, doc: &SessionDoc) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(doc).context("encoding session")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

/// 21 random symbols from a URL-safe alphabet.
pub fn generate_user_id() -> String {
    let mut rng = rand::rng();
    (0..USER_ID_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Short hash for logs; raw ids are never logged.
pub fn anon_id(id: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(id.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
