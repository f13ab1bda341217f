//! Document storage for ocwatch
//!
//! Three independent JSON documents hold all derived state:
//!
//! ```text
//! users    user id -> { name, activities[] }
//! crimes   crime id -> { name, status, ready_at, executed_at, slots, action_log[] }
//! naughty  detection time -> { crime_id, participants, slackers, delay_time }
//! ```
//!
//! Each document is read and written whole. Two backends exist: files in a
//! local directory, and a remote content store (see [`crate::github`]).
//! Both remember what they last read and skip writes that would not change
//! the document.
//!
//! There is no concurrency control across processes. A single writer per
//! store is assumed; see [`crate::lock`] for host-local exclusion.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::config::{Backend, Config, StorePaths};
use crate::error::{Error, Result};
use crate::github::GithubStore;
use crate::lock;

/// The three persisted stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    Users,
    Crimes,
    Naughty,
}

impl StoreKind {
    pub fn name(self) -> &'static str {
        match self {
            StoreKind::Users => "users",
            StoreKind::Crimes => "crimes",
            StoreKind::Naughty => "naughty",
        }
    }

    pub fn path_in(self, paths: &StorePaths) -> &str {
        match self {
            StoreKind::Users => &paths.users,
            StoreKind::Crimes => &paths.crimes,
            StoreKind::Naughty => &paths.naughty,
        }
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a save request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    Written,
    Unchanged,
}

/// Pretty JSON with a trailing newline, the on-disk form of every document.
pub fn render_document(value: &Value) -> Result<String> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    Ok(json)
}

/// Decode a stored document; an empty body is an empty document.
pub fn parse_document(raw: &str) -> Result<Value> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    Ok(serde_json::from_str(raw)?)
}

/// Store backed by files in one directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
    files: StorePaths,
    last_read: HashMap<StoreKind, Value>,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>, files: StorePaths) -> Self {
        Self {
            dir: dir.into(),
            files,
            last_read: HashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, kind: StoreKind) -> PathBuf {
        self.dir.join(kind.path_in(&self.files))
    }

    /// Load a document; a missing file is an empty document.
    pub fn load<T: DeserializeOwned + Default>(&mut self, kind: StoreKind) -> Result<T> {
        let path = self.path(kind);
        if !path.exists() {
            self.last_read.insert(kind, Value::Object(Default::default()));
            return Ok(T::default());
        }

        let raw = fs::read_to_string(&path)?;
        let value = parse_document(&raw)?;
        let doc = serde_json::from_value(value.clone())?;
        self.last_read.insert(kind, value);
        Ok(doc)
    }

    /// Replace a document atomically unless it equals what was last read.
    pub fn save<T: Serialize>(&mut self, kind: StoreKind, doc: &T) -> Result<SaveOutcome> {
        let value = serde_json::to_value(doc)?;
        if self.last_read.get(&kind) == Some(&value) {
            return Ok(SaveOutcome::Unchanged);
        }

        let path = self.path(kind);
        lock::write_atomic(&path, render_document(&value)?.as_bytes()).map_err(|err| {
            Error::StoreWrite {
                store: kind.name().to_string(),
                message: err.to_string(),
            }
        })?;
        self.last_read.insert(kind, value);
        Ok(SaveOutcome::Written)
    }

    /// Modification time of the document file, in unix seconds.
    pub fn last_modified(&self, kind: StoreKind) -> Result<Option<i64>> {
        let path = self.path(kind);
        if !path.exists() {
            return Ok(None);
        }
        let modified = fs::metadata(&path)?.modified()?;
        let modified: chrono::DateTime<chrono::Utc> = modified.into();
        Ok(Some(modified.timestamp()))
    }
}

/// One of the supported backends.
#[derive(Debug)]
pub enum DocumentStore {
    Local(LocalStore),
    Github(GithubStore),
}

impl DocumentStore {
    /// Build the configured backend.
    ///
    /// `force_local` overrides the configured backend; the github backend
    /// needs a token.
    pub fn from_config(
        config: &Config,
        github_token: Option<&str>,
        force_local: bool,
    ) -> Result<Self> {
        if force_local || config.store.backend == Backend::Local {
            let local = &config.store.local;
            return Ok(DocumentStore::Local(LocalStore::new(
                local.dir.clone(),
                local.files.clone(),
            )));
        }

        let token = github_token
            .filter(|token| !token.trim().is_empty())
            .ok_or(Error::MissingCredential("GITHUB_TOKEN"))?;
        Ok(DocumentStore::Github(GithubStore::new(
            &config.store.github,
            token,
        )?))
    }

    pub fn describe(&self) -> String {
        match self {
            DocumentStore::Local(store) => format!("local:{}", store.dir().display()),
            DocumentStore::Github(store) => format!("github:{}", store.describe()),
        }
    }

    pub async fn load<T: DeserializeOwned + Default>(&mut self, kind: StoreKind) -> Result<T> {
        match self {
            DocumentStore::Local(store) => store.load(kind),
            DocumentStore::Github(store) => store.load(kind).await,
        }
    }

    pub async fn save<T: Serialize>(&mut self, kind: StoreKind, doc: &T) -> Result<SaveOutcome> {
        match self {
            DocumentStore::Local(store) => store.save(kind, doc),
            DocumentStore::Github(store) => store.save(kind, doc).await,
        }
    }

    pub async fn last_modified(&self, kind: StoreKind) -> Result<Option<i64>> {
        match self {
            DocumentStore::Local(store) => store.last_modified(kind),
            DocumentStore::Github(store) => store.last_modified(kind).await,
        }
    }
}
