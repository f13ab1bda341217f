//! Remote document store on the GitHub contents API
//!
//! Each store is one file in a repository branch. Reads fetch the file and
//! remember its blob sha and parsed content; writes are skipped when the new
//! document equals that content and otherwise commit the new body against
//! the remembered sha. The equality check is best effort: the branch may
//! move between read and write, and a rejected write is reported, not
//! retried.

use std::collections::HashMap;
use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{GithubStoreConfig, StorePaths};
use crate::error::{Error, Result};
use crate::storage::{parse_document, render_document, SaveOutcome, StoreKind};

#[derive(Debug, Clone)]
struct RemoteSnapshot {
    sha: Option<String>,
    content: Value,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: Option<String>,
}

/// Blob body, used when the file is too large for the contents endpoint
/// to inline (it then reports `encoding: "none"`).
#[derive(Debug, Deserialize)]
struct BlobResponse {
    content: String,
}

#[derive(Debug, Serialize)]
struct PutContentsRequest<'a> {
    message: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    branch: &'a str,
}

#[derive(Debug, Deserialize)]
struct PutContentsResponse {
    content: Option<PutContent>,
}

#[derive(Debug, Deserialize)]
struct PutContent {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitListItem {
    commit: CommitInfo,
}

#[derive(Debug, Deserialize)]
struct CommitInfo {
    committer: Option<CommitSignature>,
}

#[derive(Debug, Deserialize)]
struct CommitSignature {
    date: Option<DateTime<Utc>>,
}

pub struct GithubStore {
    http: reqwest::Client,
    api_url: String,
    owner: String,
    repo: String,
    branch: String,
    paths: StorePaths,
    last_read: HashMap<StoreKind, RemoteSnapshot>,
}

impl fmt::Debug for GithubStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubStore")
            .field("api_url", &self.api_url)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

impl GithubStore {
    pub fn new(config: &GithubStoreConfig, token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("token {token}"))
            .map_err(|_| Error::InvalidArgument("GITHUB_TOKEN is not a valid header".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github.v3+json"));

        let http = reqwest::Client::builder()
            .user_agent(concat!("ocwatch/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            branch: config.branch.clone(),
            paths: config.paths.clone(),
            last_read: HashMap::new(),
        })
    }

    pub fn describe(&self) -> String {
        format!("{}/{}@{}", self.owner, self.repo, self.branch)
    }

    fn path(&self, kind: StoreKind) -> &str {
        kind.path_in(&self.paths)
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{path}",
            self.api_url, self.owner, self.repo
        )
    }

    async fn fetch(&self, kind: StoreKind) -> Result<RemoteSnapshot> {
        let path = self.path(kind);
        let response = self
            .http
            .get(self.contents_url(path))
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(store = %kind, path, "remote document missing, starting empty");
            return Ok(RemoteSnapshot {
                sha: None,
                content: Value::Object(Default::default()),
            });
        }

        let body: ContentsResponse = response.error_for_status()?.json().await?;
        let raw = if body.encoding.as_deref() == Some("none") {
            self.fetch_blob(&body.sha).await?
        } else {
            body.content
        };
        let encoded: String = raw
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .collect();
        let decoded = BASE64.decode(encoded)?;
        let content = parse_document(&String::from_utf8_lossy(&decoded))?;
        Ok(RemoteSnapshot {
            sha: Some(body.sha),
            content,
        })
    }

    async fn fetch_blob(&self, sha: &str) -> Result<String> {
        let url = format!(
            "{}/repos/{}/{}/git/blobs/{sha}",
            self.api_url, self.owner, self.repo
        );
        let blob: BlobResponse = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(blob.content)
    }

    pub async fn load<T: DeserializeOwned + Default>(&mut self, kind: StoreKind) -> Result<T> {
        let snapshot = self.fetch(kind).await?;
        let doc = serde_json::from_value(snapshot.content.clone())?;
        self.last_read.insert(kind, snapshot);
        Ok(doc)
    }

    pub async fn save<T: Serialize>(&mut self, kind: StoreKind, doc: &T) -> Result<SaveOutcome> {
        let value = serde_json::to_value(doc)?;
        let snapshot = match self.last_read.get(&kind) {
            Some(snapshot) => snapshot.clone(),
            None => self.fetch(kind).await?,
        };

        let path = self.path(kind).to_string();
        if snapshot.content == value {
            info!(store = %kind, path = %path, "no changes detected, skipping upload");
            return Ok(SaveOutcome::Unchanged);
        }

        let body = PutContentsRequest {
            message: format!(
                "Update {path} at {}",
                Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
            ),
            content: BASE64.encode(render_document(&value)?),
            sha: snapshot.sha.as_deref(),
            branch: &self.branch,
        };

        let response = self
            .http
            .put(self.contents_url(&path))
            .json(&body)
            .send()
            .await
            .map_err(|err| store_write_error(kind, err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(store_write_error(kind, format!("HTTP {status}: {detail}")));
        }

        let result: PutContentsResponse = response.json().await?;
        info!(store = %kind, path = %path, "uploaded document");
        self.last_read.insert(
            kind,
            RemoteSnapshot {
                sha: result.content.map(|content| content.sha),
                content: value,
            },
        );
        Ok(SaveOutcome::Written)
    }

    /// Commit time of the latest commit touching the store's file.
    ///
    /// Lookup failures yield `None`, which callers treat as "stale".
    pub async fn last_modified(&self, kind: StoreKind) -> Result<Option<i64>> {
        let path = self.path(kind);
        let url = format!("{}/repos/{}/{}/commits", self.api_url, self.owner, self.repo);
        let response = self
            .http
            .get(url)
            .query(&[("path", path), ("sha", self.branch.as_str()), ("per_page", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(
                store = %kind,
                status = %response.status(),
                "could not fetch last commit time, assuming update is needed"
            );
            return Ok(None);
        }

        let commits: Vec<CommitListItem> = response.json().await?;
        Ok(commits
            .first()
            .and_then(|item| item.commit.committer.as_ref())
            .and_then(|committer| committer.date)
            .map(|date| date.timestamp()))
    }
}

fn store_write_error(kind: StoreKind, message: String) -> Error {
    Error::StoreWrite {
        store: kind.name().to_string(),
        message,
    }
}
