//! Source host access: recursive tree listing and blob content retrieval.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use base64::Engine as _;
use serde::Deserialize;

use crate::error::{IndexError, Result};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const GITHUB_API: &str = "https://api.github.com";
const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";
const MAX_LOGGED_BODY: usize = 512;

/// Repository coordinates for one ingestion pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl RepoRef {
    /// # Errors
    ///
    /// Returns [`IndexError::Validation`] if any coordinate is blank.
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
    ) -> Result<Self> {
        let r = Self {
            owner: owner.into().trim().to_owned(),
            repo: repo.into().trim().to_owned(),
            branch: branch.into().trim().to_owned(),
        };
        for (field, value) in [("owner", &r.owner), ("repo", &r.repo), ("branch", &r.branch)] {
            if value.is_empty() {
                return Err(IndexError::Validation(format!("{field} must not be empty")));
            }
        }
        Ok(r)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.branch)
    }
}

/// A blob entry from a tree listing together with its content URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobDescriptor {
    pub path: String,
    pub url: String,
}

/// Read-only access to a hosted repository.
pub trait SourceHost: Send + Sync {
    /// List every blob of `repo` recursively.
    ///
    /// # Errors
    ///
    /// [`IndexError::Authentication`] when `token` is absent or rejected,
    /// [`IndexError::ExternalService`] on any other non-2xx reply.
    fn list_files<'a>(
        &'a self,
        repo: &'a RepoRef,
        token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Vec<BlobDescriptor>>>;

    /// Fetch and decode one blob's text.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, non-2xx replies, and undecodable envelopes.
    /// A URL outside the host the client is configured for is a validation
    /// error and is never requested.
    fn fetch_content<'a>(
        &'a self,
        blob: &'a BlobDescriptor,
        token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<String>>;
}

/// GitHub REST client for the git trees and blobs endpoints.
#[derive(Debug, Clone)]
pub struct GithubClient {
    client: reqwest::Client,
    api_base: String,
}

impl Default for GithubClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GithubClient {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: repogpt_llm::http::default_client(),
            api_base: GITHUB_API.to_owned(),
        }
    }

    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_owned();
        self
    }

    fn tree_url(&self, repo: &RepoRef) -> String {
        format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.api_base, repo.owner, repo.repo, repo.branch
        )
    }

    /// Blob URLs must live under `api_base`; the bearer token is never sent elsewhere.
    fn check_blob_url(&self, blob_url: &str) -> Result<()> {
        let base = url::Url::parse(&self.api_base).map_err(|e| {
            IndexError::Configuration(format!("invalid source api base {:?}: {e}", self.api_base))
        })?;
        let target = url::Url::parse(blob_url)
            .map_err(|e| IndexError::Validation(format!("invalid url: {e}")))?;

        let prefix = base.path().trim_end_matches('/');
        let under_base = target.path() == prefix
            || target
                .path()
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'));
        if target.origin() != base.origin() || !under_base {
            tracing::warn!(url = %blob_url, "refusing blob url outside the source host");
            return Err(IndexError::Validation(format!(
                "url must point at {}",
                self.api_base
            )));
        }
        Ok(())
    }

    async fn get(&self, url: &str, token: Option<&str>) -> Result<reqwest::Response> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| IndexError::Authentication("source host token is missing".into()))?;

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let mut body = response.text().await.unwrap_or_default();
        let mut end = body.len().min(MAX_LOGGED_BODY);
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
        tracing::error!(status = status.as_u16(), %url, "source host error: {body}");

        if matches!(status.as_u16(), 401 | 403) {
            return Err(IndexError::Authentication(format!(
                "source host rejected credential ({status})"
            )));
        }
        Err(IndexError::source_host(
            Some(status.as_u16()),
            format!("unexpected status {status}"),
        ))
    }
}

impl SourceHost for GithubClient {
    fn list_files<'a>(
        &'a self,
        repo: &'a RepoRef,
        token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Vec<BlobDescriptor>>> {
        Box::pin(async move {
            let response = self.get(&self.tree_url(repo), token).await?;
            let tree: TreeResponse = response
                .json()
                .await
                .map_err(|e| IndexError::source_host(None, format!("malformed tree: {e}")))?;

            if tree.truncated {
                tracing::warn!(%repo, "tree listing truncated by source host");
            }

            Ok(tree
                .tree
                .into_iter()
                .filter(|e| e.kind == "blob")
                .filter_map(|e| Some(BlobDescriptor { path: e.path, url: e.url? }))
                .collect())
        })
    }

    fn fetch_content<'a>(
        &'a self,
        blob: &'a BlobDescriptor,
        token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            self.check_blob_url(&blob.url)?;
            let response = self.get(&blob.url, token).await?;
            let envelope: BlobEnvelope = response
                .json()
                .await
                .map_err(|e| IndexError::source_host(None, format!("malformed blob: {e}")))?;
            decode_blob(&envelope)
        })
    }
}

#[derive(Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct BlobEnvelope {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

fn decode_blob(envelope: &BlobEnvelope) -> Result<String> {
    if envelope.encoding != "base64" {
        return Err(IndexError::source_host(
            None,
            format!("unsupported blob encoding {:?}", envelope.encoding),
        ));
    }

    let compact: String = envelope
        .content
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| IndexError::source_host(None, format!("invalid base64 content: {e}")))?;

    String::from_utf8(bytes)
        .map_err(|_| IndexError::source_host(None, "blob content is not valid UTF-8"))
}
