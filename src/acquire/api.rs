// src/acquire/api.rs
//! Lists a repository through the GitHub REST API and reads blobs from the raw-content host.

use super::http::{build_client, check_status};
use super::{Acquirer, Snapshot};
use crate::constants::{API_FETCH_BATCH_SIZE, PROGRESS_ACQUIRED};
use crate::core_types::RawEntry;
use crate::errors::{Error, Result};
use crate::progress::Progress;
use crate::reference::{Provider, RepoReference};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use url::Url;

/// Repository metadata, only used for the default branch.
#[derive(Deserialize, Debug)]
struct RepoInfo {
    default_branch: String,
}

/// Response of `GET /repos/{owner}/{repo}/git/trees/{ref}?recursive=1`.
#[derive(Deserialize, Debug)]
struct TreeListing {
    tree: Vec<TreeItem>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize, Debug)]
struct TreeItem {
    path: String,
    #[serde(rename = "type")]
    item_type: String,
    size: Option<u64>,
}

/// Fetches one recursive tree listing, then raw blobs on demand.
///
/// Only GitHub is served; other providers fail with
/// [`Error::UnsupportedProvider`]. Base URLs are configurable so that a local
/// mock can stand in for `api.github.com` and `raw.githubusercontent.com`.
#[derive(Debug, Clone)]
pub struct RemoteApiAcquirer {
    client: Client,
    api_base: String,
    raw_base: String,
}

impl RemoteApiAcquirer {
    pub fn new(api_base: impl Into<String>, raw_base: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client(Some("application/vnd.github+json"))?,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            raw_base: raw_base.into().trim_end_matches('/').to_string(),
        })
    }

    /// Fetches the default branch name for a repository.
    async fn fetch_default_branch(
        &self,
        owner: &str,
        repo: &str,
        token: Option<&str>,
    ) -> Result<String> {
        let api_url = format!("{}/repos/{}/{}", self.api_base, owner, repo);
        log::debug!("Fetching repo metadata from: {}", api_url);
        let response = with_bearer(self.client.get(&api_url), token).send().await?;
        let info: RepoInfo = check_status(response, "repository lookup")
            .await?
            .json()
            .await?;
        Ok(info.default_branch)
    }

    async fn fetch_tree(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        token: Option<&str>,
    ) -> Result<Vec<RawEntry>> {
        let api_url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.api_base, owner, repo, branch
        );
        log::debug!("Fetching tree listing from: {}", api_url);
        let response = with_bearer(self.client.get(&api_url), token).send().await?;
        let listing: TreeListing = check_status(response, "tree listing")
            .await?
            .json()
            .await?;
        if listing.truncated {
            log::warn!(
                "Tree listing for {}/{} was truncated by the API; some files will be missing",
                owner,
                repo
            );
        }

        let entries = listing
            .tree
            .into_iter()
            .filter_map(|item| match item.item_type.as_str() {
                "blob" => Some(RawEntry::file(item.path, item.size.unwrap_or(0))),
                "tree" => Some(RawEntry::dir(item.path)),
                // Submodules ("commit") have no content here.
                _ => None,
            })
            .collect();
        Ok(entries)
    }
}

fn with_bearer(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
        None => request,
    }
}

#[async_trait]
impl Acquirer for RemoteApiAcquirer {
    async fn acquire(
        &self,
        reference: &RepoReference,
        token: Option<&str>,
        progress: &Progress,
    ) -> Result<Box<dyn Snapshot>> {
        if reference.provider != Provider::GitHub {
            return Err(Error::UnsupportedProvider(format!(
                "the remote API strategy only supports GitHub, not {} ({})",
                reference.provider, reference.host
            )));
        }
        let token = token.map(str::to_string);
        let (owner, repo) = (reference.owner.as_str(), reference.repo.as_str());

        progress.report(5, "Resolving branch");
        let branch = match &reference.branch {
            Some(branch) => {
                log::debug!("Using branch from reference: {}", branch);
                branch.clone()
            }
            None => {
                log::debug!("Fetching default branch for {}/{}", owner, repo);
                self.fetch_default_branch(owner, repo, token.as_deref())
                    .await?
            }
        };
        log::info!("Processing {}/{} on branch: {}", owner, repo, branch);

        progress.report(20, "Fetching tree listing");
        let entries = self
            .fetch_tree(owner, repo, &branch, token.as_deref())
            .await?;
        progress.report(PROGRESS_ACQUIRED, format!("Listed {} entries", entries.len()));

        Ok(Box::new(ApiSnapshot {
            client: self.client.clone(),
            raw_base: self.raw_base.clone(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch,
            token,
            entries,
        }))
    }
}

struct ApiSnapshot {
    client: Client,
    raw_base: String,
    owner: String,
    repo: String,
    branch: String,
    token: Option<String>,
    entries: Vec<RawEntry>,
}

impl ApiSnapshot {
    /// `<raw>/<owner>/<repo>/<branch>/<path>`, each segment percent-encoded.
    fn raw_url(&self, path: &str) -> Result<Url> {
        let mut url = Url::parse(&self.raw_base)
            .map_err(|e| Error::Config(format!("Invalid raw URL '{}': {}", self.raw_base, e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("Raw URL '{}' cannot have a path", self.raw_base)))?
            .pop_if_empty()
            .push(&self.owner)
            .push(&self.repo)
            .extend(self.branch.split('/'))
            .extend(path.split('/'));
        Ok(url)
    }
}

#[async_trait]
impl Snapshot for ApiSnapshot {
    fn entries(&self) -> &[RawEntry] {
        &self.entries
    }

    fn resolved_branch(&self) -> Option<&str> {
        Some(&self.branch)
    }

    fn read_concurrency(&self) -> usize {
        API_FETCH_BATCH_SIZE
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.raw_url(path)?;
        log::debug!("Downloading file from: {}", url);
        let response = with_bearer(self.client.get(url), self.token.as_deref())
            .send()
            .await?;
        let bytes = check_status(response, "raw file download")
            .await?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}
