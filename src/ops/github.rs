#![allow(async_fn_in_trait)]

use std::sync::LazyLock;

use anyhow::Result;
use anyhow::anyhow;
#[cfg(test)]
use mockall::automock;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use tracing::instrument;

use super::git::CommitId;
use super::github_curl::GithubCurlClient;
use crate::pull_request::PROVENANCE_MARKER;
use crate::pull_request::PullRequestDraft;

const API_ROOT: &str = "https://api.github.com";

// -----------------------------------------------------------------------------
// GithubOps trait

/// Operations against the GitHub API
#[cfg_attr(test, automock)]
pub trait GithubOps {
    async fn get_repo(&self, full_name: &str) -> Result<Repo>;
    async fn authenticated_user(&self) -> Result<User>;

    /// Fork `full_name` under the authenticated user. Returns the existing
    /// fork if there already is one.
    async fn create_fork(&self, full_name: &str) -> Result<Repo>;

    /// Open PRs on `full_name` matching `base` and `head` (`owner:branch`).
    async fn list_pulls(
        &self,
        full_name: &str,
        base: &str,
        head: &str,
    ) -> Result<Vec<PullRequest>>;

    async fn create_pull(&self, full_name: &str, draft: &PullRequestDraft) -> Result<PullRequest>;
    async fn edit_pull(
        &self,
        full_name: &str,
        number: u64,
        title: &str,
        body: &str,
    ) -> Result<PullRequest>;

    async fn commit_html_url(&self, full_name: &str, sha: &CommitId) -> Result<String>;
}

// -----------------------------------------------------------------------------
// Types

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Repo {
    pub full_name: String,
    pub html_url: String,
    pub clone_url: String,
    pub default_branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub updated_at: String,
}

impl PullRequest {
    /// Whether the description still carries the provenance marker, i.e. no
    /// one rewrote it by hand.
    pub fn is_autogenerated(&self) -> bool {
        self.body
            .as_deref()
            .is_some_and(|body| body.contains(PROVENANCE_MARKER))
    }
}

/// `owner/name` of a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoName {
    pub owner: String,
    pub name: String,
}

static REPO_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^/:]+)[/:]([^/:]+?)(?:\.git)?/*$").unwrap());

impl RepoName {
    /// Parse the trailing `owner/name` of a remote URL. Accepts
    /// `https://host/owner/name(.git)`, `git@host:owner/name(.git)` and plain
    /// paths.
    pub fn parse(url: &str) -> Result<Self> {
        let captures = REPO_URL_RE
            .captures(url.trim())
            .ok_or_else(|| anyhow!("Could not parse owner/name from URL: {}", url))?;
        Ok(Self {
            owner: captures[1].to_string(),
            name: captures[2].to_string(),
        })
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Case-insensitive comparison, as GitHub treats names.
    pub fn same_repo(&self, other: &RepoName) -> bool {
        self.owner.eq_ignore_ascii_case(&other.owner) && self.name.eq_ignore_ascii_case(&other.name)
    }
}

#[derive(Debug, Deserialize)]
struct Commit {
    html_url: String,
}

#[derive(Debug, Serialize)]
struct CreatePullRequest<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdatePullRequest<'a> {
    title: &'a str,
    body: &'a str,
}

// -----------------------------------------------------------------------------
// RealGithub

/// Real implementation that talks to the GitHub REST API
pub struct RealGithub {
    http_client: GithubCurlClient,
}

impl RealGithub {
    pub fn new(token: String) -> Self {
        Self {
            http_client: GithubCurlClient::new(token),
        }
    }
}

impl GithubOps for RealGithub {
    #[instrument(skip_all)]
    async fn get_repo(&self, full_name: &str) -> Result<Repo> {
        let url = format!("{}/repos/{}", API_ROOT, full_name);
        let response = self.http_client.get(&url).await?;
        Ok(serde_json::from_str(&response)?)
    }

    #[instrument(skip_all)]
    async fn authenticated_user(&self) -> Result<User> {
        let url = format!("{}/user", API_ROOT);
        let response = self.http_client.get(&url).await?;
        Ok(serde_json::from_str(&response)?)
    }

    #[instrument(skip_all)]
    async fn create_fork(&self, full_name: &str) -> Result<Repo> {
        let url = format!("{}/repos/{}/forks", API_ROOT, full_name);
        let response = self.http_client.post(&url, "{}").await?;
        Ok(serde_json::from_str(&response)?)
    }

    #[instrument(skip_all)]
    async fn list_pulls(
        &self,
        full_name: &str,
        base: &str,
        head: &str,
    ) -> Result<Vec<PullRequest>> {
        let url = format!(
            "{}/repos/{}/pulls?state=open&base={}&head={}",
            API_ROOT, full_name, base, head
        );
        let response = self.http_client.get(&url).await?;
        Ok(serde_json::from_str(&response)?)
    }

    #[instrument(skip_all)]
    async fn create_pull(&self, full_name: &str, draft: &PullRequestDraft) -> Result<PullRequest> {
        let url = format!("{}/repos/{}/pulls", API_ROOT, full_name);
        let request_body = CreatePullRequest {
            title: &draft.title,
            body: &draft.body,
            head: &draft.head,
            base: &draft.base,
        };

        let json_data = serde_json::to_string(&request_body)?;
        let response = self.http_client.post(&url, &json_data).await?;
        Ok(serde_json::from_str(&response)?)
    }

    #[instrument(skip_all)]
    async fn edit_pull(
        &self,
        full_name: &str,
        number: u64,
        title: &str,
        body: &str,
    ) -> Result<PullRequest> {
        let url = format!("{}/repos/{}/pulls/{}", API_ROOT, full_name, number);
        let request_body = UpdatePullRequest { title, body };

        let json_data = serde_json::to_string(&request_body)?;
        let response = self.http_client.patch(&url, &json_data).await?;
        Ok(serde_json::from_str(&response)?)
    }

    #[instrument(skip_all)]
    async fn commit_html_url(&self, full_name: &str, sha: &CommitId) -> Result<String> {
        let url = format!("{}/repos/{}/commits/{}", API_ROOT, full_name, sha);
        let response = self.http_client.get(&url).await?;
        let commit: Commit = serde_json::from_str(&response)?;
        Ok(commit.html_url)
    }
}
