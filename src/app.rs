use anyhow::Result;
use log::debug;
use log::info;
use log::warn;

use crate::config::Config;
use crate::error::SkillKitError;
use crate::ops::git::GitOps;
use crate::ops::github::GithubOps;
use crate::ops::github::PullRequest;
use crate::pull_request::PullRequestDraft;
use crate::registry::RegistryRepo;

/// Remote in the registry clone that points at the user's fork.
pub const FORK_REMOTE: &str = "fork";

pub struct App<G, H> {
    pub config: Config,
    pub registry: RegistryRepo<G>,
    pub gh: H,
}

impl<G, H> App<G, H> {
    pub fn new(config: Config, registry: RegistryRepo<G>, gh: H) -> Self {
        Self {
            config,
            registry,
            gh,
        }
    }
}

/// Where contribution branches get pushed and PRs opened.
#[derive(Debug, Clone)]
pub struct ForkTarget {
    /// Registry branch PRs target, the same one contribution branches are cut
    /// from.
    pub base: String,
    /// Login owning the fork.
    pub owner: String,
}

impl ForkTarget {
    /// `owner:branch`, as GitHub expects PR heads from forks.
    pub fn head(&self, branch: &str) -> String {
        format!("{}:{}", self.owner, branch)
    }
}

/// What reconciling a PR draft did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    Created(PullRequest),
    Updated(PullRequest),
}

impl Reconciled {
    pub fn pull(&self) -> &PullRequest {
        match self {
            Self::Created(pull) | Self::Updated(pull) => pull,
        }
    }
}

/// Shared helper methods for App
impl<G: GitOps, H: GithubOps> App<G, H> {
    /// Check out `branch` in the registry, recreated from the current HEAD.
    ///
    /// A branch that can't be deleted (e.g. it doesn't exist) is left alone; if
    /// it then can't be created either, the existing one is checked out.
    pub(crate) async fn checkout_fresh_branch(&self, branch: &str) -> Result<()> {
        let git = &self.registry.git;
        if let Err(err) = git.delete_branch(branch).await {
            debug!("Did not delete branch {}: {}", branch, err);
        }
        if let Err(err) = git.create_branch(branch).await {
            debug!("Could not create branch {}: {}", branch, err);
            git.checkout(branch).await?;
        }
        Ok(())
    }

    /// Make sure the user has a fork of the registry and that the `fork`
    /// remote points at it.
    pub(crate) async fn setup_fork(&self) -> Result<ForkTarget> {
        let full_name = &self.registry.full_name;
        let upstream = self.gh.get_repo(full_name).await?;
        let base = self.registry.base_branch.clone();
        if upstream.default_branch != base {
            warn!(
                "{} defaults to {} on GitHub but the clone tracks {}, targeting {}",
                full_name, upstream.default_branch, base, base
            );
        }
        let user = self.gh.authenticated_user().await?;
        let fork = self.gh.create_fork(full_name).await?;
        info!("Using fork {}", fork.full_name);

        let git = &self.registry.git;
        if git.remotes().await?.iter().any(|r| r == FORK_REMOTE) {
            git.remote_set_url(FORK_REMOTE, &fork.clone_url).await?;
        } else {
            git.remote_add(FORK_REMOTE, &fork.clone_url).await?;
        }

        Ok(ForkTarget {
            base,
            owner: user.login,
        })
    }

    /// Force push `branch` to the fork. The branch is recreated on every run,
    /// so its history is not expected to be a continuation of the remote one.
    pub(crate) async fn push_to_fork(&self, branch: &str) -> Result<()> {
        self.registry.git.force_push(FORK_REMOTE, branch).await?;
        info!("Pushed {} to {}", branch, FORK_REMOTE);
        Ok(())
    }

    /// Open a PR for `draft`, or update the open one with the same base and
    /// head.
    ///
    /// An existing PR whose description no longer carries the provenance
    /// marker is left untouched and [`SkillKitError::PrModified`] is returned.
    /// If several PRs match, the most recently updated one is considered.
    pub(crate) async fn create_or_edit_pr(&self, draft: &PullRequestDraft) -> Result<Reconciled> {
        let full_name = &self.registry.full_name;
        let mut pulls = self
            .gh
            .list_pulls(full_name, &draft.base, &draft.head)
            .await?;

        if pulls.len() > 1 {
            warn!(
                "Found {} open PRs from {} into {}, updating the most recent one",
                pulls.len(),
                draft.head,
                draft.base
            );
        }
        pulls.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let Some(pull) = pulls.into_iter().next() else {
            let pull = self.gh.create_pull(full_name, draft).await?;
            return Ok(Reconciled::Created(pull));
        };

        if !pull.is_autogenerated() {
            return Err(SkillKitError::PrModified { url: pull.html_url }.into());
        }

        let pull = self
            .gh
            .edit_pull(full_name, pull.number, &draft.title, &draft.body)
            .await?;
        Ok(Reconciled::Updated(pull))
    }
}
