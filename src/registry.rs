use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use anyhow::anyhow;
use log::debug;
use log::info;

use crate::error::SkillKitError;
use crate::ops::git::GitOps;
use crate::ops::git::SubmoduleEntry;
use crate::ops::github::RepoName;

const ORIGIN: &str = "origin";
const ORIGIN_HEAD: &str = "refs/remotes/origin/HEAD";

/// Plugin name -> submodule, as tracked by the registry at its current commit.
#[derive(Debug, Clone, Default)]
pub struct RegistryIndex {
    entries: BTreeMap<String, SubmoduleEntry>,
}

impl RegistryIndex {
    pub fn new(entries: Vec<SubmoduleEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.name.clone(), entry))
                .collect(),
        }
    }

    /// Submodule path of the plugin `name`.
    pub fn resolve(&self, name: &str) -> Result<&str, SkillKitError> {
        self.entries
            .get(name)
            .map(|entry| entry.path.as_str())
            .ok_or_else(|| SkillKitError::NotRegistered {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// The entry whose URL points at the same hosted repository as `url`.
    pub fn find_by_source(&self, url: &str) -> Option<&SubmoduleEntry> {
        let wanted = RepoName::parse(url).ok()?;
        self.entries.values().find(|entry| {
            RepoName::parse(&entry.url).is_ok_and(|source| source.same_repo(&wanted))
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The local clone of the registry.
///
/// Owned exclusively for the duration of a run; concurrent runs against the
/// same clone are not supported.
pub struct RegistryRepo<G> {
    pub git: G,
    /// Working copy root.
    pub path: PathBuf,
    /// `owner/name` on GitHub.
    pub full_name: String,
    /// Local branch tracking the remote default branch.
    pub base_branch: String,
    pub index: RegistryIndex,
}

impl<G: GitOps> RegistryRepo<G> {
    /// Sync the clone with its remote and index the submodules it tracks.
    pub async fn open(git: G, path: PathBuf, full_name: String) -> Result<Self> {
        let mut repo = Self {
            git,
            path,
            full_name,
            base_branch: String::new(),
            index: RegistryIndex::default(),
        };
        repo.reload().await?;
        Ok(repo)
    }

    /// Hard-reset onto the latest remote default branch and rebuild the index.
    ///
    /// Leftovers of an interrupted run (staged changes, a checked out upgrade
    /// branch) are discarded. `origin/HEAD` is refreshed too, so a default
    /// branch renamed on the remote is picked up.
    pub async fn reload(&mut self) -> Result<()> {
        self.git.fetch(ORIGIN).await?;
        self.git.update_remote_head(ORIGIN).await?;
        let remote_head = self.git.symbolic_ref(ORIGIN_HEAD).await?;
        let base_branch = remote_head
            .strip_prefix("refs/remotes/origin/")
            .ok_or_else(|| anyhow!("Unexpected target of {}: {}", ORIGIN_HEAD, remote_head))?
            .to_string();

        self.git.reset_hard("HEAD").await?;
        self.git.checkout(&base_branch).await?;
        self.git.reset_hard(&remote_head).await?;
        debug!("Registry reset to {}", remote_head);

        self.index = RegistryIndex::new(self.git.submodule_entries().await?);
        self.base_branch = base_branch;
        info!(
            "Registry {} tracks {} skills",
            self.full_name,
            self.index.len()
        );
        Ok(())
    }
}
