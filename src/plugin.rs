use std::path::Path;
use std::path::PathBuf;

use anyhow::Result;
use anyhow::anyhow;
use log::debug;

use crate::ops::git::CommitId;
use crate::ops::git::GitOps;
use crate::ops::github::RepoName;
use crate::registry::RegistryIndex;

/// A locally developed skill. Never modified once discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginEntry {
    pub name: String,
    /// Canonical source URL.
    pub url: String,
    pub author: String,
    pub path: PathBuf,
    /// Commit the registry currently records for this skill.
    pub sha: Option<CommitId>,
    pub is_local: bool,
}

impl PluginEntry {
    /// Identify the skill checked out at `folder`.
    ///
    /// The registry entry pointing at the same `owner/name` as the folder's
    /// `origin` names the skill; a skill not in the registry is named after
    /// its folder.
    pub async fn discover(
        git: &impl GitOps,
        folder: &Path,
        index: &RegistryIndex,
    ) -> Result<Self> {
        let url = git.remote_url("origin").await?;
        let source = RepoName::parse(&url)?;

        let entry = index.find_by_source(&url);
        let name = match entry {
            Some(entry) => entry.name.clone(),
            None => {
                let name = folder
                    .file_name()
                    .and_then(|name| name.to_str())
                    .ok_or_else(|| anyhow!("Invalid skill folder: {}", folder.display()))?
                    .to_string();
                debug!("No registry entry for {}, using folder name {}", url, name);
                name
            }
        };

        Ok(Self {
            name,
            url,
            author: source.owner,
            path: folder.to_path_buf(),
            sha: entry.and_then(|entry| entry.sha.clone()),
            is_local: true,
        })
    }

    /// `owner/name` of the hosted repository the skill is developed in.
    pub fn repo_full_name(&self) -> String {
        match RepoName::parse(&self.url) {
            Ok(source) => format!("{}/{}", self.author, source.name),
            Err(_) => format!("{}/{}", self.author, self.name),
        }
    }
}
