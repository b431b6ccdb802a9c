#![allow(async_fn_in_trait)]

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt::Display;
use std::path::PathBuf;
use std::process::Output;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use log::debug;
#[cfg(test)]
use mockall::automock;
use tokio::process::Command;

// -----------------------------------------------------------------------------
// GitOps trait

/// Operations on a single local git working copy.
///
/// The registry clone and each plugin submodule get their own instance.
#[cfg_attr(test, automock)]
pub trait GitOps {
    /// Fetch `remote` explicitly. A bare `git fetch` would follow the current
    /// branch's upstream, which is the fork after a push.
    async fn fetch(&self, remote: &str) -> Result<()>;
    async fn reset_hard(&self, rev: &str) -> Result<()>;

    /// Resolve a symbolic ref, e.g. `refs/remotes/origin/HEAD` to
    /// `refs/remotes/origin/main`.
    async fn symbolic_ref(&self, name: &str) -> Result<String>;

    /// Whether `path` differs between the index and the working tree.
    /// Dirty submodule worktrees don't count, only a moved submodule HEAD.
    async fn has_diff(&self, path: &str) -> Result<bool>;

    async fn ls_files(&self, path: &str) -> Result<Vec<String>>;
    async fn add(&self, path: &str) -> Result<()>;
    async fn commit(&self, message: &str) -> Result<()>;
    async fn head(&self) -> Result<CommitId>;

    async fn delete_branch(&self, branch: &str) -> Result<()>;

    /// Create `branch` at HEAD and check it out.
    async fn create_branch(&self, branch: &str) -> Result<()>;
    async fn checkout(&self, rev: &str) -> Result<()>;

    async fn remotes(&self) -> Result<Vec<String>>;
    async fn remote_url(&self, remote: &str) -> Result<String>;
    async fn remote_add(&self, remote: &str, url: &str) -> Result<()>;
    async fn remote_set_url(&self, remote: &str, url: &str) -> Result<()>;

    /// Point `refs/remotes/<remote>/HEAD` at the remote's current default
    /// branch.
    async fn update_remote_head(&self, remote: &str) -> Result<()>;

    /// Force push `branch` to `remote` and track it upstream.
    async fn force_push(&self, remote: &str, branch: &str) -> Result<()>;

    /// Commits on the ancestry path `from..to`, newest first.
    async fn rev_list_ancestry(&self, from: &CommitId, to: &str) -> Result<Vec<CommitId>>;
    async fn commit_subject(&self, commit_id: &CommitId) -> Result<String>;

    async fn submodule_add(&self, url: &str, path: &str) -> Result<()>;
    async fn submodule_update_init(&self, path: &str) -> Result<()>;

    /// Every submodule declared in `.gitmodules`, with the commit recorded in
    /// the index for its path.
    async fn submodule_entries(&self) -> Result<Vec<SubmoduleEntry>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitId(pub String);

impl Display for CommitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A submodule tracked by a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleEntry {
    pub name: String,
    pub path: String,
    pub url: String,
    /// The gitlink recorded in the index; `None` if `.gitmodules` declares the
    /// submodule but nothing was ever staged at its path.
    pub sha: Option<CommitId>,
}

// -----------------------------------------------------------------------------
// RealGit

/// Real implementation that calls the git CLI inside `path`.
pub struct RealGit {
    path: PathBuf,
}

impl RealGit {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn output(&self, args: &[&str]) -> Result<Output> {
        debug!("git {} (in {})", args.join(" "), self.path.display());
        Command::new("git")
            .current_dir(&self.path)
            .args(args)
            .output()
            .await
            .context("Failed to execute git command")
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args).await?;

        if !output.status.success() {
            bail!(
                "git command failed: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }

        Ok(String::from_utf8(output.stdout)?.trim().to_string())
    }
}

impl GitOps for RealGit {
    async fn fetch(&self, remote: &str) -> Result<()> {
        self.run(&["fetch", remote]).await?;
        Ok(())
    }

    async fn reset_hard(&self, rev: &str) -> Result<()> {
        self.run(&["reset", "--hard", rev]).await?;
        Ok(())
    }

    async fn symbolic_ref(&self, name: &str) -> Result<String> {
        self.run(&["symbolic-ref", name]).await
    }

    async fn has_diff(&self, path: &str) -> Result<bool> {
        let output = self
            .output(&["diff", "--quiet", "--ignore-submodules=dirty", "--", path])
            .await?;

        // --quiet exits with 1 when there are differences
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => bail!(
                "git command failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ),
        }
    }

    async fn ls_files(&self, path: &str) -> Result<Vec<String>> {
        let out = self.run(&["ls-files", "--", path]).await?;
        Ok(non_empty_lines(&out))
    }

    async fn add(&self, path: &str) -> Result<()> {
        self.run(&["add", "--", path]).await?;
        Ok(())
    }

    async fn commit(&self, message: &str) -> Result<()> {
        self.run(&["commit", "-m", message]).await?;
        Ok(())
    }

    async fn head(&self) -> Result<CommitId> {
        Ok(CommitId(self.run(&["rev-parse", "HEAD"]).await?))
    }

    async fn delete_branch(&self, branch: &str) -> Result<()> {
        self.run(&["branch", "-D", branch]).await?;
        Ok(())
    }

    async fn create_branch(&self, branch: &str) -> Result<()> {
        self.run(&["checkout", "-b", branch]).await?;
        Ok(())
    }

    async fn checkout(&self, rev: &str) -> Result<()> {
        self.run(&["checkout", rev]).await?;
        Ok(())
    }

    async fn remotes(&self) -> Result<Vec<String>> {
        let out = self.run(&["remote"]).await?;
        Ok(non_empty_lines(&out))
    }

    async fn remote_url(&self, remote: &str) -> Result<String> {
        self.run(&["remote", "get-url", remote]).await
    }

    async fn remote_add(&self, remote: &str, url: &str) -> Result<()> {
        self.run(&["remote", "add", remote, url]).await?;
        Ok(())
    }

    async fn remote_set_url(&self, remote: &str, url: &str) -> Result<()> {
        self.run(&["remote", "set-url", remote, url]).await?;
        Ok(())
    }

    async fn update_remote_head(&self, remote: &str) -> Result<()> {
        self.run(&["remote", "set-head", remote, "--auto"]).await?;
        Ok(())
    }

    async fn force_push(&self, remote: &str, branch: &str) -> Result<()> {
        self.run(&["push", "-u", remote, branch, "--force"]).await?;
        Ok(())
    }

    async fn rev_list_ancestry(&self, from: &CommitId, to: &str) -> Result<Vec<CommitId>> {
        let range = format!("{}..{}", from, to);
        let out = self.run(&["rev-list", "--ancestry-path", &range]).await?;
        Ok(non_empty_lines(&out).into_iter().map(CommitId).collect())
    }

    async fn commit_subject(&self, commit_id: &CommitId) -> Result<String> {
        self.run(&["show", "-s", "--format=%s", &commit_id.0]).await
    }

    async fn submodule_add(&self, url: &str, path: &str) -> Result<()> {
        self.run(&["submodule", "add", url, path]).await?;
        Ok(())
    }

    async fn submodule_update_init(&self, path: &str) -> Result<()> {
        self.run(&["submodule", "update", "--init", "--", path])
            .await?;
        Ok(())
    }

    async fn submodule_entries(&self) -> Result<Vec<SubmoduleEntry>> {
        let output = self
            .output(&[
                "config",
                "--file",
                ".gitmodules",
                "--get-regexp",
                r"^submodule\..*\.(path|url)$",
            ])
            .await?;

        // Exit code 1 means no matching keys (or no .gitmodules at all)
        let config = match output.status.code() {
            Some(0) => String::from_utf8(output.stdout)?,
            Some(1) => String::new(),
            _ => bail!(
                "git command failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ),
        };

        let staged = self.run(&["ls-files", "--stage"]).await?;
        Ok(merge_submodule_entries(
            parse_gitmodules(&config),
            parse_gitlinks(&staged),
        ))
    }
}

// -----------------------------------------------------------------------------
// Output parsing

fn non_empty_lines(out: &str) -> Vec<String> {
    out.lines()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse `git config --get-regexp` output over `.gitmodules` into
/// name -> (path, url).
///
/// Submodule names may themselves contain dots, so the key is split on its
/// last dot only.
fn parse_gitmodules(config: &str) -> BTreeMap<String, (Option<String>, Option<String>)> {
    let mut modules: BTreeMap<String, (Option<String>, Option<String>)> = BTreeMap::new();
    for line in config.lines() {
        let Some((key, value)) = line.trim().split_once(' ') else {
            continue;
        };
        let Some(key) = key.strip_prefix("submodule.") else {
            continue;
        };
        let Some((name, field)) = key.rsplit_once('.') else {
            continue;
        };
        let module = modules.entry(name.to_string()).or_default();
        match field {
            "path" => module.0 = Some(value.trim().to_string()),
            "url" => module.1 = Some(value.trim().to_string()),
            _ => {}
        }
    }
    modules
}

/// Parse `git ls-files --stage` output into path -> gitlink commit.
fn parse_gitlinks(staged: &str) -> HashMap<String, CommitId> {
    staged
        .lines()
        .filter_map(|line| {
            let (meta, path) = line.split_once('\t')?;
            let mut fields = meta.split_whitespace();
            let mode = fields.next()?;
            let sha = fields.next()?;
            (mode == "160000").then(|| (path.to_string(), CommitId(sha.to_string())))
        })
        .collect()
}

fn merge_submodule_entries(
    modules: BTreeMap<String, (Option<String>, Option<String>)>,
    gitlinks: HashMap<String, CommitId>,
) -> Vec<SubmoduleEntry> {
    modules
        .into_iter()
        .filter_map(|(name, (path, url))| {
            let Some(path) = path else {
                debug!("Skipping submodule {name} without a path");
                return None;
            };
            let sha = gitlinks.get(&path).cloned();
            Some(SubmoduleEntry {
                name,
                path,
                url: url.unwrap_or_default(),
                sha,
            })
        })
        .collect()
}
