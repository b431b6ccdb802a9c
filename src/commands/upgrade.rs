use std::fmt::Display;
use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;
use futures_util::StreamExt as _;
use futures_util::TryStreamExt as _;
use futures_util::stream;
use log::debug;
use log::info;

use crate::App;
use crate::app::ForkTarget;
use crate::app::Reconciled;
use crate::error::SkillKitError;
use crate::ops::git::GitOps;
use crate::ops::github::GithubOps;
use crate::plugin::PluginEntry;
use crate::pull_request::CommitLine;
use crate::pull_request::PullRequestDraft;

pub const UPGRADE_BRANCH_PREFIX: &str = "upgrade/";

/// Upper bound on commit lookups (`git show` plus a GitHub call each) in
/// flight while drafting the PR.
const COMMIT_LOOKUPS: usize = 4;

/// Progress of an upgrade run. Stages only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UpgradeStage {
    Start,
    SubmoduleResolved,
    UpstreamSynced,
    BranchReady,
    Committed,
    ForkReady,
    Pushed,
    PrReconciled,
    Done,
}

impl Display for UpgradeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Upgrades one skill's submodule in the registry and proposes the change
/// upstream.
///
/// Everything the run depends on is resolved in [`UpgradeCoordinator::new`];
/// [`UpgradeCoordinator::run`] then performs the side effects strictly in
/// order. A failure at any point aborts the run. Everything done so far stays
/// in place and the next run starts over from a refreshed registry.
pub struct UpgradeCoordinator<'a, G, H> {
    app: &'a App<G, H>,
    plugin: &'a PluginEntry,
    /// Path of the skill's submodule inside the registry.
    submodule_path: String,
    /// Registry branch carrying the upgrade.
    branch: String,
    /// Working copy of the skill's submodule.
    skill: G,
    stage: UpgradeStage,
}

impl<'a, G: GitOps, H: GithubOps> UpgradeCoordinator<'a, G, H> {
    /// Resolve the skill's submodule in the (already refreshed) registry and
    /// open its working copy with `open_git`.
    pub async fn new(
        app: &'a App<G, H>,
        plugin: &'a PluginEntry,
        open_git: impl FnOnce(PathBuf) -> G,
    ) -> Result<Self> {
        let submodule_path = app.registry.index.resolve(&plugin.name)?.to_string();
        app.registry
            .git
            .submodule_update_init(&submodule_path)
            .await?;
        let skill = open_git(app.registry.path.join(&submodule_path));

        let mut coordinator = Self {
            app,
            plugin,
            submodule_path,
            branch: format!("{}{}", UPGRADE_BRANCH_PREFIX, plugin.name),
            skill,
            stage: UpgradeStage::Start,
        };
        coordinator.advance(UpgradeStage::SubmoduleResolved);
        Ok(coordinator)
    }

    pub fn stage(&self) -> UpgradeStage {
        self.stage
    }

    fn advance(&mut self, next: UpgradeStage) {
        debug_assert!(next > self.stage, "{} -> {}", self.stage, next);
        debug!("{}: {} -> {}", self.plugin.name, self.stage, next);
        self.stage = next;
    }

    /// Perform the upgrade and print the PR to `stdout`.
    pub async fn run(mut self, stdout: &mut impl std::io::Write) -> Result<Reconciled> {
        self.sync_upstream().await?;
        self.advance(UpgradeStage::UpstreamSynced);

        self.app.checkout_fresh_branch(&self.branch).await?;
        self.advance(UpgradeStage::BranchReady);

        self.commit_submodule().await?;
        self.advance(UpgradeStage::Committed);

        let target = self.app.setup_fork().await?;
        self.advance(UpgradeStage::ForkReady);

        self.app.push_to_fork(&self.branch).await?;
        self.advance(UpgradeStage::Pushed);

        let draft = self.pr_draft(&target).await?;
        writeln!(stdout)?;
        writeln!(stdout, "{}", format!("=== {} ===", draft.title).bold())?;
        writeln!(stdout, "{}", draft.body)?;
        writeln!(stdout)?;

        let reconciled = self.app.create_or_edit_pr(&draft).await?;
        self.advance(UpgradeStage::PrReconciled);

        let verb = match reconciled {
            Reconciled::Created(_) => "Created",
            Reconciled::Updated(_) => "Updated",
        };
        writeln!(stdout, "{} PR at: {}", verb, reconciled.pull().html_url)?;
        self.advance(UpgradeStage::Done);

        Ok(reconciled)
    }

    /// Move the submodule to the tip of its upstream default branch, whatever
    /// it had checked out before.
    async fn sync_upstream(&self) -> Result<()> {
        self.skill.fetch("origin").await?;
        self.skill.update_remote_head("origin").await?;
        let default_branch = self
            .skill
            .symbolic_ref("refs/remotes/origin/HEAD")
            .await?;
        self.skill.reset_hard(&default_branch).await?;
        let head = self.skill.head().await?;
        info!(
            "Synced {} to {} ({})",
            self.submodule_path, default_branch, head
        );
        Ok(())
    }

    /// Stage and commit the moved submodule pointer.
    ///
    /// Fails with [`SkillKitError::AlreadyUpdated`] when the pointer did not
    /// move and the registry already tracks the path.
    async fn commit_submodule(&self) -> Result<()> {
        let git = &self.app.registry.git;
        if !git.has_diff(&self.submodule_path).await?
            && !git.ls_files(&self.submodule_path).await?.is_empty()
        {
            return Err(SkillKitError::AlreadyUpdated {
                name: self.plugin.name.clone(),
            }
            .into());
        }

        git.add(&self.submodule_path).await?;
        git.commit(&format!("Upgrade {}", self.plugin.name)).await?;
        Ok(())
    }

    /// Describe the upstream commits between the recorded and the new
    /// submodule commit, newest first.
    async fn pr_draft(&self, target: &ForkTarget) -> Result<PullRequestDraft> {
        let commits = match &self.plugin.sha {
            Some(recorded) => self.skill.rev_list_ancestry(recorded, "HEAD").await?,
            None => vec![],
        };

        let repo = self.plugin.repo_full_name();
        let lines: Vec<CommitLine> = stream::iter(&commits)
            .map(|sha| {
                let repo = &repo;
                async move {
                    let subject = self.skill.commit_subject(sha).await?;
                    let url = self.app.gh.commit_html_url(repo, sha).await?;
                    anyhow::Ok(CommitLine { subject, url })
                }
            })
            .buffered(COMMIT_LOOKUPS)
            .try_collect()
            .await?;

        Ok(PullRequestDraft::upgrade(
            &self.plugin.name,
            &lines,
            target.base.clone(),
            target.head(&self.branch),
        ))
    }
}

impl<G: GitOps, H: GithubOps> App<G, H> {
    /// Upgrade `plugin` in the registry and open or update its PR.
    ///
    /// `open_git` opens the working copy of the skill's submodule.
    pub async fn cmd_upgrade(
        &self,
        plugin: &PluginEntry,
        open_git: impl FnOnce(PathBuf) -> G,
        stdout: &mut impl std::io::Write,
    ) -> Result<Reconciled> {
        UpgradeCoordinator::new(self, plugin, open_git)
            .await?
            .run(stdout)
            .await
    }
}
