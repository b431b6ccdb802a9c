use anyhow::Result;
use colored::Colorize;

use crate::App;
use crate::app::Reconciled;
use crate::error::SkillKitError;
use crate::ops::git::GitOps;
use crate::ops::github::GithubOps;
use crate::plugin::PluginEntry;
use crate::pull_request::PullRequestDraft;

pub const ADD_BRANCH_PREFIX: &str = "add/";

impl<G: GitOps, H: GithubOps> App<G, H> {
    /// Propose a skill the registry doesn't track yet.
    ///
    /// 1. Recreate `add/<name>` from the refreshed registry.
    /// 2. Add the skill as submodule `<name>` and commit it.
    /// 3. Force push to the fork and open (or update) the PR.
    pub async fn cmd_add(
        &self,
        plugin: &PluginEntry,
        stdout: &mut impl std::io::Write,
    ) -> Result<Reconciled> {
        if self.registry.index.contains(&plugin.name) {
            return Err(SkillKitError::AlreadyRegistered {
                name: plugin.name.clone(),
            }
            .into());
        }

        let git = &self.registry.git;
        let branch = format!("{}{}", ADD_BRANCH_PREFIX, plugin.name);
        self.checkout_fresh_branch(&branch).await?;
        git.submodule_add(&plugin.url, &plugin.name).await?;
        git.add(&plugin.name).await?;
        git.commit(&format!("Add {}", plugin.name)).await?;

        let target = self.setup_fork().await?;
        self.push_to_fork(&branch).await?;

        let draft = PullRequestDraft::add(
            &plugin.name,
            &plugin.url,
            target.base.clone(),
            target.head(&branch),
        );
        writeln!(stdout)?;
        writeln!(stdout, "{}", format!("=== {} ===", draft.title).bold())?;
        writeln!(stdout, "{}", draft.body)?;
        writeln!(stdout)?;

        let reconciled = self.create_or_edit_pr(&draft).await?;
        let verb = match reconciled {
            Reconciled::Created(_) => "Created",
            Reconciled::Updated(_) => "Updated",
        };
        writeln!(stdout, "{} PR at: {}", verb, reconciled.pull().html_url)?;

        Ok(reconciled)
    }
}
