/// Substring identifying a PR description as generated by this tool. A PR is
/// only ever edited while its body still contains it.
pub const PROVENANCE_MARKER: &str = env!("CARGO_PKG_NAME");

/// One upstream commit to mention in an upgrade PR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitLine {
    pub subject: String,
    pub url: String,
}

/// A pull request about to be created or used to overwrite an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestDraft {
    pub title: String,
    pub body: String,
    /// Branch of the registry to merge into.
    pub base: String,
    /// `fork_owner:branch`
    pub head: String,
}

impl PullRequestDraft {
    /// Draft for upgrading `name`. `commits` are listed in the given order,
    /// which callers take from `git rev-list` (newest first).
    pub fn upgrade(name: &str, commits: &[CommitLine], base: String, head: String) -> Self {
        let body = if commits.is_empty() {
            format!("This upgrades {} to the latest upstream version.", name)
        } else {
            let bullets = commits
                .iter()
                .map(|commit| {
                    format!(
                        "- [{}]({})",
                        escape_link_text(&commit.subject),
                        commit.url
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "This upgrades {} to include the following new commits:\n\n{}",
                name, bullets
            )
        };

        Self {
            title: format!("Upgrade {}", name),
            body: format!("{}\n\n{}", body, footer()),
            base,
            head,
        }
    }

    /// Draft for adding `name`, sourced from `url`, to the registry.
    pub fn add(name: &str, url: &str, base: String, head: String) -> Self {
        Self {
            title: format!("Add {}", name),
            body: format!(
                "This adds {} ([source]({})) to the registry.\n\n{}",
                name,
                url,
                footer()
            ),
            base,
            head,
        }
    }
}

fn footer() -> String {
    format!(
        "<sub>Created with {} v{}</sub>",
        PROVENANCE_MARKER,
        env!("CARGO_PKG_VERSION")
    )
}

fn escape_link_text(text: &str) -> String {
    text.replace('[', "\\[").replace(']', "\\]")
}
