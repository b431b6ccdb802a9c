use std::cell::RefCell;
use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;

use anyhow::Result;
use anyhow::anyhow;
use skillkit::ops::git::CommitId;
use skillkit::ops::github::GithubOps;
use skillkit::ops::github::PullRequest;
use skillkit::ops::github::Repo;
use skillkit::ops::github::User;
use skillkit::pull_request::PullRequestDraft;
use tokio::process::Command;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::Layer as _;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Run git in `dir` and return its trimmed stdout.
pub async fn git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .output()
        .await?;
    anyhow::ensure!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(String::from_utf8(output.stdout)?.trim().to_string())
}

/// Set the identity git needs for commits.
pub async fn configure_user(dir: &Path) -> Result<()> {
    git(dir, &["config", "user.name", "Test User"]).await?;
    git(dir, &["config", "user.email", "test@example.com"]).await?;
    Ok(())
}

/// Creates a git repository with a `main` branch in the given directory.
///
/// The directory should already exist.
pub async fn create_git_repo(dir: &Path) -> Result<()> {
    git(dir, &["init", "-b", "main"]).await?;
    configure_user(dir).await
}

/// Creates a bare repository at `dir`, standing in for a hosted remote.
pub async fn create_bare_repo(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    git(dir, &["init", "--bare", "-b", "main"]).await?;
    Ok(())
}

/// Writes `filename` and commits it. Returns the new commit.
pub async fn create_commit(
    dir: &Path,
    message: &str,
    filename: &str,
    contents: &str,
) -> Result<CommitId> {
    tokio::fs::write(dir.join(filename), contents).await?;
    git(dir, &["add", filename]).await?;
    git(dir, &["commit", "-m", message]).await?;
    Ok(CommitId(git(dir, &["rev-parse", "HEAD"]).await?))
}

/// Clones `source` into `dest`, with submodules checked out.
pub async fn clone_repo(source: &Path, dest: &Path) -> Result<()> {
    let parent = dest.parent().ok_or_else(|| anyhow!("no parent"))?;
    git(
        parent,
        &[
            "clone",
            &source.to_string_lossy(),
            &dest.to_string_lossy(),
        ],
    )
    .await?;
    configure_user(dest).await?;
    git(
        dest,
        &["-c", "protocol.file.allow=always", "submodule", "update", "--init"],
    )
    .await?;
    Ok(())
}

/// Adds `url` as submodule `path` of `dir` and commits it.
pub async fn add_submodule(dir: &Path, url: &Path, path: &str) -> Result<()> {
    git(
        dir,
        &[
            "-c",
            "protocol.file.allow=always",
            "submodule",
            "add",
            &url.to_string_lossy(),
            path,
        ],
    )
    .await?;
    git(dir, &["commit", "-m", &format!("Add {}", path)]).await?;
    Ok(())
}

/// Branch names in `dir`, local or (for bare repos) hosted.
pub async fn branches(dir: &Path) -> Result<Vec<String>> {
    let out = git(dir, &["branch", "--format=%(refname:short)"]).await?;
    Ok(out.lines().map(str::to_string).collect())
}

pub fn setup_logging() -> Result<()> {
    let timer = tracing_subscriber::fmt::time::ChronoLocal::new("%H:%M:%S%.3f".into());
    let format = tracing_subscriber::fmt::format().with_timer(timer);
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;
    let subscriber = tracing_subscriber::fmt::layer()
        .event_format(format)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_filter(filter);
    // Several tests in one binary may try to install it
    let _ = tracing_subscriber::registry().with(subscriber).try_init();
    Ok(())
}

pub enum TestDir {
    Temp(tempfile::TempDir),
    Kept(PathBuf),
}

impl TestDir {
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = tempfile::tempdir()?;

        if std::env::var("DEBUG_TESTS").is_ok() {
            let path = temp_dir.keep();
            eprintln!("Test directory kept at: {}", path.display());
            Ok(TestDir::Kept(path))
        } else {
            Ok(TestDir::Temp(temp_dir))
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            TestDir::Temp(t) => t.path(),
            TestDir::Kept(p) => p.as_path(),
        }
    }
}

/// In-memory GitHub serving a single registry and the user's fork of it.
///
/// The fork's clone URL points at a local bare repository so pushes land
/// somewhere inspectable.
pub struct FakeGithub {
    pub registry: Repo,
    pub fork: Repo,
    pub login: String,
    /// Open PRs with the head they were opened from.
    pub pulls: RefCell<Vec<(String, PullRequest)>>,
    /// Every call that changed a PR, as `create <n>` or `edit <n>`.
    pub calls: RefCell<Vec<String>>,
}

impl FakeGithub {
    pub fn new(registry_full_name: &str, login: &str, fork_path: &Path) -> Self {
        let repo_name = registry_full_name
            .rsplit('/')
            .next()
            .unwrap_or(registry_full_name);
        let fork_full_name = format!("{}/{}", login, repo_name);
        Self {
            registry: Repo {
                full_name: registry_full_name.to_string(),
                html_url: format!("https://github.com/{}", registry_full_name),
                clone_url: format!("https://github.com/{}.git", registry_full_name),
                default_branch: "main".to_string(),
            },
            fork: Repo {
                html_url: format!("https://github.com/{}", fork_full_name),
                full_name: fork_full_name,
                clone_url: fork_path.to_string_lossy().into_owned(),
                default_branch: "main".to_string(),
            },
            login: login.to_string(),
            pulls: RefCell::new(vec![]),
            calls: RefCell::new(vec![]),
        }
    }

    /// Replace the description of PR `number`, as a person would on GitHub.
    pub fn hand_edit(&self, number: u64, body: &str) {
        for (_, pull) in self.pulls.borrow_mut().iter_mut() {
            if pull.number == number {
                pull.body = Some(body.to_string());
            }
        }
    }

    fn timestamp(&self) -> String {
        format!("2026-10-19T00:00:{:02}Z", self.calls.borrow().len())
    }
}

impl GithubOps for FakeGithub {
    async fn get_repo(&self, full_name: &str) -> Result<Repo> {
        anyhow::ensure!(full_name == self.registry.full_name, "Not Found");
        Ok(self.registry.clone())
    }

    async fn authenticated_user(&self) -> Result<User> {
        Ok(User {
            login: self.login.clone(),
        })
    }

    async fn create_fork(&self, full_name: &str) -> Result<Repo> {
        anyhow::ensure!(full_name == self.registry.full_name, "Not Found");
        Ok(self.fork.clone())
    }

    async fn list_pulls(
        &self,
        full_name: &str,
        base: &str,
        head: &str,
    ) -> Result<Vec<PullRequest>> {
        anyhow::ensure!(full_name == self.registry.full_name, "Not Found");
        anyhow::ensure!(base == self.registry.default_branch, "unexpected base {}", base);
        Ok(self
            .pulls
            .borrow()
            .iter()
            .filter(|(pull_head, _)| pull_head == head)
            .map(|(_, pull)| pull.clone())
            .collect())
    }

    async fn create_pull(&self, full_name: &str, draft: &PullRequestDraft) -> Result<PullRequest> {
        let number = self.pulls.borrow().len() as u64 + 1;
        let pull = PullRequest {
            number,
            html_url: format!("https://github.com/{}/pull/{}", full_name, number),
            title: draft.title.clone(),
            body: Some(draft.body.clone()),
            updated_at: self.timestamp(),
        };
        self.pulls
            .borrow_mut()
            .push((draft.head.clone(), pull.clone()));
        self.calls.borrow_mut().push(format!("create {}", number));
        Ok(pull)
    }

    async fn edit_pull(
        &self,
        _full_name: &str,
        number: u64,
        title: &str,
        body: &str,
    ) -> Result<PullRequest> {
        let updated_at = self.timestamp();
        let mut pulls = self.pulls.borrow_mut();
        let pull = pulls
            .iter_mut()
            .map(|(_, pull)| pull)
            .find(|pull| pull.number == number)
            .ok_or_else(|| anyhow!("Not Found"))?;
        pull.title = title.to_string();
        pull.body = Some(body.to_string());
        pull.updated_at = updated_at;
        let pull = pull.clone();
        drop(pulls);
        self.calls.borrow_mut().push(format!("edit {}", number));
        Ok(pull)
    }

    async fn commit_html_url(&self, full_name: &str, sha: &CommitId) -> Result<String> {
        Ok(format!("https://github.com/{}/commit/{}", full_name, sha))
    }
}
