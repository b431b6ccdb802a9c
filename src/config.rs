use std::path::PathBuf;

use anyhow::Result;

const TOKEN_KEY: &str = "skillkit.githubToken";
const REGISTRY_PATH_KEY: &str = "skillkit.registryPath";
const REGISTRY_REPO_KEY: &str = "skillkit.registryRepo";

#[derive(Debug, Clone)]
pub struct Config {
    pub github_token: String,
    /// Local clone of the registry.
    pub registry_path: Option<PathBuf>,
    /// `owner/name` of the registry; derived from the clone's origin if unset.
    pub registry_repo: Option<String>,
}

impl Config {
    /// Load config from git config. `GITHUB_TOKEN` overrides the stored token.
    pub fn load() -> Result<Self> {
        let github_token = match std::env::var("GITHUB_TOKEN") {
            Ok(token) if !token.is_empty() => token,
            _ => Self::get(TOKEN_KEY)?.ok_or_else(|| {
                anyhow::anyhow!("GitHub token not found in git config. Run 'skillkit init' first.")
            })?,
        };

        Ok(Self {
            github_token,
            registry_path: Self::get(REGISTRY_PATH_KEY)?.map(PathBuf::from),
            registry_repo: Self::get(REGISTRY_REPO_KEY)?,
        })
    }

    /// Save config to the global git config
    pub fn save(&self) -> Result<()> {
        Self::set(TOKEN_KEY, &self.github_token)?;
        if let Some(path) = &self.registry_path {
            Self::set(REGISTRY_PATH_KEY, &path.to_string_lossy())?;
        }
        if let Some(repo) = &self.registry_repo {
            Self::set(REGISTRY_REPO_KEY, repo)?;
        }
        Ok(())
    }

    fn get(key: &str) -> Result<Option<String>> {
        let output = std::process::Command::new("git")
            .args(["config", "--get", key])
            .output()?;

        // Exit code 1 means the key is not set
        if !output.status.success() {
            return Ok(None);
        }

        let value = String::from_utf8(output.stdout)?.trim().to_string();
        Ok((!value.is_empty()).then_some(value))
    }

    fn set(key: &str, value: &str) -> Result<()> {
        let output = std::process::Command::new("git")
            .args(["config", "--global", key, value])
            .output()?;

        if !output.status.success() {
            anyhow::bail!("Failed to save {} to git config", key);
        }

        Ok(())
    }

    /// Create a new config with explicit values (useful for tests)
    pub fn new(
        github_token: String,
        registry_path: Option<PathBuf>,
        registry_repo: Option<String>,
    ) -> Self {
        Self {
            github_token,
            registry_path,
            registry_repo,
        }
    }

    /// Default config for tests
    pub fn default_for_tests() -> Self {
        Self {
            github_token: "test-token".to_string(),
            registry_path: None,
            registry_repo: Some("MycroftAI/mycroft-skills".to_string()),
        }
    }
}
