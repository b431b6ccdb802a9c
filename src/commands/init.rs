use std::path::PathBuf;

use anyhow::Result;
use dialoguer::Input;

use crate::config::Config;

/// Prompt for the registry location and a GitHub token and store them in the
/// global git config.
pub async fn cmd_init(stdout: &mut impl std::io::Write) -> Result<()> {
    // Try to load existing config or use defaults
    let current_config =
        Config::load().unwrap_or_else(|_| Config::new(String::new(), None, None));

    let registry_path: String = Input::new()
        .with_prompt("Path to your clone of the skills registry")
        .default(
            current_config
                .registry_path
                .map(|path| path.to_string_lossy().into_owned())
                .unwrap_or_default(),
        )
        .interact_text()?;

    let registry_repo: String = Input::new()
        .with_prompt("Registry repository on GitHub (owner/name, empty to use the clone's origin)")
        .default(current_config.registry_repo.unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;

    // Show instructions for creating a GitHub token
    writeln!(stdout)?;
    writeln!(stdout, "Create a personal access token at:")?;
    writeln!(stdout, "https://github.com/settings/tokens/new")?;
    writeln!(stdout)?;
    writeln!(stdout, "Required scopes:")?;
    writeln!(stdout, "  - public_repo")?;
    writeln!(stdout)?;

    let github_token: String = Input::new()
        .with_prompt("GitHub Personal Access Token")
        .default(current_config.github_token)
        .interact_text()?;

    let registry_repo = registry_repo.trim();
    let new_config = Config::new(
        github_token,
        Some(PathBuf::from(registry_path)),
        (!registry_repo.is_empty()).then(|| registry_repo.to_string()),
    );
    new_config.save()?;

    writeln!(stdout, "Configuration saved to the global git config")?;

    Ok(())
}
