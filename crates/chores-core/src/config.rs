use crate::model::{Direction, SortKey};
use crate::reconcile::CompletedItems;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub list: ListConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListConfig {
    #[serde(default = "default_true")]
    pub hide_completed: bool,
    #[serde(default)]
    pub sort: SortKey,
    #[serde(default)]
    pub direction: Direction,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            hide_completed: default_true(),
            sort: SortKey::default(),
            direction: Direction::default(),
        }
    }
}

impl ListConfig {
    #[must_use]
    pub const fn completed_items(&self) -> CompletedItems {
        if self.hide_completed {
            CompletedItems::Hidden
        } else {
            CompletedItems::Shown
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Artificial delay applied to every in-memory store job.
    #[serde(default)]
    pub latency_ms: u64,
}

impl StoreConfig {
    #[must_use]
    pub const fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    /// Output format from config and environment, if any was set. Command
    /// line flags are applied on top by the caller.
    pub output: Option<String>,
}

const fn default_true() -> bool {
    true
}

/// Load `.chores/config.toml` under `project_root`, or defaults when absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(".chores/config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load `chores/config.toml` from the user config directory, or defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("chores/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Merge project config, user config and the `FORMAT` environment variable.
///
/// # Errors
///
/// Returns an error if either config file is malformed.
pub fn resolve_config(project_root: &Path) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;
    let output = resolve_output(
        env::var("FORMAT").ok(),
        project.output.format.clone(),
        user.output.clone(),
    );

    Ok(EffectiveConfig {
        project,
        user,
        output,
    })
}

/// Environment beats project config beats user config.
fn resolve_output(
    env_format: Option<String>,
    project_output: Option<String>,
    user_output: Option<String>,
) -> Option<String> {
    [env_format, project_output, user_output]
        .into_iter()
        .flatten()
        .map(|raw| raw.trim().to_ascii_lowercase())
        .find(|raw| !raw.is_empty())
}
