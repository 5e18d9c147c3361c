use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

const CONFIG_FILE_NAME: &str = ".worktree.json";
const CONFIG_PATH_ENV: &str = "WORKTREE_CONFIG";

/// What to do with untracked `.env*` files when creating a worktree.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnvAction {
    Symlink,
    Copy,
    #[default]
    Nothing,
}

impl EnvAction {
    pub fn as_str(self) -> &'static str {
        match self {
            EnvAction::Symlink => "symlink",
            EnvAction::Copy => "copy",
            EnvAction::Nothing => "nothing",
        }
    }
}

/// Per-repository answers replayed on the next run.
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DefaultValues {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dot_env_action: Option<EnvAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_generated_files: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_dependencies: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_in_editor: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_in_terminal: Option<bool>,
}

impl DefaultValues {
    pub fn has_any(&self) -> bool {
        self.dot_env_action.is_some()
            || self.copy_generated_files.is_some()
            || self.install_dependencies.is_some()
            || self.open_in_editor.is_some()
            || self.open_in_terminal.is_some()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RepoConfig {
    pub default_values: DefaultValues,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_scripts: Option<Vec<String>>,
}

/// Contents of `~/.worktree.json`.
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Terminal to launch instead of the detected one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_scripts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repositories: Option<BTreeMap<String, RepoConfig>>,
}

impl Config {
    pub fn repo(&self, repo_name: &str) -> Option<&RepoConfig> {
        self.repositories.as_ref()?.get(repo_name)
    }

    /// Saved defaults for `repo_name`, only when at least one field is set.
    pub fn saved_defaults(&self, repo_name: &str) -> Option<&DefaultValues> {
        self.repo(repo_name)
            .map(|r| &r.default_values)
            .filter(|d| d.has_any())
    }

    /// Global scripts followed by the repository's own.
    pub fn after_scripts(&self, repo_name: &str) -> Vec<String> {
        let global = self.after_scripts.iter().flatten();
        let repo = self
            .repo(repo_name)
            .and_then(|r| r.after_scripts.as_ref())
            .into_iter()
            .flatten();
        global.chain(repo).cloned().collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config format in {}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to save config {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Persistence for saved defaults. Injected so workflows can run against memory.
pub trait ConfigStore: Send + Sync {
    /// `Ok(None)` when no config exists yet.
    fn load(&self) -> Result<Option<Config>, ConfigError>;

    /// Merge `defaults` into the repository's entry, leaving all other data intact.
    fn save_repo_defaults(&self, repo_name: &str, defaults: &DefaultValues)
    -> Result<(), ConfigError>;
}

fn take_object(map: &mut Map<String, Value>, key: &str) -> Map<String, Value> {
    match map.remove(key) {
        Some(Value::Object(inner)) => inner,
        _ => Map::new(),
    }
}

/// Pure merge used by every store. A base that is not a valid config object
/// is replaced by an empty one.
pub fn merge_repo_defaults(base: Option<Value>, repo_name: &str, defaults: &DefaultValues) -> Value {
    let mut root = match base {
        Some(Value::Object(map))
            if serde_json::from_value::<Config>(Value::Object(map.clone())).is_ok() =>
        {
            map
        }
        _ => Map::new(),
    };

    let mut repos = take_object(&mut root, "repositories");
    let mut entry = take_object(&mut repos, repo_name);
    let mut values = take_object(&mut entry, "defaultValues");
    if let Ok(Value::Object(new_values)) = serde_json::to_value(defaults) {
        values.extend(new_values);
    }

    entry.insert("defaultValues".to_string(), Value::Object(values));
    repos.insert(repo_name.to_string(), Value::Object(entry));
    root.insert("repositories".to_string(), Value::Object(repos));
    Value::Object(root)
}

/// JSON file store at `~/.worktree.json`, or `$WORKTREE_CONFIG` when set.
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn from_env() -> Self {
        if let Ok(custom) = std::env::var(CONFIG_PATH_ENV)
            && !custom.is_empty()
        {
            return Self::new(PathBuf::from(custom));
        }
        let home = home::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(CONFIG_FILE_NAME))
    }

    fn read_raw(&self) -> Result<Option<String>, ConfigError> {
        match fs::read_to_string(&self.path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<Option<Config>, ConfigError> {
        let Some(raw) = self.read_raw()? else {
            debug!(path = %self.path.display(), "config:absent");
            return Ok(None);
        };
        let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Invalid {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "config:loaded");
        Ok(Some(config))
    }

    fn save_repo_defaults(
        &self,
        repo_name: &str,
        defaults: &DefaultValues,
    ) -> Result<(), ConfigError> {
        // Unreadable or corrupted files are overwritten with a fresh config.
        let base = self
            .read_raw()
            .ok()
            .flatten()
            .and_then(|raw| serde_json::from_str::<Value>(&raw).ok());
        let merged = merge_repo_defaults(base, repo_name, defaults);

        let write_err = |source| ConfigError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let body = serde_json::to_string_pretty(&merged).map_err(|source| ConfigError::Invalid {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, body).map_err(write_err)?;
        info!(repo = repo_name, path = %self.path.display(), "config:saved");
        Ok(())
    }
}

/// In-memory store for workflow tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryConfigStore {
    pub value: std::sync::Mutex<Option<Value>>,
    pub saves: std::sync::Mutex<Vec<(String, DefaultValues)>>,
}

#[cfg(test)]
impl MemoryConfigStore {
    pub fn with_config(config: &Config) -> Self {
        Self {
            value: std::sync::Mutex::new(Some(serde_json::to_value(config).unwrap())),
            saves: Default::default(),
        }
    }
}

#[cfg(test)]
impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<Option<Config>, ConfigError> {
        let value = self.value.lock().unwrap().clone();
        Ok(value.map(|v| serde_json::from_value(v).unwrap()))
    }

    fn save_repo_defaults(
        &self,
        repo_name: &str,
        defaults: &DefaultValues,
    ) -> Result<(), ConfigError> {
        let mut value = self.value.lock().unwrap();
        *value = Some(merge_repo_defaults(value.take(), repo_name, defaults));
        self.saves
            .lock()
            .unwrap()
            .push((repo_name.to_string(), defaults.clone()));
        Ok(())
    }
}
