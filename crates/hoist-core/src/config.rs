use crate::error::{HoistError, Result};
use crate::paths;
use crate::poller::Poller;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Names the EKS cluster and prefixes the state bucket unless overridden.
    pub name: String,
}

// ---------------------------------------------------------------------------
// ClusterSize / ClusterConfig / AwsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSize {
    #[serde(default = "default_size_min")]
    pub min: u32,
    #[serde(default = "default_size_max")]
    pub max: u32,
    #[serde(default = "default_size_desired")]
    pub desired: u32,
}

fn default_size_min() -> u32 {
    2
}

fn default_size_max() -> u32 {
    4
}

fn default_size_desired() -> u32 {
    2
}

impl Default for ClusterSize {
    fn default() -> Self {
        Self {
            min: default_size_min(),
            max: default_size_max(),
            desired: default_size_desired(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Overrides the project name as the cluster name when set.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub size: ClusterSize,
    #[serde(default = "default_node_type")]
    pub node_instance_type: String,
}

fn default_node_type() -> String {
    "t3.medium".to_string()
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            size: ClusterSize::default(),
            node_instance_type: default_node_type(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default)]
    pub cluster: ClusterConfig,
}

fn default_profile() -> String {
    "default".to_string()
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            cluster: ClusterConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// DestroyConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestroyConfig {
    #[serde(default = "default_destroy_enabled")]
    pub enabled: bool,
}

fn default_destroy_enabled() -> bool {
    true
}

impl Default for DestroyConfig {
    fn default() -> Self {
        Self {
            enabled: default_destroy_enabled(),
        }
    }
}

// ---------------------------------------------------------------------------
// PollConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_poll_interval")]
    pub interval_seconds: u64,
    #[serde(default = "default_poll_attempts")]
    pub max_attempts: u32,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_poll_attempts() -> u32 {
    12
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_poll_interval(),
            max_attempts: default_poll_attempts(),
        }
    }
}

impl PollConfig {
    pub fn poller(&self) -> Poller {
        Poller::new(Duration::from_secs(self.interval_seconds), self.max_attempts)
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: ProjectConfig,
    #[serde(default)]
    pub aws: AwsConfig,
    #[serde(default)]
    pub destroy: DestroyConfig,
    #[serde(default)]
    pub poll: PollConfig,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: ProjectConfig {
                name: project_name.into(),
            },
            aws: AwsConfig::default(),
            destroy: DestroyConfig::default(),
            poll: PollConfig::default(),
        }
    }

    /// Cluster name: explicit override, else the project name.
    pub fn cluster_name(&self) -> &str {
        if self.aws.cluster.name.is_empty() {
            &self.project.name
        } else {
            &self.aws.cluster.name
        }
    }

    /// The state bucket is `<prefix>-<accountId>`; the prefix is the project.
    pub fn state_bucket_prefix(&self) -> &str {
        &self.project.name
    }

    /// Load the config for the active environment.
    pub fn load(root: &Path) -> Result<Self> {
        let env = active_env(root)?;
        Self::load_env(root, &env)
    }

    /// Load a named environment's config file.
    pub fn load_env(root: &Path, env: &str) -> Result<Self> {
        let path = paths::env_path(root, env);
        if !path.exists() {
            if env == paths::DEFAULT_ENV {
                return Err(HoistError::NotInitialized);
            }
            return Err(HoistError::UnknownEnvironment(env.to_string()));
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Save this config as the named environment.
    pub fn save(&self, root: &Path, env: &str) -> Result<()> {
        paths::validate_env_name(env)?;
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&paths::env_path(root, env), data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.project.name.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "project.name is empty".to_string(),
            });
        }

        if self.aws.profile.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "aws.profile is empty".to_string(),
            });
        }

        let size = &self.aws.cluster.size;
        if size.min > size.max {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "aws.cluster.size.min ({}) is greater than max ({})",
                    size.min, size.max
                ),
            });
        }
        if size.desired < size.min || size.desired > size.max {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "aws.cluster.size.desired ({}) is outside [{}, {}]",
                    size.desired, size.min, size.max
                ),
            });
        }

        if self.poll.max_attempts == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "poll.max_attempts is 0: every wait would time out immediately"
                    .to_string(),
            });
        }
        if self.poll.interval_seconds == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "poll.interval_seconds is 0: polling will busy-loop".to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Environment selection
// ---------------------------------------------------------------------------

/// The active environment name, from the pointer file. A missing pointer
/// means the default environment.
pub fn active_env(root: &Path) -> Result<String> {
    let path = paths::active_path(root);
    if !path.exists() {
        return Ok(paths::DEFAULT_ENV.to_string());
    }
    let name = std::fs::read_to_string(&path)?.trim().to_string();
    if name.is_empty() {
        return Ok(paths::DEFAULT_ENV.to_string());
    }
    Ok(name)
}

/// Point the active-environment file at `env`. The environment must exist.
pub fn set_active_env(root: &Path, env: &str) -> Result<()> {
    paths::validate_env_name(env)?;
    if !paths::env_path(root, env).exists() {
        return Err(HoistError::UnknownEnvironment(env.to_string()));
    }
    crate::io::atomic_write(&paths::active_path(root), env.as_bytes())
}

/// All environment names with a config file, sorted.
pub fn list_envs(root: &Path) -> Result<Vec<String>> {
    let dir = paths::envs_dir(root);
    if !dir.exists() {
        return Err(HoistError::NotInitialized);
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let path = entry?.path();
        if path.extension().map(|e| e == "yaml").unwrap_or(false) {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::new("go-http-api");
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.project.name, "go-http-api");
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.aws.profile, "default");
        assert_eq!(parsed.aws.cluster.size.min, 2);
        assert_eq!(parsed.aws.cluster.size.max, 4);
        assert_eq!(parsed.aws.cluster.size.desired, 2);
        assert!(parsed.destroy.enabled);
        assert_eq!(parsed.poll.interval_seconds, 5);
        assert_eq!(parsed.poll.max_attempts, 12);
    }

    #[test]
    fn minimal_yaml_fills_defaults() {
        let cfg: Config = serde_yaml::from_str("project:\n  name: api\n").unwrap();
        assert_eq!(cfg.aws.profile, "default");
        assert_eq!(cfg.aws.cluster.node_instance_type, "t3.medium");
        assert!(cfg.destroy.enabled);
        assert_eq!(cfg.poll.max_attempts, 12);
    }

    #[test]
    fn cluster_name_falls_back_to_project() {
        let mut cfg = Config::new("api");
        assert_eq!(cfg.cluster_name(), "api");
        cfg.aws.cluster.name = "api-blue".to_string();
        assert_eq!(cfg.cluster_name(), "api-blue");
    }

    #[test]
    fn save_and_load_named_env() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::new("api");
        cfg.aws.profile = "staging-admin".to_string();
        cfg.save(dir.path(), "staging").unwrap();

        let loaded = Config::load_env(dir.path(), "staging").unwrap();
        assert_eq!(loaded.aws.profile, "staging-admin");
    }

    #[test]
    fn load_missing_default_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(matches!(err, HoistError::NotInitialized));
    }

    #[test]
    fn load_missing_named_env_is_unknown() {
        let dir = TempDir::new().unwrap();
        Config::new("api").save(dir.path(), "default").unwrap();
        let err = Config::load_env(dir.path(), "prod").unwrap_err();
        assert!(matches!(err, HoistError::UnknownEnvironment(_)));
    }

    #[test]
    fn active_env_defaults_then_follows_pointer() {
        let dir = TempDir::new().unwrap();
        assert_eq!(active_env(dir.path()).unwrap(), "default");

        Config::new("api").save(dir.path(), "staging").unwrap();
        set_active_env(dir.path(), "staging").unwrap();
        assert_eq!(active_env(dir.path()).unwrap(), "staging");

        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.project.name, "api");
    }

    #[test]
    fn set_active_rejects_unknown_env() {
        let dir = TempDir::new().unwrap();
        let err = set_active_env(dir.path(), "ghost").unwrap_err();
        assert!(matches!(err, HoistError::UnknownEnvironment(_)));
    }

    #[test]
    fn list_envs_sorted() {
        let dir = TempDir::new().unwrap();
        Config::new("api").save(dir.path(), "staging").unwrap();
        Config::new("api").save(dir.path(), "default").unwrap();
        Config::new("api").save(dir.path(), "prod").unwrap();
        assert_eq!(
            list_envs(dir.path()).unwrap(),
            vec!["default", "prod", "staging"]
        );
    }

    #[test]
    fn validate_flags_inverted_sizing() {
        let mut cfg = Config::new("api");
        cfg.aws.cluster.size.min = 5;
        cfg.aws.cluster.size.max = 2;
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("greater than max")));
    }

    #[test]
    fn validate_flags_desired_out_of_range() {
        let mut cfg = Config::new("api");
        cfg.aws.cluster.size.desired = 10;
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Warning && w.message.contains("desired")));
    }

    #[test]
    fn validate_clean_config_is_quiet() {
        assert!(Config::new("api").validate().is_empty());
    }

    #[test]
    fn validate_flags_zero_poll_budget() {
        let mut cfg = Config::new("api");
        cfg.poll.max_attempts = 0;
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.level == WarnLevel::Error));
    }
}
