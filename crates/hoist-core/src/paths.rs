use crate::error::{HoistError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const HOIST_DIR: &str = ".hoist";
pub const ENVS_DIR: &str = ".hoist/envs";
pub const ACTIVE_FILE: &str = ".hoist/active";

/// Terraform modules live here, relative to the project root.
pub const TERRAFORM_DIR: &str = "terraform";
/// Plan artifacts and generated manifests, relative to the terraform root.
pub const SCRATCH_DIR: &str = ".tmp";
/// Kubernetes manifests live here, relative to the project root.
pub const DEPLOY_DIR: &str = "deploy";

pub const DEFAULT_ENV: &str = "default";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn hoist_dir(root: &Path) -> PathBuf {
    root.join(HOIST_DIR)
}

pub fn envs_dir(root: &Path) -> PathBuf {
    root.join(ENVS_DIR)
}

pub fn env_path(root: &Path, name: &str) -> PathBuf {
    envs_dir(root).join(format!("{name}.yaml"))
}

pub fn active_path(root: &Path) -> PathBuf {
    root.join(ACTIVE_FILE)
}

pub fn terraform_root(root: &Path) -> PathBuf {
    root.join(TERRAFORM_DIR)
}

pub fn scratch_dir(terraform_root: &Path) -> PathBuf {
    terraform_root.join(SCRATCH_DIR)
}

pub fn deploy_dir(root: &Path) -> PathBuf {
    root.join(DEPLOY_DIR)
}

pub fn service_manifest(root: &Path) -> PathBuf {
    deploy_dir(root).join("service.yml")
}

// ---------------------------------------------------------------------------
// Environment name validation
// ---------------------------------------------------------------------------

static ENV_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn env_name_re() -> &'static Regex {
    ENV_NAME_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

pub fn validate_env_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 || !env_name_re().is_match(name) {
        return Err(HoistError::InvalidEnvName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_env_names() {
        for name in ["default", "staging", "prod-us-west-2", "a", "x1"] {
            validate_env_name(name).unwrap_or_else(|_| panic!("expected valid: {name}"));
        }
    }

    #[test]
    fn invalid_env_names() {
        for name in [
            "",
            "-starts-with-dash",
            "ends-with-dash-",
            "has spaces",
            "UPPER",
            "a_b",
        ] {
            assert!(validate_env_name(name).is_err(), "expected invalid: {name}");
        }
    }

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            env_path(root, "staging"),
            PathBuf::from("/tmp/proj/.hoist/envs/staging.yaml")
        );
        assert_eq!(active_path(root), PathBuf::from("/tmp/proj/.hoist/active"));
        assert_eq!(
            terraform_root(root),
            PathBuf::from("/tmp/proj/terraform")
        );
        assert_eq!(
            service_manifest(root),
            PathBuf::from("/tmp/proj/deploy/service.yml")
        );
    }
}
