//! Preflight checks for the external tools hoist drives.

use std::sync::Arc;

use regex::Regex;
use serde::Serialize;

use crate::error::{HoistError, Result};
use crate::runner::{CommandRunner, ExecOptions};

/// A tool the harness shells out to, with the oldest version we drive.
pub struct Requirement {
    pub name: &'static str,
    pub version_args: &'static [&'static str],
    /// Pattern with one capture group holding the version in the banner.
    pub pattern: &'static str,
    pub minimum: (u32, u32),
    /// Where to get the tool, shown when it is missing or outdated.
    pub help: &'static str,
}

pub const REQUIREMENTS: &[Requirement] = &[
    Requirement {
        name: "terraform",
        version_args: &["version"],
        pattern: r"Terraform v(\d+\.\d+(?:\.\d+)?)",
        minimum: (1, 0),
        help: "https://developer.hashicorp.com/terraform/install",
    },
    Requirement {
        name: "kubectl",
        version_args: &["version", "--client"],
        pattern: r"Client Version:\s*v?(\d+\.\d+(?:\.\d+)?)",
        minimum: (1, 20),
        help: "https://kubernetes.io/docs/tasks/tools/",
    },
    Requirement {
        name: "aws",
        version_args: &["--version"],
        pattern: r"aws-cli/(\d+\.\d+(?:\.\d+)?)",
        minimum: (2, 0),
        help: "https://docs.aws.amazon.com/cli/latest/userguide/getting-started-install.html",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Ok,
    Outdated,
    Missing,
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

/// `major.minor` from the banner text, per the requirement's pattern.
fn extract_version(pattern: &str, text: &str) -> Option<(u32, u32)> {
    let re = Regex::new(pattern).ok()?;
    let caps = re.captures(text)?;
    let mut parts = caps.get(1)?.as_str().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

/// Error out unless every named executable is on PATH. Commands call this
/// before doing any work so the failure is one clear message, not a broken
/// run halfway through.
pub fn ensure_present(names: &[&str]) -> Result<()> {
    for name in names {
        which::which(name).map_err(|_| HoistError::MissingExecutable(name.to_string()))?;
    }
    Ok(())
}

/// Run every requirement's version command and grade the result.
pub fn check_all(runner: &Arc<dyn CommandRunner>) -> Vec<CheckReport> {
    REQUIREMENTS
        .iter()
        .map(|req| {
            if which::which(req.name).is_err() {
                return CheckReport {
                    name: req.name.to_string(),
                    status: CheckStatus::Missing,
                    detail: format!("not found on PATH ({})", req.help),
                };
            }
            probe_version(runner.as_ref(), req)
        })
        .collect()
}

fn probe_version(runner: &dyn CommandRunner, req: &Requirement) -> CheckReport {
    // Version commands may exit non-zero (kubectl does without a cluster)
    // and some print the banner to stderr.
    let result = match runner.run(req.name, req.version_args, &ExecOptions::probe()) {
        Ok(result) => result,
        Err(e) => {
            return CheckReport {
                name: req.name.to_string(),
                status: CheckStatus::Unknown,
                detail: e.to_string(),
            }
        }
    };
    let banner = format!("{}{}", result.stdout, result.stderr);
    match extract_version(req.pattern, &banner) {
        Some(version) if version >= req.minimum => CheckReport {
            name: req.name.to_string(),
            status: CheckStatus::Ok,
            detail: format!("{}.{}", version.0, version.1),
        },
        Some(version) => CheckReport {
            name: req.name.to_string(),
            status: CheckStatus::Outdated,
            detail: format!(
                "{}.{} found, {}.{} or newer required ({})",
                version.0, version.1, req.minimum.0, req.minimum.1, req.help
            ),
        },
        None => CheckReport {
            name: req.name.to_string(),
            status: CheckStatus::Unknown,
            detail: banner.lines().next().unwrap_or("no output").to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::ScriptedRunner;

    fn requirement(name: &str) -> &'static Requirement {
        REQUIREMENTS.iter().find(|r| r.name == name).unwrap()
    }

    fn terraform_req(minimum: (u32, u32)) -> Requirement {
        Requirement {
            minimum,
            ..*requirement("terraform")
        }
    }

    #[test]
    fn each_pattern_reads_its_own_banner() {
        assert_eq!(
            extract_version(
                requirement("terraform").pattern,
                "Terraform v1.7.5\non linux_amd64"
            ),
            Some((1, 7))
        );
        assert_eq!(
            extract_version(requirement("kubectl").pattern, "Client Version: v1.29.2"),
            Some((1, 29))
        );
        assert_eq!(
            extract_version(
                requirement("aws").pattern,
                "aws-cli/2.15.30 Python/3.11.8 Linux"
            ),
            Some((2, 15))
        );
    }

    #[test]
    fn patterns_do_not_match_foreign_banners() {
        assert_eq!(
            extract_version(requirement("terraform").pattern, "aws-cli/2.15.30"),
            None
        );
        assert_eq!(extract_version(requirement("aws").pattern, "v2.15.30"), None);
    }

    #[test]
    fn current_version_passes() {
        let runner = ScriptedRunner::new();
        runner.push_ok("Terraform v1.7.5");
        let report = probe_version(&runner, &terraform_req((1, 0)));
        assert_eq!(report.status, CheckStatus::Ok);
        assert_eq!(report.detail, "1.7");
    }

    #[test]
    fn old_version_is_flagged_with_the_install_hint() {
        let runner = ScriptedRunner::new();
        runner.push_ok("Terraform v0.12.31");
        let report = probe_version(&runner, &terraform_req((1, 0)));
        assert_eq!(report.status, CheckStatus::Outdated);
        assert!(report.detail.contains("1.0 or newer required"));
        assert!(report.detail.contains("developer.hashicorp.com"));
    }

    #[test]
    fn stderr_banner_is_read_too() {
        let runner = ScriptedRunner::new();
        runner.push_exit(0, "", "aws-cli/2.15.30 Python/3.11.8");
        let report = probe_version(&runner, requirement("aws"));
        assert_eq!(report.status, CheckStatus::Ok);
    }

    #[test]
    fn unrecognized_banner_is_unknown_not_fatal() {
        let runner = ScriptedRunner::new();
        runner.push_ok("development build");
        let report = probe_version(&runner, &terraform_req((1, 0)));
        assert_eq!(report.status, CheckStatus::Unknown);
        assert_eq!(report.detail, "development build");
    }

    #[test]
    fn ensure_present_reports_the_missing_tool_by_name() {
        let err = ensure_present(&["hoist-test-definitely-missing-tool"]).unwrap_err();
        match err {
            HoistError::MissingExecutable(name) => {
                assert_eq!(name, "hoist-test-definitely-missing-tool")
            }
            other => panic!("expected MissingExecutable, got {other:?}"),
        }
    }
}
