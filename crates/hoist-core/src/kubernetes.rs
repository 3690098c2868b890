//! Kubernetes session against an EKS cluster: manifest apply/delete and the
//! waits that follow a deploy (rollout completion, load balancer hostname).

use std::path::Path;
use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;
use tracing::info;

use crate::error::Result;
use crate::poller::Poller;
use crate::runner::{CommandRunner, ExecOptions};

static ROLLED_OUT_RE: OnceLock<Regex> = OnceLock::new();

fn rolled_out_re() -> &'static Regex {
    ROLLED_OUT_RE.get_or_init(|| Regex::new(r"successfully rolled out").unwrap())
}

pub struct Kubernetes {
    runner: Arc<dyn CommandRunner>,
    tool_env: Vec<(String, String)>,
    poller: Poller,
}

impl Kubernetes {
    /// Point the local kubeconfig at `cluster` and return a session. kubectl
    /// authenticates through the aws CLI, so every call carries the profile
    /// in its environment.
    pub fn connect(
        runner: Arc<dyn CommandRunner>,
        cluster: &str,
        profile: &str,
        tool_env: Vec<(String, String)>,
        poller: Poller,
    ) -> Result<Self> {
        runner.run(
            "aws",
            &[
                "eks",
                "update-kubeconfig",
                "--name",
                cluster,
                "--profile",
                profile,
            ],
            &ExecOptions::streamed().with_env(tool_env.clone()),
        )?;
        Ok(Self {
            runner,
            tool_env,
            poller,
        })
    }

    fn opts(&self) -> ExecOptions {
        ExecOptions::streamed().with_env(self.tool_env.clone())
    }

    /// `kubectl apply -f <target>`. The target may be a file or a directory
    /// of manifests.
    pub fn apply_manifest(&self, target: &Path) -> Result<()> {
        let target = target.display().to_string();
        self.runner
            .run("kubectl", &["apply", "-f", &target], &self.opts())?;
        Ok(())
    }

    /// `kubectl delete -f <target>`.
    pub fn delete_manifest(&self, target: &Path) -> Result<()> {
        let target = target.display().to_string();
        self.runner
            .run("kubectl", &["delete", "-f", &target], &self.opts())?;
        Ok(())
    }

    /// Poll `kubectl rollout status` until it reports the object rolled out.
    pub fn wait_for_rollout(&self, object: &str) -> Result<()> {
        let probe_opts = ExecOptions::probe().with_env(self.tool_env.clone());
        self.poller.poll_until(
            &format!("rollout of {object}"),
            || {
                let result =
                    self.runner
                        .run("kubectl", &["rollout", "status", object], &probe_opts)?;
                Ok(result.stdout)
            },
            |out| rolled_out_re().is_match(out),
        )?;
        info!(object, "rollout complete");
        Ok(())
    }

    /// Poll the service until its load balancer publishes a hostname, and
    /// return it.
    pub fn wait_for_service_endpoint(&self, service: &str) -> Result<String> {
        let target = format!("service/{service}");
        let probe_opts = ExecOptions::probe().with_env(self.tool_env.clone());
        let hostname = self.poller.poll_until(
            &format!("load balancer of {target}"),
            || {
                let result =
                    self.runner
                        .run("kubectl", &["get", &target, "-o", "json"], &probe_opts)?;
                if !result.success() {
                    // Not created yet; an empty observation keeps the loop going.
                    return Ok(String::new());
                }
                let doc: serde_json::Value = serde_json::from_str(&result.stdout)?;
                Ok(service_hostname(&doc).unwrap_or_default())
            },
            |host| !host.is_empty(),
        )?;
        info!(service, %hostname, "load balancer provisioned");
        Ok(hostname)
    }
}

fn service_hostname(doc: &serde_json::Value) -> Option<String> {
    doc.pointer("/status/loadBalancer/ingress/0/hostname")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
