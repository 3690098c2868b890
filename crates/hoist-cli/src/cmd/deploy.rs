use crate::output::print_json;
use anyhow::Context;
use hoist_core::{
    aws::Aws,
    config::{self, Config},
    gate::{Confirm, ConfirmationGate, ConfirmationStyle},
    kubernetes::Kubernetes,
    paths, requirements,
    runner::{CommandRunner, SystemRunner},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub fn run(
    root: &Path,
    object: Option<&str>,
    manifests: &[PathBuf],
    service: Option<&str>,
    port: u16,
    force: bool,
    json: bool,
) -> anyhow::Result<()> {
    requirements::ensure_present(&["kubectl", "aws"])?;

    let env = config::active_env(root)?;
    let cfg = Config::load(root).context("failed to load config")?;
    crate::cmd::infra::warn_and_fail_on_errors(&cfg)?;

    let manifests = resolve_manifests(root, manifests)?;

    let mut gate = ConfirmationGate::interactive();
    gate.confirm("a deploy", &env, ConfirmationStyle::Soft, force)?;

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
    let aws = Aws::connect(runner.clone(), &cfg.aws.profile)
        .with_context(|| format!("could not resolve aws profile '{}'", cfg.aws.profile))?;
    let k8s = Kubernetes::connect(
        runner,
        cfg.cluster_name(),
        aws.profile(),
        aws.kubectl_env(),
        cfg.poll.poller(),
    )?;

    for manifest in &manifests {
        eprintln!("Applying manifests from: {}", manifest.display());
        k8s.apply_manifest(manifest)?;
    }

    let object = object
        .map(str::to_string)
        .unwrap_or_else(|| format!("ds/{}", cfg.project.name));
    eprintln!("Waiting for rollout of {object}...");
    k8s.wait_for_rollout(&object)?;

    let service = service
        .map(str::to_string)
        .unwrap_or_else(|| cfg.project.name.clone());
    eprintln!("Waiting for the load balancer of service/{service}...");
    let endpoint = k8s.wait_for_service_endpoint(&service)?;

    let url = format!("http://{endpoint}:{port}");
    if json {
        print_json(&serde_json::json!({
            "object": object,
            "service": service,
            "endpoint": endpoint,
            "url": url,
        }))?;
        return Ok(());
    }
    println!("\nRollout complete. Service available at:");
    println!("  {url}");
    Ok(())
}

/// Explicit `--manifest` paths, or the whole deploy/ directory when none
/// were given. Everything is checked up front so a typo fails before any
/// manifest is applied.
fn resolve_manifests(root: &Path, manifests: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    if manifests.is_empty() {
        let dir = paths::deploy_dir(root);
        if !dir.is_dir() {
            anyhow::bail!("no deploy manifests at {}", dir.display());
        }
        return Ok(vec![dir]);
    }
    for manifest in manifests {
        if !manifest.exists() {
            anyhow::bail!("no manifest at {}", manifest.display());
        }
    }
    Ok(manifests.to_vec())
}
