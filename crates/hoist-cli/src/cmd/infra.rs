use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use hoist_core::{
    aws::Aws,
    config::{self, Config, WarnLevel},
    gate::{Confirm, ConfirmationGate, ConfirmationStyle},
    io,
    kubernetes::Kubernetes,
    paths, requirements,
    runner::{CommandRunner, SystemRunner},
    terraform::{Operation, Outcome, OutputValue, Terraform},
    HoistError,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum InfraSubcommand {
    /// Plan the module, review, and apply
    Apply {
        /// Module path relative to terraform/ (default: the root module)
        module: Option<String>,

        /// Skip confirmation prompts
        #[arg(long)]
        force: bool,
    },

    /// Tear down everything the module manages
    Destroy {
        /// Module path relative to terraform/ (default: the root module)
        module: Option<String>,

        /// Skip the typed confirmation (destroy must still be enabled)
        #[arg(long)]
        force: bool,
    },

    /// Show the module's outputs without changing anything
    Status {
        /// Module path relative to terraform/ (default: the root module)
        module: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: InfraSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        InfraSubcommand::Apply { module, force } => apply(root, module.as_deref(), force, json),
        InfraSubcommand::Destroy { module, force } => destroy(root, module.as_deref(), force),
        InfraSubcommand::Status { module } => status(root, module.as_deref(), json),
    }
}

// ---------------------------------------------------------------------------
// Session setup
// ---------------------------------------------------------------------------

struct Session {
    env: String,
    cfg: Config,
    runner: Arc<dyn CommandRunner>,
    aws: Aws,
    terraform: Terraform,
}

/// Everything an infra command needs: tools present, config loaded, AWS
/// identity resolved, state bucket in place, terraform pointed at it.
fn connect(root: &Path, tools: &[&str], strict: bool) -> anyhow::Result<Session> {
    requirements::ensure_present(tools)?;

    let env = config::active_env(root)?;
    let cfg = Config::load(root).context("failed to load config")?;
    if strict {
        warn_and_fail_on_errors(&cfg)?;
    }

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
    let aws = Aws::connect(runner.clone(), &cfg.aws.profile)
        .with_context(|| format!("could not resolve aws profile '{}'", cfg.aws.profile))?;
    let bucket = aws.state_bucket(cfg.state_bucket_prefix());
    aws.ensure_state_bucket(&bucket)
        .with_context(|| format!("could not ensure state bucket '{bucket}'"))?;

    let terraform = Terraform::new(
        runner.clone(),
        paths::terraform_root(root),
        &env,
        bucket,
        aws.region(),
        aws.terraform_env(),
    );

    Ok(Session {
        env,
        cfg,
        runner,
        aws,
        terraform,
    })
}

/// Print validation findings and refuse to run on error-level ones.
pub(crate) fn warn_and_fail_on_errors(cfg: &Config) -> anyhow::Result<()> {
    let warnings = cfg.validate();
    for w in &warnings {
        let prefix = match w.level {
            WarnLevel::Warning => "warning",
            WarnLevel::Error => "error",
        };
        eprintln!("[{prefix}] {}", w.message);
    }
    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("the active config has errors; see 'hoist config validate'");
    }
    Ok(())
}

fn module_path(root: &Path, module: Option<&str>) -> anyhow::Result<PathBuf> {
    let tf_root = paths::terraform_root(root);
    let path = match module {
        Some(sub) => tf_root.join(sub),
        None => tf_root,
    };
    if !path.is_dir() {
        anyhow::bail!("no terraform module at {}", path.display());
    }
    Ok(path)
}

/// The cluster variables every module run receives.
fn cluster_vars(cfg: &Config) -> BTreeMap<String, String> {
    let size = &cfg.aws.cluster.size;
    BTreeMap::from([
        ("cluster_name".to_string(), cfg.cluster_name().to_string()),
        ("cluster_min_size".to_string(), size.min.to_string()),
        ("cluster_max_size".to_string(), size.max.to_string()),
        (
            "cluster_desired_size".to_string(),
            size.desired.to_string(),
        ),
        (
            "cluster_node_instance_type".to_string(),
            cfg.aws.cluster.node_instance_type.clone(),
        ),
    ])
}

fn kubernetes(session: &Session) -> hoist_core::Result<Kubernetes> {
    Kubernetes::connect(
        session.runner.clone(),
        session.cfg.cluster_name(),
        session.aws.profile(),
        session.aws.kubectl_env(),
        session.cfg.poll.poller(),
    )
}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

fn apply(root: &Path, module: Option<&str>, force: bool, json: bool) -> anyhow::Result<()> {
    let session = connect(root, &["terraform", "kubectl", "aws"], true)?;
    let module = module_path(root, module)?;

    eprintln!("Applying infrastructure in: {}", module.display());
    let mut gate = ConfirmationGate::interactive();
    let outcome = session.terraform.execute(
        Operation::Apply,
        &module,
        &cluster_vars(&session.cfg),
        &mut gate,
        force,
    )?;

    sync_cluster_auth(root, &session, &outcome)?;

    if json {
        print_json(&outcome.outputs)?;
        return Ok(());
    }
    print_outputs(&outcome.outputs);
    if outcome.changed {
        println!("\nApply complete.");
    } else {
        println!("\nNothing to change.");
    }
    Ok(())
}

/// A fresh cluster publishes the aws-auth ConfigMap it needs as a terraform
/// output. Apply it right away so the nodes can join.
fn sync_cluster_auth(root: &Path, session: &Session, outcome: &Outcome) -> anyhow::Result<()> {
    let Some(config_map) = outcome.string_output("config_map_aws_auth") else {
        return Ok(());
    };

    let path = paths::scratch_dir(&paths::terraform_root(root)).join("config_map_aws_auth.yml");
    io::atomic_write(&path, config_map.as_bytes())?;

    let result = kubernetes(session).and_then(|k8s| k8s.apply_manifest(&path));
    // The rendered manifest is scratch either way.
    let _ = std::fs::remove_file(&path);
    result?;

    eprintln!(
        "Applied the aws-auth ConfigMap to '{}'.",
        session.cfg.cluster_name()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// destroy
// ---------------------------------------------------------------------------

fn destroy(root: &Path, module: Option<&str>, force: bool) -> anyhow::Result<()> {
    let session = connect(root, &["terraform", "kubectl", "aws"], true)?;
    let module = module_path(root, module)?;

    // The environment must allow destroys at all before --force is even
    // considered.
    if !session.cfg.destroy.enabled {
        return Err(HoistError::DestroyDisabled(session.env.clone()).into());
    }

    let mut gate = ConfirmationGate::interactive();
    gate.confirm("destroy", &session.env, ConfirmationStyle::Strong, force)?;

    remove_service(root, &session);

    eprintln!("Destroying infrastructure in: {}", module.display());
    session.terraform.execute(
        Operation::Destroy,
        &module,
        &cluster_vars(&session.cfg),
        &mut gate,
        force,
    )?;

    let bucket = session.aws.state_bucket(session.cfg.state_bucket_prefix());
    println!("\nDestroy complete. Left in place, remove manually when done:");
    println!("  - state bucket: {bucket}");
    println!(
        "  - any container registries for '{}'",
        session.cfg.project.name
    );
    Ok(())
}

/// Delete the service before the cluster goes away, so its cloud load
/// balancer is released instead of orphaned. Failure here never blocks the
/// destroy itself.
fn remove_service(root: &Path, session: &Session) {
    let manifest = paths::service_manifest(root);
    if !manifest.exists() {
        return;
    }
    let removed = kubernetes(session).and_then(|k8s| k8s.delete_manifest(&manifest));
    if let Err(e) = removed {
        warn!(error = %e, "could not delete the service ahead of destroy; continuing");
    }
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

fn status(root: &Path, module: Option<&str>, json: bool) -> anyhow::Result<()> {
    let session = connect(root, &["terraform", "aws"], false)?;
    let module = module_path(root, module)?;

    // With --json, skip the state dump and keep stdout machine-readable.
    if json {
        let outputs = session.terraform.outputs(&module)?;
        return print_json(&outputs);
    }

    let mut gate = ConfirmationGate::interactive();
    let outcome = session.terraform.execute(
        Operation::Show,
        &module,
        &BTreeMap::new(),
        &mut gate,
        false,
    )?;

    if outcome.outputs.is_empty() {
        println!("No outputs.");
    } else {
        println!();
        print_outputs(&outcome.outputs);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Output rendering
// ---------------------------------------------------------------------------

fn print_outputs(outputs: &BTreeMap<String, OutputValue>) {
    if outputs.is_empty() {
        return;
    }
    let rows = outputs
        .iter()
        .map(|(name, output)| {
            let value = if output.sensitive {
                "<sensitive>".to_string()
            } else if let Some(s) = output.value.as_str() {
                let mut lines = s.lines();
                let first = lines.next().unwrap_or("").to_string();
                if lines.next().is_some() {
                    format!("{first} ...")
                } else {
                    first
                }
            } else {
                output.value.to_string()
            };
            vec![name.clone(), value]
        })
        .collect();
    print_table(&["OUTPUT", "VALUE"], rows);
}
