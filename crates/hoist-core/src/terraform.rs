//! Terraform orchestration: backend init, plan review, apply and destroy.
//!
//! Every run re-initializes the S3 backend for the target module, so state
//! always lives at `s3://<bucket>/<key>` where the key is the module's path
//! relative to the terraform root. Mutating runs go through a plan artifact
//! that is removed on every exit path.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::gate::{Confirm, ConfirmationStyle};
use crate::io;
use crate::paths;
use crate::runner::{CommandResult, CommandRunner, ExecOptions};

/// State key for the root module itself.
const ROOT_STATE_KEY: &str = "default";

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Plan, review, apply, then read outputs.
    Apply,
    /// Tear down without planning. Callers gate this before we get here.
    Destroy,
    /// Print the current state, then read outputs. Touches nothing.
    Show,
}

impl Operation {
    fn mutates(self) -> bool {
        !matches!(self, Operation::Show)
    }

    fn fetches_outputs(self) -> bool {
        matches!(self, Operation::Apply | Operation::Show)
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// One entry of `terraform output -json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputValue {
    pub value: serde_json::Value,
    #[serde(rename = "type", default)]
    pub value_type: serde_json::Value,
    #[serde(default)]
    pub sensitive: bool,
}

/// What an execution left behind.
#[derive(Debug, Default)]
pub struct Outcome {
    /// False when the plan reported no changes (or nothing was planned).
    pub changed: bool,
    pub outputs: BTreeMap<String, OutputValue>,
    /// Result of the final tool invocation (apply, destroy or show).
    pub raw: CommandResult,
}

impl Outcome {
    pub fn string_output(&self, name: &str) -> Option<&str> {
        self.outputs.get(name).and_then(|o| o.value.as_str())
    }
}

// ---------------------------------------------------------------------------
// State key derivation
// ---------------------------------------------------------------------------

/// Backend state key for a module: its path relative to the terraform root,
/// or `default` for the root itself. A module outside the root keeps its full
/// path so distinct modules can never collide on a key.
pub fn state_key(terraform_root: &Path, module: &Path) -> String {
    match module.strip_prefix(terraform_root) {
        Ok(rel) if rel.as_os_str().is_empty() => ROOT_STATE_KEY.to_string(),
        Ok(rel) => rel.to_string_lossy().into_owned(),
        Err(_) => module.to_string_lossy().into_owned(),
    }
}

// ---------------------------------------------------------------------------
// Plan artifact
// ---------------------------------------------------------------------------

/// A saved plan file in the scratch directory. Removed on drop so rejected
/// and failed runs never leave a stale plan behind.
struct PlanArtifact {
    path: PathBuf,
}

impl PlanArtifact {
    fn create(scratch: &Path) -> Result<Self> {
        io::ensure_dir(scratch)?;
        let stamp = chrono::Utc::now().timestamp_millis();
        Ok(Self {
            path: scratch.join(format!("{stamp}.tfplan")),
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PlanArtifact {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(path = %self.path.display(), error = %e, "could not remove plan artifact");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Terraform
// ---------------------------------------------------------------------------

pub struct Terraform {
    runner: Arc<dyn CommandRunner>,
    /// Directory all module paths and state keys are relative to.
    root: PathBuf,
    /// Environment name, used when asking for confirmation.
    scope: String,
    state_bucket: String,
    region: String,
    tool_env: Vec<(String, String)>,
}

impl Terraform {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        root: PathBuf,
        scope: impl Into<String>,
        state_bucket: impl Into<String>,
        region: impl Into<String>,
        tool_env: Vec<(String, String)>,
    ) -> Self {
        Self {
            runner,
            root,
            scope: scope.into(),
            state_bucket: state_bucket.into(),
            region: region.into(),
            tool_env,
        }
    }

    /// Run `op` against `module`. Apply plans first, shows the plan to the
    /// operator, and asks for confirmation unless the plan is a no-op or
    /// `forced` is set. Destroy is expected to be gated by the caller.
    pub fn execute(
        &self,
        op: Operation,
        module: &Path,
        vars: &BTreeMap<String, String>,
        gate: &mut dyn Confirm,
        forced: bool,
    ) -> Result<Outcome> {
        self.init(module)?;

        let mut outcome = Outcome::default();
        match op {
            Operation::Apply => {
                let artifact = PlanArtifact::create(&paths::scratch_dir(&self.root))?;
                let changed = self.plan(module, vars, artifact.path())?;
                if changed {
                    gate.confirm("an apply", &self.scope, ConfirmationStyle::Soft, forced)?;
                } else {
                    info!(module = %module.display(), "plan reported no changes");
                }
                outcome.raw = self.apply(module, artifact.path())?;
                outcome.changed = changed;
            }
            Operation::Destroy => {
                outcome.raw = self.destroy(module, vars)?;
                outcome.changed = true;
            }
            Operation::Show => {
                outcome.raw = self
                    .runner
                    .run("terraform", &["show"], &self.module_opts(module))?;
            }
        }

        if op.fetches_outputs() {
            outcome.outputs = self.read_outputs(module)?;
        }
        if op.mutates() {
            info!(module = %module.display(), ?op, "terraform run finished");
        }
        Ok(outcome)
    }

    /// Initialize the backend and read outputs, skipping the state dump.
    /// This is the quiet path behind `--json` listings.
    pub fn outputs(&self, module: &Path) -> Result<BTreeMap<String, OutputValue>> {
        self.init(module)?;
        self.read_outputs(module)
    }

    fn module_opts(&self, module: &Path) -> ExecOptions {
        ExecOptions::streamed()
            .with_cwd(module)
            .with_env(self.tool_env.clone())
    }

    fn init(&self, module: &Path) -> Result<()> {
        let bucket = format!("-backend-config=bucket={}", self.state_bucket);
        let region = format!("-backend-config=region={}", self.region);
        let key = format!("-backend-config=key={}", state_key(&self.root, module));
        debug!(module = %module.display(), %bucket, %key, "initializing backend");
        self.runner.run(
            "terraform",
            &["init", "-input=false", "-reconfigure", &bucket, &region, &key],
            &self.module_opts(module),
        )?;
        Ok(())
    }

    /// Save a plan to `artifact`. Returns whether the plan contains changes.
    fn plan(
        &self,
        module: &Path,
        vars: &BTreeMap<String, String>,
        artifact: &Path,
    ) -> Result<bool> {
        let mut args = vec![
            "plan".to_string(),
            "-input=false".to_string(),
            format!("-out={}", artifact.display()),
        ];
        push_vars(&mut args, vars);
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        let result = self
            .runner
            .run("terraform", &argv, &self.module_opts(module))?;
        Ok(!result.stdout.contains("No changes"))
    }

    fn apply(&self, module: &Path, artifact: &Path) -> Result<CommandResult> {
        let plan_file = artifact.display().to_string();
        self.runner.run(
            "terraform",
            &["apply", "-input=false", &plan_file],
            &self.module_opts(module),
        )
    }

    fn destroy(&self, module: &Path, vars: &BTreeMap<String, String>) -> Result<CommandResult> {
        let mut args = vec![
            "destroy".to_string(),
            "-input=false".to_string(),
            "-auto-approve".to_string(),
        ];
        push_vars(&mut args, vars);
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner
            .run("terraform", &argv, &self.module_opts(module))
    }

    /// `terraform output -json`, parsed. A failure here is fatal: an apply
    /// whose outputs cannot be read is not a success.
    fn read_outputs(&self, module: &Path) -> Result<BTreeMap<String, OutputValue>> {
        let opts = ExecOptions::captured()
            .with_cwd(module)
            .with_env(self.tool_env.clone());
        let result = self.runner.run("terraform", &["output", "-json"], &opts)?;
        let outputs = serde_json::from_str(&result.stdout)?;
        Ok(outputs)
    }
}

fn push_vars(args: &mut Vec<String>, vars: &BTreeMap<String, String>) {
    for (key, value) in vars {
        args.push("-var".to_string());
        args.push(format!("{key}={value}"));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
