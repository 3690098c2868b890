use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use hoist_core::config::{self, Config, WarnLevel};
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show the active environment's configuration
    Show,

    /// List the configured environments
    List,

    /// Switch the active environment
    Use {
        /// Environment name
        name: String,

        /// Create the environment from the active config if it doesn't exist
        #[arg(long)]
        create: bool,
    },

    /// Validate the active config for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::List => list(root, json),
        ConfigSubcommand::Use { name, create } => switch(root, &name, create),
        ConfigSubcommand::Validate => validate(root, json),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let env = config::active_env(root)?;
    let cfg = Config::load(root).context("failed to load config")?;

    if json {
        let value = serde_json::json!({
            "environment": env,
            "config": cfg,
        });
        print_json(&value)?;
        return Ok(());
    }

    println!("# environment: {env}");
    print!("{}", serde_yaml::to_string(&cfg)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let envs = config::list_envs(root)?;
    let active = config::active_env(root)?;

    if json {
        let value = serde_json::json!({
            "active": active,
            "environments": envs,
        });
        print_json(&value)?;
        return Ok(());
    }

    let rows = envs
        .iter()
        .map(|name| {
            let marker = if *name == active { "*" } else { "" };
            vec![marker.to_string(), name.clone()]
        })
        .collect();
    print_table(&["", "ENVIRONMENT"], rows);
    Ok(())
}

// ---------------------------------------------------------------------------
// use
// ---------------------------------------------------------------------------

fn switch(root: &Path, name: &str, create: bool) -> anyhow::Result<()> {
    if create && !hoist_core::paths::env_path(root, name).exists() {
        // Seed the new environment from whatever is active now.
        let template = Config::load(root).context("failed to load the active config")?;
        template
            .save(root, name)
            .with_context(|| format!("failed to create environment '{name}'"))?;
        println!("Created environment '{name}' from the active config.");
    }

    config::set_active_env(root, name)?;
    println!("Active environment: {name}");
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    let has_errors = warnings.iter().any(|w| w.level == WarnLevel::Error);
    if has_errors {
        anyhow::bail!("config validation found errors");
    }

    Ok(())
}
