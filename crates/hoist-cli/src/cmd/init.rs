use anyhow::Context;
use hoist_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path, project: Option<&str>, force: bool) -> anyhow::Result<()> {
    let project_name = match project {
        Some(name) => name.to_string(),
        None => root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string()),
    };

    println!("Initializing hoist in: {}", root.display());

    // 1. Create the directory layout
    let dirs = [
        paths::HOIST_DIR,
        paths::ENVS_DIR,
        paths::TERRAFORM_DIR,
        paths::DEPLOY_DIR,
    ];
    for dir in dirs {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    // 2. Write the default environment config, kept as-is unless forced
    let env_path = paths::env_path(root, paths::DEFAULT_ENV);
    if force || !env_path.exists() {
        let existed = env_path.exists();
        let cfg = Config::new(&project_name);
        cfg.save(root, paths::DEFAULT_ENV)
            .context("failed to write the default environment config")?;
        if existed {
            println!("  reset:   .hoist/envs/default.yaml");
        } else {
            println!("  created: .hoist/envs/default.yaml");
        }
    } else {
        println!("  exists:  .hoist/envs/default.yaml");
    }

    // 3. Point the active-environment file at default if missing
    let active = paths::active_path(root);
    io::write_if_missing(&active, paths::DEFAULT_ENV.as_bytes())?;

    // 4. Keep plan artifacts and generated manifests out of version control
    io::ensure_gitignore_entry(root, "terraform/.tmp/")?;

    println!("\nhoist initialized for '{project_name}'.");
    println!("Next: hoist config validate && hoist infra apply");

    Ok(())
}
