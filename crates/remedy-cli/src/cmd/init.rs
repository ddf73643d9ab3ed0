use anyhow::Context;
use remedy_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    let project_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());

    println!("Initializing remedy in: {}", root.display());

    let dirs = [paths::REMEDY_DIR, paths::SESSIONS_DIR];
    for dir in dirs {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    let config_path = paths::config_path(root);
    if !config_path.exists() {
        let cfg = Config::new(&project_name);
        cfg.save(root).context("failed to write config.yaml")?;
        println!("  created: .remedy/config.yaml");
        println!("\nNext: set analysis.command and tests.command in .remedy/config.yaml");
    } else {
        println!("  exists:  .remedy/config.yaml");
    }

    Ok(())
}
