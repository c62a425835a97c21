use crate::output::print_json;
use anyhow::Context;
use std::path::Path;
use tap_core::config::Config;
use tap_core::{io, paths};

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    io::ensure_dir(&paths::tap_dir(root)).context("failed to create .tap/")?;

    let config_path = paths::config_path(root);
    let created = !config_path.exists();
    if created {
        Config::default()
            .save(root)
            .context("failed to write default config")?;
    }

    if json {
        print_json(&serde_json::json!({
            "root": root.display().to_string(),
            "config": config_path.display().to_string(),
            "created": created,
        }))?;
    } else if created {
        println!("Initialized {} in {}", paths::TAP_DIR, root.display());
    } else {
        println!("Already initialized: {}", config_path.display());
    }
    Ok(())
}
