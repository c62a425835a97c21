use crate::output::{print_json, print_table};
use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Subcommand;
use std::path::Path;
use std::time::Duration;
use tap_core::config::Config;
use tap_core::{duration, ActionRecord, ActionService};

#[derive(Subcommand)]
pub enum ActionSubcommand {
    /// List stored actions, newest first
    List,
    /// Show one stored action
    Show { action_id: String },
    /// Fail actions left ACTIVE by an interrupted server
    Recover {
        /// Only touch actions started at least this many seconds ago
        /// (default: actions.recovery_max_age_secs)
        #[arg(long)]
        max_age_secs: Option<u64>,
    },
    /// List terminal actions past their release_after window
    ///
    /// Deleting an action keeps its `request/<request_id>` entry so a retried
    /// run is answered with "not found" instead of running again. Those
    /// entries are never removed and grow with the number of distinct
    /// request ids.
    Sweep {
        /// Delete the expired actions instead of only listing them
        #[arg(long)]
        delete: bool,
    },
}

pub fn run(root: &Path, subcmd: ActionSubcommand, json: bool) -> anyhow::Result<()> {
    let cfg = Config::load(root).context("failed to load config")?;
    let service = super::build_service(&cfg, super::open_store(root, &cfg)?)?;

    match subcmd {
        ActionSubcommand::List => list(&service, json),
        ActionSubcommand::Show { action_id } => show(&service, &action_id, json),
        ActionSubcommand::Recover { max_age_secs } => {
            let max_age = max_age_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| cfg.recovery_max_age());
            recover(&service, max_age, json)
        }
        ActionSubcommand::Sweep { delete } => sweep(&service, delete, json),
    }
}

fn list(service: &ActionService, json: bool) -> anyhow::Result<()> {
    let records = service.list_records()?;
    if json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No actions.");
        return Ok(());
    }
    print_records(&records);
    Ok(())
}

fn show(service: &ActionService, action_id: &str, json: bool) -> anyhow::Result<()> {
    let record = service
        .find(action_id)?
        .with_context(|| format!("action '{action_id}' not found"))?;

    if json {
        return print_json(&record);
    }

    println!("Action:        {}", record.action_id);
    println!("Request:       {}", record.request_id);
    println!("Status:        {} ({})", record.status, record.display_status);
    println!("Creator:       {}", record.creator_id);
    println!("Started:       {}", timestamp(&record.start_time));
    if let Some(done) = &record.completion_time {
        println!("Completed:     {}", timestamp(done));
    }
    println!("Release after: {}", duration::format(record.release_after));
    if let Some(label) = &record.label {
        println!("Label:         {label}");
    }
    if !record.monitor_by.is_empty() {
        println!("Monitor by:    {}", join(&record.monitor_by));
    }
    if !record.manage_by.is_empty() {
        println!("Manage by:     {}", join(&record.manage_by));
    }
    if !record.details.is_null() {
        println!("Details:\n{}", serde_json::to_string_pretty(&record.details)?);
    }
    Ok(())
}

fn recover(service: &ActionService, max_age: Duration, json: bool) -> anyhow::Result<()> {
    let recovered = service.recover_stale(max_age)?;
    if json {
        print_json(&serde_json::json!({ "recovered": recovered }))?;
    } else {
        println!("Recovered {recovered} stale action(s).");
    }
    Ok(())
}

fn sweep(service: &ActionService, delete: bool, json: bool) -> anyhow::Result<()> {
    let expired = service.expired(Utc::now())?;

    let mut deleted = Vec::new();
    if delete {
        for record in &expired {
            if service.reclaim(&record.action_id)? {
                deleted.push(record.action_id.clone());
            }
        }
    }

    if json {
        return print_json(&serde_json::json!({
            "expired": expired,
            "deleted": deleted,
        }));
    }

    if expired.is_empty() {
        println!("No expired actions.");
        return Ok(());
    }
    print_records(&expired);
    if delete {
        println!("\nDeleted {} action(s).", deleted.len());
    }
    Ok(())
}

fn print_records(records: &[ActionRecord]) {
    let rows = records
        .iter()
        .map(|r| {
            vec![
                r.action_id.clone(),
                r.status.to_string(),
                r.creator_id.clone(),
                r.request_id.clone(),
                timestamp(&r.start_time),
                r.completion_time
                    .as_ref()
                    .map(timestamp)
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    print_table(
        &["ID", "STATUS", "CREATOR", "REQUEST", "STARTED", "COMPLETED"],
        rows,
    );
}

fn timestamp(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn join(set: &std::collections::BTreeSet<String>) -> String {
    set.iter().cloned().collect::<Vec<_>>().join(", ")
}
