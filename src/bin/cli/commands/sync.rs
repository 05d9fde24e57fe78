use anyhow::{Context, Result};

use crate::app::App;
use crate::OutputFormat;

pub async fn run_migrate(app: &App, key: Option<&str>, format: &OutputFormat) -> Result<()> {
    let report = app
        .session
        .migrate(key)
        .await
        .context("Failed to import legacy deck")?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Plain => {
            println!(
                "Scanned {}, imported {}, already present {}, unreadable {}",
                report.scanned, report.imported, report.skipped, report.invalid
            );
        }
    }

    Ok(())
}

pub async fn run_sync(app: &App, format: &OutputFormat) -> Result<()> {
    if !app.session.sync_enabled() {
        anyhow::bail!("Sync is not configured. Set [sync] enabled and base_url in config.toml");
    }

    let result = app.session.sync_now().await.context("Sync failed")?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Plain => {
            println!(
                "Pulled: {}",
                if result.keys_pulled.is_empty() { "-".to_string() } else { result.keys_pulled.join(", ") }
            );
            println!(
                "Pushed: {}",
                if result.keys_pushed.is_empty() { "-".to_string() } else { result.keys_pushed.join(", ") }
            );
            if !result.success() {
                println!("Failed: {}", result.keys_failed.join(", "));
            }
            println!("({} ms)", result.duration_ms);
        }
    }

    Ok(())
}
