use anyhow::{Context, Result};

use crate::app::App;
use crate::render::terminal;
use crate::OutputFormat;

pub async fn run_add(
    app: &App,
    input: &str,
    out: &str,
    src: Option<&str>,
    dst: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let config = app.session.config();
    let src = src.unwrap_or(config.default_src.as_str());
    let dst = dst.unwrap_or(config.default_dst.as_str());

    let favorite = app
        .session
        .add_favorite(input, src, dst, out)
        .await
        .context("Failed to save favorite")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&favorite)?),
        OutputFormat::Plain => println!("Saved."),
    }

    Ok(())
}

pub fn run_list(app: &App, format: &OutputFormat) -> Result<()> {
    let favorites = app.session.favorites().context("Failed to read favorites")?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&favorites)?);
        }
        OutputFormat::Plain => {
            if favorites.is_empty() {
                println!("No favorites yet.");
                return Ok(());
            }

            for (i, favorite) in favorites.iter().enumerate() {
                println!(
                    "{:>3}  {}  {:<30}  {}",
                    i,
                    favorite.ts.format("%Y-%m-%d"),
                    terminal::truncate(&favorite.input, 30),
                    terminal::truncate(&favorite.out, 40)
                );
            }
        }
    }

    Ok(())
}

pub async fn run_rm(app: &App, index: usize, format: &OutputFormat) -> Result<()> {
    let removed = app
        .session
        .remove_favorite(index)
        .await
        .context("Failed to remove favorite")?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&removed)?);
        }
        OutputFormat::Plain => match removed {
            Some(favorite) => println!("Removed \"{}\"", favorite.input),
            None => println!("No favorite at index {}", index),
        },
    }

    Ok(())
}
