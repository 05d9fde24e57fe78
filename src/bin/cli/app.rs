use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use lingualab::flashcards::{Card, CardId};
use lingualab::{AppConfig, Session};

/// Shared application state for CLI commands
pub struct App {
    pub session: Session,
}

impl App {
    /// Load the config, apply overrides and open the session
    pub async fn open(config_path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => AppConfig::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => match AppConfig::default_path() {
                Some(path) => AppConfig::load(&path).context("Failed to load config")?,
                None => AppConfig::default(),
            },
        };
        if data_dir.is_some() {
            config.data_dir = data_dir;
        }

        let session = Session::open(config)
            .await
            .context("Failed to open card store")?;

        let report = &session.startup().migration;
        if report.imported > 0 {
            eprintln!("Imported {} card(s) from the legacy deck.", report.imported);
        }

        Ok(Self { session })
    }

    /// Find a card by id (exact, then unique prefix)
    pub async fn find_card(&self, id: &str) -> Result<Card> {
        if let Some(card) = self
            .session
            .get(&CardId::from(id))
            .await
            .context("Failed to read card")?
        {
            return Ok(card);
        }

        let cards = self.session.all().await.context("Failed to list cards")?;
        let matches: Vec<&Card> = cards
            .iter()
            .filter(|c| c.id.as_str().starts_with(id))
            .collect();

        match matches.len() {
            0 => bail!("No card matching '{}'", id),
            1 => Ok(matches[0].clone()),
            _ => bail!(
                "Ambiguous card id '{}'. Matches:\n{}",
                id,
                matches
                    .iter()
                    .map(|c| format!("  - {}  {}", c.id, c.front))
                    .collect::<Vec<_>>()
                    .join("\n")
            ),
        }
    }
}
