use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::models::ExchangeRate;
use crate::record::PriceRecord;
use crate::storage::{rates_from_record_json, SaveOutcome, Sink};

const LATEST_SUFFIX: &str = "_latest.json";

/// Pretty-printed JSON files under the data directory.
pub struct LocalJsonSink {
    dir: PathBuf,
    enabled: bool,
}

impl LocalJsonSink {
    pub fn new(dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            dir: dir.into(),
            enabled,
        }
    }

    fn write(&self, path: &Path, body: &str) -> Result<()> {
        fs::write(path, body).with_context(|| format!("Failed to write {}", path.display()))
    }
}

#[async_trait]
impl Sink for LocalJsonSink {
    fn name(&self) -> &'static str {
        "local"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn save(&self, record: &PriceRecord) -> Result<SaveOutcome> {
        if !self.enabled {
            return Ok(SaveOutcome::Skipped);
        }

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create data directory {}", self.dir.display()))?;

        let body = serde_json::to_string_pretty(record)?;
        let stamped = self.dir.join(format!(
            "{}_{}.json",
            record.product_id,
            record.scraped_at.format("%Y%m%d_%H%M%S")
        ));
        let latest = self.dir.join(format!("{}{}", record.product_id, LATEST_SUFFIX));

        self.write(&stamped, &body)?;
        self.write(&latest, &body)?;

        info!("Saved {} to {}", record.product_id, stamped.display());
        Ok(SaveOutcome::Saved)
    }

    async fn latest_rates(&self) -> Result<Option<Vec<ExchangeRate>>> {
        if !self.enabled || !self.dir.exists() {
            return Ok(None);
        }

        let mut newest: Option<PriceRecord> = None;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_latest = path
                .file_name()
                .map(|n| n.to_string_lossy().ends_with(LATEST_SUFFIX))
                .unwrap_or(false);
            if !is_latest {
                continue;
            }

            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<PriceRecord>(&content) {
                Ok(record) => {
                    if newest.as_ref().map_or(true, |n| record.scraped_at > n.scraped_at) {
                        newest = Some(record);
                    }
                }
                Err(e) => warn!("Skipping unreadable record {}: {}", path.display(), e),
            }
        }

        Ok(newest.and_then(|record| rates_from_record_json(&record.to_json(), self.name())))
    }
}
