use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::models::{Country, Vendor};

/// Writes the fetched HTML of each storefront page to disk when debugging.
#[derive(Debug, Clone)]
pub struct CaptureWriter {
    dir: PathBuf,
}

impl CaptureWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create captures directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the written path, or `None` if the write failed.
    pub fn save(&self, vendor: Vendor, country: Country, html: &str, at: DateTime<Utc>) -> Option<String> {
        let filename = format!(
            "{}_{}_{}.html",
            vendor.key(),
            country.code().to_lowercase(),
            at.format("%Y%m%d_%H%M%S")
        );
        let path = self.dir.join(filename);

        match fs::write(&path, html) {
            Ok(()) => {
                info!("Page capture saved to {}", path.display());
                Some(path.display().to_string())
            }
            Err(e) => {
                warn!("Could not save page capture {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_save_writes_named_file() {
        let dir = std::env::temp_dir().join(format!("price-scraper-captures-{}", std::process::id()));
        let writer = CaptureWriter::new(&dir).unwrap();

        let at = Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap();
        let saved = writer.save(Vendor::Adidas, Country::US, "<html>$100</html>", at).unwrap();
        let name = Path::new(&saved).file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(name, "adidas_us_20261016_093000.html");
        assert_eq!(fs::read_to_string(&saved).unwrap(), "<html>$100</html>");

        fs::remove_dir_all(&dir).ok();
    }
}
