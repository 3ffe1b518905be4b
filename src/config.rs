use ::config::builder::DefaultState;
use ::config::{ConfigBuilder, Environment, File, FileFormat};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;
use url::Url;

use crate::models::{Country, Vendor};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    pub products: Vec<ProductConfig>,
}

/// Runtime switches and endpoints, layered from defaults, `price_scraper.toml`
/// and the process environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub debug: bool,
    pub save_local: bool,
    pub save_to_supabase: bool,
    pub save_to_sqlite: bool,
    pub data_dir: PathBuf,
    pub screenshots_dir: PathBuf,
    pub sqlite_path: PathBuf,
    pub exchange_rate_api_url: String,
    pub user_agent: String,
    pub request_timeout_seconds: u64,
    pub max_retries: u32,
    pub log_format: String,
    pub run_interval_seconds: Option<u64>,
    pub supabase_url: Option<String>,
    pub supabase_service_role: Option<String>,
    pub supabase_key: Option<String>,
    pub revalidate_url: Option<String>,
    pub revalidate_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductConfig {
    pub id: String,
    pub name: String,
    pub vendor: Vendor,
    pub listings: Vec<ListingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingConfig {
    pub country: Country,
    pub url: String,
    /// Local-currency price used when the storefront cannot be read
    pub fallback_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupabaseKeyKind {
    ServiceRole,
    Anon,
}

#[derive(Debug, Clone)]
pub struct SupabaseCredentials {
    pub url: String,
    pub key: String,
    pub kind: SupabaseKeyKind,
}

impl Config {
    pub fn load() -> Result<Self> {
        let settings = Settings::load()?;
        Ok(Self::with_settings(settings))
    }

    pub fn with_settings(settings: Settings) -> Self {
        Config {
            settings,
            products: default_products(),
        }
    }
}

impl ProductConfig {
    pub fn listing(&self, country: Country) -> Option<&ListingConfig> {
        self.listings.iter().find(|l| l.country == country)
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_environment(Environment::default())
    }

    /// Defaults, then `price_scraper.toml`, then `env`.
    fn from_environment(env: Environment) -> Result<Self> {
        defaults()?
            .add_source(File::with_name("price_scraper").required(false))
            .add_source(env.try_parsing(true))
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn from_toml(toml: &str) -> Result<Self> {
        defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Service role key wins over the regular key when both are present.
    pub fn supabase_credentials(&self) -> Option<SupabaseCredentials> {
        let url = valid_url(&self.supabase_url)?;
        let (key, kind) = match (
            non_empty(&self.supabase_service_role),
            non_empty(&self.supabase_key),
        ) {
            (Some(key), _) => (key, SupabaseKeyKind::ServiceRole),
            (None, Some(key)) => (key, SupabaseKeyKind::Anon),
            (None, None) => return None,
        };

        Some(SupabaseCredentials {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            kind,
        })
    }

    pub fn revalidate_target(&self) -> Option<(&str, Option<&str>)> {
        valid_url(&self.revalidate_url).map(|url| (url, non_empty(&self.revalidate_secret)))
    }

    pub fn wants_json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// A configured endpoint that does not parse as an absolute URL counts as unset.
fn valid_url(value: &Option<String>) -> Option<&str> {
    let raw = non_empty(value)?;
    match Url::parse(raw) {
        Ok(_) => Some(raw),
        Err(e) => {
            warn!("Ignoring invalid URL {:?}: {}", raw, e);
            None
        }
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>> {
    Ok(::config::Config::builder()
        .set_default("debug", false)?
        .set_default("save_local", true)?
        .set_default("save_to_supabase", false)?
        .set_default("save_to_sqlite", false)?
        .set_default("data_dir", "data")?
        .set_default("screenshots_dir", "screenshots")?
        .set_default("sqlite_path", "price_scraper.db")?
        .set_default("exchange_rate_api_url", "https://dolarapi.com/v1/dolares")?
        .set_default("user_agent", DEFAULT_USER_AGENT)?
        .set_default("request_timeout_seconds", 30_i64)?
        .set_default("max_retries", 2_i64)?
        .set_default("log_format", "text")?)
}

fn default_products() -> Vec<ProductConfig> {
    vec![
        ProductConfig {
            id: "air_force_1".to_string(),
            name: "Nike Air Force 1".to_string(),
            vendor: Vendor::Nike,
            listings: vec![
                ListingConfig {
                    country: Country::AR,
                    url: "https://www.nike.com.ar/nike-air-force-1--07-cw2288-111/p".to_string(),
                    fallback_price: 199_999.0,
                },
                ListingConfig {
                    country: Country::US,
                    url: "https://www.nike.com/t/air-force-1-07-mens-shoes-5QFp5Z/CW2288-111".to_string(),
                    fallback_price: 115.0,
                },
            ],
        },
        ProductConfig {
            id: "argentina_jersey".to_string(),
            name: "Argentina Anniversary Jersey".to_string(),
            vendor: Vendor::Adidas,
            listings: vec![
                ListingConfig {
                    country: Country::AR,
                    url: "https://www.adidas.com.ar/camiseta-aniversario-50-anos-seleccion-argentina/JF0395.html".to_string(),
                    fallback_price: 149_999.0,
                },
                ListingConfig {
                    country: Country::US,
                    url: "https://www.adidas.com/us/argentina-anniversary-jersey/JF2641.html".to_string(),
                    fallback_price: 100.0,
                },
            ],
        },
    ]
}
