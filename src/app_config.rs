// Copyright (c) 2021 Tangram Robotics Inc. - All Rights Reserved
// Unauthorized copying of this file, via any medium is strictly prohibited
// Proprietary and confidential
// ----------------------------

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use url::Url;

/// Prefix for environment variable overrides.
///
/// Example of overriding: DESERT_QUOTES__MERCURY__API_TOKEN=abc
/// (Note double underscore to reach into lower struct levels!)
pub const ENV_PREFIX: &str = "DESERT_QUOTES";

/// Default config location, used when `--config` isn't provided.
pub const DEFAULT_CONFIG_PATH: &str = "~/.config/desert_solutions/desert-quotes.toml";

const REDACTED: &str = "********";

/// Build the layered configuration: config file (required only if the user
/// named one explicitly), then environment variable overrides.
pub fn load(config_file: Option<&str>) -> Result<config::Config> {
    let file_source = match config_file {
        Some(path) => config::File::with_name(path),
        None => config::File::with_name(&shellexpand::tilde(DEFAULT_CONFIG_PATH)).required(false),
    };
    let settings = config::Config::builder()
        .add_source(file_source)
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;
    Ok(settings)
}

/// Everything the HTTP service needs. Used by `serve` and the `config`
/// subcommand. The `products` subcommand only needs [CatalogSettings].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub quotes: QuotesConfig,
    pub database: DatabaseConfig,
    pub storage: BucketConfig,
    pub mercury: MercuryConfig,
    pub renderer: RendererConfig,
    pub email: EmailConfig,
    pub webhook: WebhookConfig,
}

impl AppConfig {
    /// Copy of the config that is safe to print.
    pub fn redacted(&self) -> AppConfig {
        let mut config = self.clone();
        config.database.jwt = REDACTED.to_owned();
        config.storage.access_key = REDACTED.to_owned();
        config.storage.secret_key = REDACTED.to_owned();
        config.mercury.api_token = REDACTED.to_owned();
        config.email.api_key = REDACTED.to_owned();
        config.webhook.secret = REDACTED.to_owned();
        config
    }
}

#[derive(Debug, Deserialize)]
pub struct CatalogSettings {
    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest accepted photo upload, in bytes.
    #[serde(default = "default_max_photo_bytes")]
    pub max_photo_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_photo_bytes: default_max_photo_bytes(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// Catalog TOML to use instead of the bundled catalog.
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct QuotesConfig {
    /// Sales tax in basis points (825 = 8.25%).
    #[serde(default = "default_tax_rate_bps")]
    pub tax_rate_bps: u32,
    #[serde(default = "default_validity_days")]
    pub validity_days: u32,
    #[serde(default = "default_payment_terms_days")]
    pub payment_terms_days: u32,
    /// Internal address notified about payments. Notifications are skipped
    /// when unset.
    pub sales_email: Option<String>,
}

impl Default for QuotesConfig {
    fn default() -> Self {
        Self {
            tax_rate_bps: default_tax_rate_bps(),
            validity_days: default_validity_days(),
            payment_terms_days: default_payment_terms_days(),
            sales_email: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: Url,
    pub jwt: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BucketConfig {
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom S3-compatible endpoint (e.g. DigitalOcean Spaces, MinIO).
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    #[serde(default = "default_presign_seconds")]
    pub presign_seconds: u64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MercuryConfig {
    #[serde(default = "default_mercury_url")]
    pub url: Url,
    pub api_token: String,
    pub account_id: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RendererConfig {
    pub url: Url,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EmailConfig {
    pub url: Url,
    pub api_key: String,
    pub from: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WebhookConfig {
    pub secret: String,
    #[serde(default = "default_tolerance_seconds")]
    pub tolerance_seconds: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    8080
}

fn default_max_photo_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_tax_rate_bps() -> u32 {
    825
}

fn default_validity_days() -> u32 {
    30
}

fn default_payment_terms_days() -> u32 {
    15
}

fn default_region() -> String {
    "us-west-1".to_owned()
}

fn default_presign_seconds() -> u64 {
    900
}

fn default_mercury_url() -> Url {
    Url::parse("https://api.mercury.com/api/v1/").expect("Mercury default URL is valid")
}

fn default_tolerance_seconds() -> u64 {
    300
}
