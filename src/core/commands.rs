// Copyright (c) 2021 Tangram Robotics Inc. - All Rights Reserved
// Unauthorized copying of this file, via any medium is strictly prohibited
// Proprietary and confidential
// ----------------------------

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

use super::catalog::{Catalog, Category};
use super::models::format_cents;
use crate::app_config::{AppConfig, CatalogSettings};
use crate::server::{self, AppState};

/// Run the HTTP API until shut down.
pub fn serve(config: config::Config, port: Option<u16>) -> Result<()> {
    let app_config: AppConfig = config.try_deserialize()?;
    let catalog = Catalog::load(app_config.catalog.path.as_deref())?;
    info!("Loaded {} catalog products", catalog.len());

    let port = port.unwrap_or(app_config.server.port);
    let address: SocketAddr = format!("{}:{}", app_config.server.host, port)
        .parse()
        .with_context(|| format!("Invalid server address {}:{}", app_config.server.host, port))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let _guard = runtime.enter();
    let state = Arc::new(AppState::new(&app_config, catalog)?);
    runtime.block_on(server::serve(state, address))
}

/// One line per product: SKU, price, category, and name.
pub fn list_products(config: config::Config, category: Option<Category>) -> Result<Vec<String>> {
    let settings: CatalogSettings = config.try_deserialize()?;
    let catalog = Catalog::load(settings.catalog.path.as_deref())?;

    Ok(catalog
        .list(category)
        .into_iter()
        .map(|p| {
            format!(
                "{:<12} {:>11}  {:<18} {}",
                p.sku,
                format_cents(p.price_cents),
                p.category.to_string(),
                p.name
            )
        })
        .collect())
}

/// Show the configuration file
pub fn print_config(config: config::Config) -> Result<()> {
    let app_config: AppConfig = config.try_deserialize()?;
    println!("{}", toml::to_string(&app_config.redacted())?);

    Ok(())
}
