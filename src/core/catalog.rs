// Copyright (c) 2021 Tangram Robotics Inc. - All Rights Reserved
// Unauthorized copying of this file, via any medium is strictly prohibited
// Proprietary and confidential
// ----------------------------

//! Parse and query the product catalog.
//!
//! The catalog is a TOML file of `[[products]]` tables. A default catalog is
//! compiled into the binary; deployments can point `catalog.path` at their
//! own file.

use std::{collections::HashMap, fs::read_to_string, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString, EnumVariantNames};

use crate::core::models::group_digits;

const BUNDLED_CATALOG: &str = include_str!("../../resources/catalog.toml");

/// Product families offered by Desert Solutions.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
    EnumVariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    EvaporativeCooler,
    MiniSplit,
    HeatPump,
    Portable,
    Accessory,
}

impl Category {
    /// Whether units in this category hold water (and so may list a tank
    /// size).
    pub fn uses_water(&self) -> bool {
        matches!(self, Category::EvaporativeCooler | Category::Portable)
    }
}

/// Technical specifications. All fields are optional since accessories only
/// list a couple of them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Specs {
    pub cooling_btu: Option<u32>,
    pub heating_btu: Option<u32>,
    pub airflow_cfm: Option<u32>,
    pub coverage_sqft: Option<u32>,
    pub voltage: Option<String>,
    pub power_watts: Option<u32>,
    pub water_tank_gallons: Option<u32>,
    /// Kept as text so ratings like "21.5" print exactly as published.
    pub seer2: Option<String>,
    pub weight_lbs: Option<u32>,
    pub dimensions: Option<String>,
    pub warranty_years: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Product {
    pub sku: String,
    pub name: String,
    pub category: Category,
    pub description: String,
    pub price_cents: u64,
    /// Storage key of the product photo, if one has been uploaded.
    pub image_key: Option<String>,
    #[serde(default)]
    pub specs: Specs,
}

impl Product {
    /// Human-readable specification rows for datasheets and API responses.
    pub fn spec_lines(&self) -> Vec<(&'static str, String)> {
        let specs = &self.specs;
        let mut lines = Vec::new();
        if let Some(btu) = specs.cooling_btu {
            lines.push(("Cooling Capacity", format!("{} BTU/h", group_digits(btu.into()))));
        }
        if let Some(btu) = specs.heating_btu {
            lines.push(("Heating Capacity", format!("{} BTU/h", group_digits(btu.into()))));
        }
        if let Some(cfm) = specs.airflow_cfm {
            lines.push(("Airflow", format!("{} CFM", group_digits(cfm.into()))));
        }
        if let Some(sqft) = specs.coverage_sqft {
            lines.push(("Coverage", format!("up to {} sq ft", group_digits(sqft.into()))));
        }
        if let Some(seer2) = &specs.seer2 {
            lines.push(("Efficiency", format!("{} SEER2", seer2)));
        }
        if let Some(voltage) = &specs.voltage {
            lines.push(("Electrical", voltage.clone()));
        }
        if let Some(watts) = specs.power_watts {
            lines.push(("Power Draw", format!("{} W", group_digits(watts.into()))));
        }
        if let Some(gallons) = specs.water_tank_gallons {
            lines.push(("Water Reservoir", format!("{} gal", gallons)));
        }
        if let Some(dimensions) = &specs.dimensions {
            lines.push(("Dimensions", dimensions.clone()));
        }
        if let Some(lbs) = specs.weight_lbs {
            lines.push(("Weight", format!("{} lb", group_digits(lbs.into()))));
        }
        if let Some(years) = specs.warranty_years {
            let unit = if years == 1 { "year" } else { "years" };
            lines.push(("Warranty", format!("{} {}", years, unit)));
        }
        lines
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    products: Vec<Product>,
}

/// In-memory product catalog with lookup by SKU.
#[derive(Debug)]
pub struct Catalog {
    products: Vec<Product>,
    by_sku: HashMap<String, usize>,
}

impl Catalog {
    /// The catalog compiled into the binary.
    pub fn bundled() -> Result<Catalog> {
        Catalog::from_toml(BUNDLED_CATALOG).context("Bundled catalog is invalid")
    }

    /// Read a catalog from a TOML file at the given path.
    pub fn from_path<P>(toml_path: P) -> Result<Catalog>
    where
        P: AsRef<Path>,
    {
        let path = toml_path.as_ref();
        let contents = read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        Catalog::from_toml(&contents)
            .with_context(|| format!("Catalog {} is invalid", path.display()))
    }

    /// Use the configured catalog file if there is one, otherwise the bundled
    /// catalog.
    pub fn load(path: Option<&Path>) -> Result<Catalog> {
        match path {
            Some(path) => Catalog::from_path(path),
            None => Catalog::bundled(),
        }
    }

    pub fn from_toml(contents: &str) -> Result<Catalog> {
        let file = toml::from_str::<CatalogFile>(contents)?;

        let mut by_sku = HashMap::with_capacity(file.products.len());
        for (index, product) in file.products.iter().enumerate() {
            validate_product(product)?;
            if by_sku.insert(product.sku.clone(), index).is_some() {
                bail!("Duplicate SKU in catalog: {}", product.sku);
            }
        }

        Ok(Catalog {
            products: file.products,
            by_sku,
        })
    }

    pub fn get(&self, sku: &str) -> Option<&Product> {
        self.by_sku.get(sku).map(|&index| &self.products[index])
    }

    /// Products in catalog order, optionally restricted to one category.
    pub fn list(&self, category: Option<Category>) -> Vec<&Product> {
        self.products
            .iter()
            .filter(|p| category.map_or(true, |c| p.category == c))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

fn validate_product(product: &Product) -> Result<()> {
    if product.sku.trim().is_empty() {
        bail!("Catalog contains a product with an empty SKU");
    }
    if product.name.trim().is_empty() {
        return Err(anyhow!("Product {} has an empty name", product.sku));
    }
    if product.price_cents == 0 {
        return Err(anyhow!("Product {} has no price", product.sku));
    }
    if product.specs.water_tank_gallons.is_some() && !product.category.uses_water() {
        return Err(anyhow!(
            "Product {} lists a water reservoir but {} units don't use water",
            product.sku,
            product.category
        ));
    }
    Ok(())
}
