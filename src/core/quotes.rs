//! Validate and price incoming quotation requests.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::app_config::QuotesConfig;
use crate::core::catalog::Catalog;
use crate::core::models::{
    format_cents, generate_quote_number, Customer, LineItem, NewQuotation, Totals,
};

const MAX_NAME_CHARS: usize = 200;
const MAX_PHONE_CHARS: usize = 50;
const MAX_ADDRESS_CHARS: usize = 500;
const MAX_NOTES_CHARS: usize = 2000;
const MAX_ITEMS: usize = 50;
const MAX_QUANTITY: u32 = 1000;
/// $10,000,000.00, for both unit prices and installation.
const MAX_AMOUNT_CENTS: u64 = 1_000_000_000;

/// A single problem with a request field, reported back to the caller.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldError {
    /// Path to the field, e.g. `items[2].quantity`.
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Body of `POST /quotations`.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuotationRequest {
    pub customer: Customer,
    pub items: Vec<ItemRequest>,
    /// Installation labor, untaxed.
    #[serde(default)]
    pub installation_cents: u64,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemRequest {
    pub sku: String,
    pub quantity: u32,
    /// Negotiated price; the catalog price is used when absent.
    pub unit_price_cents: Option<u64>,
}

impl QuotationRequest {
    /// Check every field, collecting all problems rather than stopping at the
    /// first.
    pub fn validate(&self, catalog: &Catalog) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        let name = self.customer.name.trim();
        if name.is_empty() {
            errors.push(FieldError::new("customer.name", "Name is required"));
        } else if name.chars().count() > MAX_NAME_CHARS {
            errors.push(FieldError::new(
                "customer.name",
                format!("Name must be at most {} characters", MAX_NAME_CHARS),
            ));
        }
        if !is_valid_email(&self.customer.email) {
            errors.push(FieldError::new("customer.email", "Invalid email address"));
        }
        let optional_fields = [
            ("customer.company", &self.customer.company, MAX_NAME_CHARS),
            ("customer.phone", &self.customer.phone, MAX_PHONE_CHARS),
            ("customer.address", &self.customer.address, MAX_ADDRESS_CHARS),
        ];
        for (field, value, max) in optional_fields.iter() {
            if let Some(value) = value {
                if value.chars().count() > *max {
                    errors.push(FieldError::new(
                        *field,
                        format!("Must be at most {} characters", max),
                    ));
                }
            }
        }

        if self.items.is_empty() {
            errors.push(FieldError::new("items", "At least one item is required"));
        } else if self.items.len() > MAX_ITEMS {
            errors.push(FieldError::new(
                "items",
                format!("At most {} items are allowed", MAX_ITEMS),
            ));
        }
        for (i, item) in self.items.iter().enumerate() {
            if catalog.get(&item.sku).is_none() {
                errors.push(FieldError::new(
                    format!("items[{}].sku", i),
                    format!("Unknown product: {}", item.sku),
                ));
            }
            if item.quantity == 0 || item.quantity > MAX_QUANTITY {
                errors.push(FieldError::new(
                    format!("items[{}].quantity", i),
                    format!("Quantity must be between 1 and {}", MAX_QUANTITY),
                ));
            }
            match item.unit_price_cents {
                Some(0) => errors.push(FieldError::new(
                    format!("items[{}].unit_price_cents", i),
                    "Unit price must be positive",
                )),
                Some(price) if price > MAX_AMOUNT_CENTS => errors.push(FieldError::new(
                    format!("items[{}].unit_price_cents", i),
                    format!("Unit price must be at most {}", format_cents(MAX_AMOUNT_CENTS)),
                )),
                _ => {}
            }
        }
        if self.installation_cents > MAX_AMOUNT_CENTS {
            errors.push(FieldError::new(
                "installation_cents",
                format!("Installation must be at most {}", format_cents(MAX_AMOUNT_CENTS)),
            ));
        }

        if let Some(notes) = &self.notes {
            if notes.chars().count() > MAX_NOTES_CHARS {
                errors.push(FieldError::new(
                    "notes",
                    format!("Notes must be at most {} characters", MAX_NOTES_CHARS),
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, then copy names and prices from the catalog and compute
    /// totals.
    pub fn into_new_quotation(
        self,
        catalog: &Catalog,
        quotes: &QuotesConfig,
        today: NaiveDate,
    ) -> Result<NewQuotation, Vec<FieldError>> {
        self.validate(catalog)?;

        let mut items = Vec::with_capacity(self.items.len());
        for (i, item) in self.items.into_iter().enumerate() {
            // validate() checked every SKU exists
            let product = catalog.get(&item.sku).ok_or_else(|| {
                vec![FieldError::new("items", format!("Unknown product: {}", item.sku))]
            })?;
            let unit_price_cents = item.unit_price_cents.unwrap_or(product.price_cents);
            let line = LineItem::new(
                product.sku.clone(),
                product.name.clone(),
                item.quantity,
                unit_price_cents,
            )
            .ok_or_else(|| vec![FieldError::new(format!("items[{}]", i), "Line total is too large")])?;
            items.push(line);
        }

        let totals = Totals::compute(&items, self.installation_cents, quotes.tax_rate_bps)
            .ok_or_else(|| vec![FieldError::new("items", "Quotation total is too large")])?;
        let valid_until = today + Duration::days(i64::from(quotes.validity_days));
        let mut customer = self.customer;
        customer.name = customer.name.trim().to_owned();
        customer.email = customer.email.trim().to_owned();
        let notes = self.notes.filter(|n| !n.trim().is_empty());

        Ok(NewQuotation::new(
            generate_quote_number(today),
            valid_until,
            customer,
            items,
            notes,
            totals,
        ))
    }
}

/// Loose address check: something@domain.tld with no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let domain = match parts.next() {
        Some(domain) => domain,
        None => return false,
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
