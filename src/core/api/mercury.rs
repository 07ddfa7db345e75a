// Copyright (c) 2021 Tangram Robotics Inc. - All Rights Reserved
// Unauthorized copying of this file, via any medium is strictly prohibited
// Proprietary and confidential
// ----------------------------

//! Client for Mercury's accounts-receivable (invoicing) API.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::debug;
use reqwest::{header, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::api::database::with_trailing_slash;
use crate::core::models::Quotation;

/// Configuration for interacting with Mercury.
#[derive(Clone, Debug)]
pub struct MercuryApiConfig {
    pub base_url: Url,
    /// Mercury account that receives invoice payments.
    pub account_id: String,
    pub client: reqwest::Client,
}

impl MercuryApiConfig {
    pub fn new_with_params(
        base_url: Url,
        api_token: &str,
        account_id: String,
        timeout: u64,
    ) -> Result<Self> {
        let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"),);
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", api_token))?,
        );
        Ok(Self {
            client: reqwest::Client::builder()
                .user_agent(user_agent)
                .default_headers(headers)
                .timeout(Duration::from_secs(timeout))
                .build()?,
            account_id,
            base_url: with_trailing_slash(base_url),
        })
    }

    pub fn new(base_url: Url, api_token: &str, account_id: String) -> Result<Self> {
        Self::new_with_params(base_url, api_token, account_id, 30)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Invalid Mercury path: {}", path))
    }
}

#[derive(Debug, Serialize)]
struct CustomerRequest<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct MercuryCustomer {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InvoiceLineItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price_cents: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InvoiceRequest {
    pub customer_id: String,
    pub destination_account_id: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub line_items: Vec<InvoiceLineItem>,
    pub memo: Option<String>,
}

impl InvoiceRequest {
    /// Mirror a quotation as an invoice. Tax and installation become their
    /// own lines so the invoice total matches the quotation total.
    pub fn from_quotation(
        quotation: &Quotation,
        customer_id: String,
        destination_account_id: String,
        invoice_date: NaiveDate,
        due_date: NaiveDate,
    ) -> Self {
        let mut line_items: Vec<InvoiceLineItem> = quotation
            .items
            .iter()
            .map(|item| InvoiceLineItem {
                name: format!("{} ({})", item.name, item.sku),
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents,
            })
            .collect();
        if quotation.installation_cents > 0 {
            line_items.push(InvoiceLineItem {
                name: "Installation".to_owned(),
                quantity: 1,
                unit_price_cents: quotation.installation_cents,
            });
        }
        if quotation.tax_cents > 0 {
            line_items.push(InvoiceLineItem {
                name: "Sales tax".to_owned(),
                quantity: 1,
                unit_price_cents: quotation.tax_cents,
            });
        }

        Self {
            customer_id,
            destination_account_id,
            invoice_number: quotation.quote_number.clone(),
            invoice_date,
            due_date,
            line_items,
            memo: Some(format!("Quotation {}", quotation.quote_number)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MercuryInvoice {
    pub id: String,
    pub invoice_number: String,
    pub status: String,
    pub amount_cents: u64,
    pub due_date: NaiveDate,
    /// Hosted page where the customer pays.
    pub payment_url: Option<String>,
}

async fn parse_body<T>(response: Response, api_name: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    response.error_for_status_ref()?;

    debug!("status: {}", response.status());
    let content = response.text().await?;
    debug!("content: {}", content);

    serde_json::from_str(&content)
        .with_context(|| format!("JSON from {} API was malformed: {}", api_name, &content))
}

/// Create an accounts-receivable customer.
pub async fn customer_create(
    configuration: &MercuryApiConfig,
    name: &str,
    email: &str,
) -> Result<MercuryCustomer> {
    debug!("building customer post request for: {} <{}>", name, email);
    let response = configuration
        .client
        .post(configuration.endpoint("ar/customers")?)
        .json(&CustomerRequest { name, email })
        .send()
        .await?;
    parse_body(response, "Mercury customers").await
}

/// Issue an invoice.
pub async fn invoice_create(
    configuration: &MercuryApiConfig,
    request: &InvoiceRequest,
) -> Result<MercuryInvoice> {
    debug!("building invoice post request for: {:?}", request);
    let response = configuration
        .client
        .post(configuration.endpoint("ar/invoices")?)
        .json(request)
        .send()
        .await?;
    parse_body(response, "Mercury invoices").await
}

/// Fetch an invoice. `Ok(None)` means Mercury doesn't know the id.
pub async fn invoice_get(
    configuration: &MercuryApiConfig,
    invoice_id: &str,
) -> Result<Option<MercuryInvoice>> {
    debug!("building invoice get request for: {}", invoice_id);
    let mut url = configuration.endpoint("ar/invoices/")?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("Mercury URL can't have a path"))?
        .pop_if_empty()
        .push(invoice_id);

    let response = configuration.client.get(url).send().await?;
    if response.status() == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    parse_body(response, "Mercury invoices").await.map(Some)
}
