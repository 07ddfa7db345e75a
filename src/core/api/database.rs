//! Interact with the quotations database.
//!
//! The database is fronted by PostgREST and stores quotations and the
//! payments received for them.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::debug;
use reqwest::{header, Response, Url};
use serde::de::DeserializeOwned;
use strum_macros::{Display, EnumString, EnumVariantNames};
use uuid::Uuid;

use crate::core::models::{
    NewPayment, NewQuotation, Payment, Quotation, QuotationPatch, QuoteStatus,
};

/// Default number of quotations listed.
pub const DEFAULT_LIMIT: usize = 20;
/// Upper bound on quotations listed per request.
pub const MAX_LIMIT: usize = 100;

/// Configuration for interacting with the quotations database.
#[derive(Clone, Debug)]
pub struct DatabaseApiConfig {
    /// URL endpoint, possibly with a path prefix such as `/rest/v1/`
    pub base_url: Url,
    /// HTTP client
    pub client: reqwest::Client,
}

impl DatabaseApiConfig {
    /// Configure HTTP client with auth, user-agent, and headers.
    pub fn new_with_params(base_url: Url, bearer_access_token: &str, timeout: u64) -> Result<Self> {
        let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"),);
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", bearer_access_token))?,
        );
        headers.insert(
            "Prefer",
            header::HeaderValue::from_str("return=representation")?,
        );
        Ok(Self {
            client: reqwest::Client::builder()
                .user_agent(user_agent)
                .default_headers(headers)
                .timeout(Duration::from_secs(timeout))
                .build()?,
            base_url: with_trailing_slash(base_url),
        })
    }

    pub fn new(base_url: Url, bearer_access_token: &str) -> Result<Self> {
        let timeout = 30;
        Self::new_with_params(base_url, bearer_access_token, timeout)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Invalid database path: {}", path))
    }
}

/// `Url::join` replaces the last path segment unless the base ends in `/`.
pub(crate) fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Available quotation sorting options
#[derive(EnumString, EnumVariantNames, Display, Debug, Clone, Copy, PartialEq)]
pub enum QuotationOrdering {
    /// Oldest first
    #[strum(serialize = "created_date.asc")]
    CreatedDateAsc,
    /// Most recent first
    #[strum(serialize = "created_date.desc")]
    CreatedDateDesc,
    /// Smallest total first
    #[strum(serialize = "total_cents.asc")]
    TotalAsc,
    /// Largest total first
    #[strum(serialize = "total_cents.desc")]
    TotalDesc,
}

/// Options for filtering the quotation list query.
#[derive(Debug, Default)]
pub struct QuotationGetRequest {
    /// Filter to a specific quotation
    pub id: Option<Uuid>,
    /// Filter by lifecycle state
    pub status: Option<QuoteStatus>,
    /// Filter to one customer's quotations
    pub customer_email: Option<String>,
    /// Filter to the quotation a Mercury invoice was issued for
    pub invoice_id: Option<String>,
    /// Order by a field and direction. Defaults to most recent first.
    pub order: Option<QuotationOrdering>,
    /// Number of quotations to return (default=20, max=100).
    pub limit: Option<usize>,
    /// Skip N results (for pagination).
    pub offset: Option<usize>,
}

/// Read a PostgREST response as a list of rows.
async fn parse_rows<T>(response: Response, api_name: &str) -> Result<Vec<T>>
where
    T: DeserializeOwned,
{
    response.error_for_status_ref()?;

    debug!("status: {}", response.status());
    let content = response.text().await?;
    debug!("content: {}", content);

    let rows: Vec<T> = serde_json::from_str(&content)
        .with_context(|| format!("JSON from {} API was malformed: {}", api_name, &content))?;
    Ok(rows)
}

/// Get a list of quotations.
///
/// # Errors
///
/// Returns an error if the database server returns a non-200 response (e.g.
/// if auth credentials are invalid, if server is unreachable) or if the
/// returned data is malformed (e.g. not json).
pub async fn quotations_get(
    configuration: &DatabaseApiConfig,
    params: &QuotationGetRequest,
) -> Result<Vec<Quotation>> {
    debug!("building get request for: {:?}", params);
    let client = &configuration.client;

    let mut req_builder = client.get(configuration.endpoint("quotations")?);

    if let Some(id) = &params.id {
        req_builder = req_builder.query(&[("id", format!("eq.{}", id))]);
    }
    if let Some(status) = &params.status {
        req_builder = req_builder.query(&[("status", format!("eq.{}", status))]);
    }
    if let Some(email) = &params.customer_email {
        req_builder = req_builder.query(&[("customer->>email", format!("eq.{}", email))]);
    }
    if let Some(invoice_id) = &params.invoice_id {
        req_builder = req_builder.query(&[("invoice_id", format!("eq.{}", invoice_id))]);
    }

    let order = params.order.unwrap_or(QuotationOrdering::CreatedDateDesc);
    req_builder = req_builder.query(&[("order", order.to_string())]);
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    req_builder = req_builder.query(&[("limit", limit)]);
    if let Some(offset) = &params.offset {
        req_builder = req_builder.query(&[("offset", offset)]);
    }

    let response = req_builder.send().await?;
    parse_rows(response, "Quotations").await
}

/// Look up a single quotation. `Ok(None)` means it doesn't exist.
pub async fn quotation_get(configuration: &DatabaseApiConfig, id: Uuid) -> Result<Option<Quotation>> {
    let params = QuotationGetRequest {
        id: Some(id),
        limit: Some(1),
        ..Default::default()
    };
    Ok(quotations_get(configuration, &params).await?.pop())
}

/// Find the quotation a Mercury invoice was issued for.
pub async fn quotation_by_invoice(
    configuration: &DatabaseApiConfig,
    invoice_id: &str,
) -> Result<Option<Quotation>> {
    let params = QuotationGetRequest {
        invoice_id: Some(invoice_id.to_owned()),
        limit: Some(1),
        ..Default::default()
    };
    Ok(quotations_get(configuration, &params).await?.pop())
}

/// Store a new quotation.
///
/// The returned quotation contains the database-assigned id and creation
/// date.
///
/// # Errors
///
/// Returns an error if the database server returns a non-200 response or if
/// the returned data is malformed.
pub async fn quotations_post(
    configuration: &DatabaseApiConfig,
    quotation: &NewQuotation,
) -> Result<Quotation> {
    debug!("Building post request for: {:?}", quotation);
    let client = &configuration.client;

    let req_builder = client
        .post(configuration.endpoint("quotations")?)
        .json(quotation);

    let response = req_builder.send().await?;
    let mut quotations: Vec<Quotation> = parse_rows(response, "Quotations").await?;
    // PostgREST returns a list, even when only a single object is expected
    // https://postgrest.org/en/v7.0.0/api.html#singular-or-plural
    quotations
        .pop()
        .ok_or_else(|| anyhow!("Database returned no info for newly-created Quotation!"))
}

/// Update fields of a quotation. `Ok(None)` means no quotation has that id.
pub async fn quotations_patch(
    configuration: &DatabaseApiConfig,
    id: Uuid,
    patch: &QuotationPatch,
) -> Result<Option<Quotation>> {
    debug!("Building patch request for: {} {:?}", id, patch);
    let client = &configuration.client;

    let req_builder = client
        .patch(configuration.endpoint("quotations")?)
        .query(&[("id", format!("eq.{}", id))])
        .json(patch);

    let response = req_builder.send().await?;
    let mut quotations: Vec<Quotation> = parse_rows(response, "Quotations").await?;
    Ok(quotations.pop())
}

/// Payments recorded for a quotation, most recent first.
pub async fn payments_get(configuration: &DatabaseApiConfig, quotation_id: Uuid) -> Result<Vec<Payment>> {
    debug!("building payments get request for: {}", quotation_id);
    let client = &configuration.client;

    let req_builder = client
        .get(configuration.endpoint("payments")?)
        .query(&[("quotation_id", format!("eq.{}", quotation_id))])
        .query(&[("order", "received_at.desc")]);

    let response = req_builder.send().await?;
    parse_rows(response, "Payments").await
}

/// Look up the payment recorded for a webhook event, if any.
pub async fn payment_by_event(
    configuration: &DatabaseApiConfig,
    event_id: &str,
) -> Result<Option<Payment>> {
    debug!("building payments get request for event: {}", event_id);
    let client = &configuration.client;

    let req_builder = client
        .get(configuration.endpoint("payments")?)
        .query(&[("event_id", format!("eq.{}", event_id))])
        .query(&[("limit", "1")]);

    let response = req_builder.send().await?;
    let mut payments: Vec<Payment> = parse_rows(response, "Payments").await?;
    Ok(payments.pop())
}

/// Record a payment.
pub async fn payments_post(configuration: &DatabaseApiConfig, payment: &NewPayment) -> Result<Payment> {
    debug!("building payments post request for: {:?}", payment);
    let client = &configuration.client;

    let req_builder = client
        .post(configuration.endpoint("payments")?)
        .json(payment);

    let response = req_builder.send().await?;
    let mut payments: Vec<Payment> = parse_rows(response, "Payments").await?;
    payments
        .pop()
        .ok_or_else(|| anyhow!("Database returned no info for newly-created Payment!"))
}
