// Copyright (c) 2021 Tangram Robotics Inc. - All Rights Reserved
// Unauthorized copying of this file, via any medium is strictly prohibited
// Proprietary and confidential
// ----------------------------

//! Serialization to/from the quotations database, plus the pricing rules
//! applied when a quotation is created.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString, EnumVariantNames};
use uuid::Uuid;

/// Lifecycle of a quotation. Quotations move forward through these states;
/// `Void` can be set at any point by staff.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
    EnumVariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Accepted,
    Invoiced,
    Paid,
    Void,
}

impl QuoteStatus {
    /// Whether an invoice may still be issued for a quotation in this state.
    pub fn can_invoice(&self) -> bool {
        matches!(
            self,
            QuoteStatus::Draft | QuoteStatus::Sent | QuoteStatus::Accepted
        )
    }

    /// Forward moves only, plus `Void` from anything but `Void` itself.
    pub fn can_transition_to(&self, next: QuoteStatus) -> bool {
        match (self, next) {
            (QuoteStatus::Void, _) => false,
            (_, QuoteStatus::Void) => true,
            (current, next) => next.rank() > current.rank(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            QuoteStatus::Draft => 0,
            QuoteStatus::Sent => 1,
            QuoteStatus::Accepted => 2,
            QuoteStatus::Invoiced => 3,
            QuoteStatus::Paid => 4,
            QuoteStatus::Void => 5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Customer {
    /// Name shown on documents: company if present, otherwise the contact.
    pub fn display_name(&self) -> &str {
        self.company.as_deref().unwrap_or(&self.name)
    }
}

/// A priced line on a quotation. Names and prices are copied from the
/// catalog at creation time so later catalog edits don't change old quotes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price_cents: u64,
    pub line_total_cents: u64,
}

impl LineItem {
    /// `None` if the line total doesn't fit in a u64.
    pub fn new(sku: String, name: String, quantity: u32, unit_price_cents: u64) -> Option<Self> {
        let line_total_cents = unit_price_cents.checked_mul(u64::from(quantity))?;
        Some(Self {
            sku,
            name,
            quantity,
            unit_price_cents,
            line_total_cents,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Totals {
    pub subtotal_cents: u64,
    pub tax_cents: u64,
    pub installation_cents: u64,
    pub total_cents: u64,
}

impl Totals {
    /// Equipment is taxed, installation labor is not. Tax rounds half-up to
    /// the cent. `None` on overflow.
    pub fn compute(items: &[LineItem], installation_cents: u64, tax_rate_bps: u32) -> Option<Totals> {
        let subtotal_cents = items
            .iter()
            .try_fold(0u64, |sum, i| sum.checked_add(i.line_total_cents))?;
        let tax_cents = subtotal_cents
            .checked_mul(u64::from(tax_rate_bps))?
            .checked_add(5_000)?
            / 10_000;
        let total_cents = subtotal_cents
            .checked_add(tax_cents)?
            .checked_add(installation_cents)?;
        Some(Totals {
            subtotal_cents,
            tax_cents,
            installation_cents,
            total_cents,
        })
    }
}

/// A stored quotation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    /// Assigned by the database.
    pub id: Uuid,
    /// Customer-facing identifier, e.g. DS-20210503-4F2A.
    pub quote_number: String,
    #[serde(with = "postgrest_timestamp")]
    pub created_date: DateTime<Utc>,
    pub valid_until: NaiveDate,
    pub status: QuoteStatus,
    pub customer: Customer,
    pub items: Vec<LineItem>,
    pub notes: Option<String>,
    pub subtotal_cents: u64,
    pub tax_cents: u64,
    pub installation_cents: u64,
    pub total_cents: u64,
    /// Mercury invoice, once one has been issued.
    pub invoice_id: Option<String>,
    pub invoice_url: Option<String>,
}

/// A quotation that hasn't been stored yet.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewQuotation {
    pub quote_number: String,
    pub valid_until: NaiveDate,
    pub status: QuoteStatus,
    pub customer: Customer,
    pub items: Vec<LineItem>,
    pub notes: Option<String>,
    pub subtotal_cents: u64,
    pub tax_cents: u64,
    pub installation_cents: u64,
    pub total_cents: u64,
}

impl NewQuotation {
    pub fn new(
        quote_number: String,
        valid_until: NaiveDate,
        customer: Customer,
        items: Vec<LineItem>,
        notes: Option<String>,
        totals: Totals,
    ) -> Self {
        Self {
            quote_number,
            valid_until,
            status: QuoteStatus::Draft,
            customer,
            items,
            notes,
            subtotal_cents: totals.subtotal_cents,
            tax_cents: totals.tax_cents,
            installation_cents: totals.installation_cents,
            total_cents: totals.total_cents,
        }
    }
}

/// Partial update of a quotation. Unset fields are left alone.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct QuotationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<QuoteStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_url: Option<String>,
}

impl QuotationPatch {
    pub fn status(status: QuoteStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// A payment received for an invoiced quotation, recorded from a webhook.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub quotation_id: Uuid,
    pub invoice_id: String,
    /// Webhook event that reported the payment. Unique, so redelivered events
    /// are recorded once.
    pub event_id: String,
    pub amount_cents: u64,
    pub status: String,
    #[serde(with = "postgrest_timestamp")]
    pub received_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewPayment {
    pub quotation_id: Uuid,
    pub invoice_id: String,
    pub event_id: String,
    pub amount_cents: u64,
    pub status: String,
}

/// Quote numbers look like `DS-20210503-4F2A`: the creation date plus four
/// random hex digits.
pub fn generate_quote_number(date: NaiveDate) -> String {
    format!("DS-{}-{:04X}", date.format("%Y%m%d"), rand::random::<u16>())
}

/// Insert thousands separators: 1234567 -> "1,234,567".
pub fn group_digits(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

/// Format cents as dollars: 123456 -> "$1,234.56".
pub fn format_cents(cents: u64) -> String {
    format!("${}.{:02}", group_digits(cents / 100), cents % 100)
}

/// Handles (de)serializing PostgREST timestamps, as suggested at
/// <https://serde.rs/custom-date-format.html>.
mod postgrest_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    // Example: 2021-05-06T23:54:45.626411+00:00
    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f%:z";

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = format!("{}", date.format(FORMAT));
        serializer.serialize_str(&s)
    }

    // PostgREST drops trailing zeros from the fractional seconds, so parse
    // any RFC 3339 timestamp rather than the exact output format.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
