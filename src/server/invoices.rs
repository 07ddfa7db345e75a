//! Mercury invoicing and the payment webhook.

use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use bytes::Bytes;
use chrono::{Duration, Utc};
use log::{error, info, warn};
use serde::Serialize;
use uuid::Uuid;

use super::error::ApiError;
use super::extract::PathParam;
use super::quotations::find_quotation;
use super::{created, ok, AppState, SharedState};
use crate::core::api::database;
use crate::core::api::email::{self, OutgoingEmail};
use crate::core::api::mercury::{self, InvoiceRequest, MercuryInvoice};
use crate::core::models::{NewPayment, Payment, Quotation, QuotationPatch, QuoteStatus};
use crate::core::templates::{self, EmailBody};
use crate::core::webhook::{self, WebhookEvent, INVOICE_PAID, SIGNATURE_HEADER, TIMESTAMP_HEADER};

#[derive(Debug, Serialize)]
struct InvoiceResult {
    quotation: Quotation,
    invoice: MercuryInvoice,
}

/// Issue a Mercury invoice for a quotation and mark it invoiced.
pub async fn create_invoice(
    State(state): State<SharedState>,
    PathParam(id): PathParam<Uuid>,
) -> Result<Response, ApiError> {
    let quotation = find_quotation(&state, id).await?;
    if !quotation.status.can_invoice() {
        return Err(ApiError::Conflict(format!(
            "Quotation {} is already {}",
            quotation.quote_number, quotation.status
        )));
    }

    let customer = mercury::customer_create(
        &state.mercury,
        quotation.customer.display_name(),
        &quotation.customer.email,
    )
    .await?;

    let today = Utc::now().date_naive();
    let due_date = today + Duration::days(i64::from(state.quotes.payment_terms_days));
    let request = InvoiceRequest::from_quotation(
        &quotation,
        customer.id,
        state.mercury.account_id.clone(),
        today,
        due_date,
    );
    let invoice = mercury::invoice_create(&state.mercury, &request).await?;
    info!(
        "Issued invoice {} for quotation {} ({})",
        invoice.id, quotation.quote_number, invoice.amount_cents
    );

    let patch = QuotationPatch {
        status: Some(QuoteStatus::Invoiced),
        invoice_id: Some(invoice.id.clone()),
        invoice_url: invoice.payment_url.clone(),
    };
    let quotation = database::quotations_patch(&state.database, id, &patch)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Quotation not found: {}", id)))?;

    Ok(created(InvoiceResult { quotation, invoice }))
}

pub async fn get_invoice(
    State(state): State<SharedState>,
    PathParam(invoice_id): PathParam<String>,
) -> Result<Response, ApiError> {
    let invoice = mercury::invoice_get(&state.mercury, &invoice_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Invoice not found: {}", invoice_id)))?;
    Ok(ok(invoice))
}

#[derive(Debug, Serialize)]
struct WebhookAck {
    received: bool,
    processed: bool,
}

impl WebhookAck {
    fn ignored() -> Response {
        ok(WebhookAck {
            received: true,
            processed: false,
        })
    }

    fn processed() -> Response {
        ok(WebhookAck {
            received: true,
            processed: true,
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Payment notifications from Mercury.
///
/// Other event types and events for unknown invoices are acknowledged with a
/// 200 but not processed. A repeated event is not recorded again, but still
/// marks its quotation paid if an earlier delivery failed before doing so.
pub async fn mercury_webhook(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let body = body?;
    webhook::verify(
        state.webhook.secret.as_bytes(),
        header_str(&headers, SIGNATURE_HEADER),
        header_str(&headers, TIMESTAMP_HEADER),
        &body,
        Utc::now().timestamp(),
        state.webhook.tolerance_seconds,
    )?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Malformed webhook event: {}", e)))?;
    if event.event_type != INVOICE_PAID {
        info!("Ignoring {} webhook event {}", event.event_type, event.id);
        return Ok(WebhookAck::ignored());
    }

    let invoice_id = &event.data.invoice_id;
    let quotation = match database::quotation_by_invoice(&state.database, invoice_id).await? {
        Some(quotation) => quotation,
        None => {
            warn!(
                "Webhook event {} is for unknown invoice {}",
                event.id, invoice_id
            );
            return Ok(WebhookAck::ignored());
        }
    };

    let payment = match database::payment_by_event(&state.database, &event.id).await? {
        Some(_) if !quotation.status.can_transition_to(QuoteStatus::Paid) => {
            info!("Webhook event {} was already recorded", event.id);
            return Ok(WebhookAck::processed());
        }
        Some(payment) => {
            warn!(
                "Webhook event {} was recorded but quotation {} is still {}",
                event.id, quotation.quote_number, quotation.status
            );
            payment
        }
        None => {
            let payment = database::payments_post(
                &state.database,
                &NewPayment {
                    quotation_id: quotation.id,
                    invoice_id: invoice_id.clone(),
                    event_id: event.id.clone(),
                    amount_cents: event.data.amount_cents,
                    status: event.data.status.clone(),
                },
            )
            .await?;
            info!(
                "Recorded payment of {} for quotation {}",
                payment.amount_cents, quotation.quote_number
            );
            payment
        }
    };

    let quotation = database::quotations_patch(
        &state.database,
        quotation.id,
        &QuotationPatch::status(QuoteStatus::Paid),
    )
    .await?
    .unwrap_or(quotation);

    notify_payment(&state, &quotation, &payment).await;
    Ok(WebhookAck::processed())
}

/// Receipt to the customer and a notice to sales. Send failures are only
/// logged.
async fn notify_payment(state: &AppState, quotation: &Quotation, payment: &Payment) {
    let receipt = templates::payment_receipt_email(quotation, payment);
    send_logged(state, quotation.customer.email.clone(), receipt).await;

    if let Some(sales_email) = &state.quotes.sales_email {
        let notice = templates::sales_notification_email(quotation, payment);
        send_logged(state, sales_email.clone(), notice).await;
    }
}

async fn send_logged(state: &AppState, to: String, content: EmailBody) {
    let message = OutgoingEmail {
        to: vec![to],
        subject: content.subject,
        html: content.html,
        text: content.text,
        reply_to: state.quotes.sales_email.clone(),
        attachments: Vec::new(),
    };
    if let Err(e) = email::send_email(&state.email, &message).await {
        error!("Failed to send \"{}\" to {:?}: {:#}", message.subject, message.to, e);
    }
}
