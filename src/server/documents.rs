// Copyright (c) 2021 Tangram Robotics Inc. - All Rights Reserved
// Unauthorized copying of this file, via any medium is strictly prohibited
// Proprietary and confidential
// ----------------------------

//! Quotation documents: the quotation PDF and its delivery by email, site
//! photos, and the photo addendum.

use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use byte_unit::Byte;
use bytes::Bytes;
use futures::future::try_join_all;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ApiError;
use super::extract::{PathParam, QueryParams};
use super::quotations::find_quotation;
use super::{created, ok, pdf, SharedState};
use crate::core::api::database;
use crate::core::api::email::{self, Attachment, OutgoingEmail};
use crate::core::api::{renderer, storage};
use crate::core::models::{Quotation, QuotationPatch, QuoteStatus};
use crate::core::templates::{self, Photo};

/// Photos without a stored content type are assumed to be JPEGs.
const FALLBACK_IMAGE_TYPE: &str = "image/jpeg";

fn pdf_filename(quotation: &Quotation) -> String {
    format!("{}.pdf", quotation.quote_number)
}

pub async fn quotation_pdf(
    State(state): State<SharedState>,
    PathParam(id): PathParam<Uuid>,
) -> Result<Response, ApiError> {
    let quotation = find_quotation(&state, id).await?;
    let body = renderer::render_pdf(&state.renderer, templates::quotation_html(&quotation)).await?;
    Ok(pdf(&pdf_filename(&quotation), body))
}

#[derive(Debug, Serialize)]
struct SendResult {
    quotation: Quotation,
    email_id: String,
}

/// Email the quotation PDF to the customer. Drafts become `sent`; quotations
/// further along keep their status.
pub async fn send_quotation(
    State(state): State<SharedState>,
    PathParam(id): PathParam<Uuid>,
) -> Result<Response, ApiError> {
    let mut quotation = find_quotation(&state, id).await?;
    if quotation.status == QuoteStatus::Void {
        return Err(ApiError::Conflict(format!(
            "Quotation {} is void",
            quotation.quote_number
        )));
    }

    let body = renderer::render_pdf(&state.renderer, templates::quotation_html(&quotation)).await?;
    let content = templates::quotation_email(&quotation);
    let message = OutgoingEmail {
        to: vec![quotation.customer.email.clone()],
        subject: content.subject,
        html: content.html,
        text: content.text,
        reply_to: state.quotes.sales_email.clone(),
        attachments: vec![Attachment::new(pdf_filename(&quotation), &body)],
    };
    let email_id = email::send_email(&state.email, &message).await?;

    if quotation.status == QuoteStatus::Draft {
        quotation = database::quotations_patch(
            &state.database,
            id,
            &QuotationPatch::status(QuoteStatus::Sent),
        )
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Quotation not found: {}", id)))?;
    }
    info!(
        "Sent quotation {} to {}",
        quotation.quote_number, quotation.customer.email
    );

    Ok(ok(SendResult {
        quotation,
        email_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PhotoQuery {
    filename: Option<String>,
}

#[derive(Debug, Serialize)]
struct PhotoView {
    key: String,
    filename: String,
    url: String,
}

impl PhotoView {
    fn new(state: &SharedState, key: String) -> Self {
        PhotoView {
            filename: storage::filename_from_key(&key).to_owned(),
            url: storage::presigned_url(&state.storage, &key),
            key,
        }
    }
}

fn too_large(max_photo_bytes: usize) -> ApiError {
    let limit = Byte::from_bytes(max_photo_bytes as u128).get_appropriate_unit(true);
    ApiError::PayloadTooLarge(format!("Photos may be at most {}", limit))
}

/// Store a raw image body as a quotation photo.
pub async fn upload_photo(
    State(state): State<SharedState>,
    PathParam(id): PathParam<Uuid>,
    QueryParams(query): QueryParams<PhotoQuery>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let body = match body {
        Ok(body) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return Err(too_large(state.max_photo_bytes))
        }
        Err(rejection) => return Err(rejection.into()),
    };

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    if !content_type.starts_with("image/") {
        return Err(ApiError::BadRequest(
            "Photos must be uploaded with an image/* Content-Type".to_owned(),
        ));
    }
    if body.is_empty() {
        return Err(ApiError::BadRequest("Photo upload is empty".to_owned()));
    }
    if body.len() > state.max_photo_bytes {
        return Err(too_large(state.max_photo_bytes));
    }

    find_quotation(&state, id).await?;
    let filename = query.filename.as_deref().unwrap_or("photo");
    let size = body.len();
    let key = storage::upload_photo(&state.storage, id, filename, &content_type, body).await?;
    info!("Stored {} byte photo {} for quotation {}", size, key, id);

    Ok(created(PhotoView::new(&state, key)))
}

pub async fn list_photos(
    State(state): State<SharedState>,
    PathParam(id): PathParam<Uuid>,
) -> Result<Response, ApiError> {
    find_quotation(&state, id).await?;
    let photos: Vec<PhotoView> = storage::list_photos(&state.storage, id)
        .await?
        .into_iter()
        .map(|key| PhotoView::new(&state, key))
        .collect();
    Ok(ok(photos))
}

/// Every photo for a quotation inlined into one PDF.
pub async fn photo_addendum(
    State(state): State<SharedState>,
    PathParam(id): PathParam<Uuid>,
) -> Result<Response, ApiError> {
    let quotation = find_quotation(&state, id).await?;
    let keys = storage::list_photos(&state.storage, id).await?;
    if keys.is_empty() {
        return Err(ApiError::NotFound(format!(
            "No photos uploaded for quotation {}",
            quotation.quote_number
        )));
    }

    let downloads = keys.iter().map(|key| storage::download(&state.storage, key));
    let objects = try_join_all(downloads).await?;
    debug!("downloaded {} photos for {}", objects.len(), quotation.quote_number);

    let photos: Vec<Photo> = keys
        .iter()
        .zip(objects)
        .map(|(key, object)| Photo {
            filename: storage::filename_from_key(key).to_owned(),
            data_uri: templates::data_uri(
                object.content_type.as_deref().unwrap_or(FALLBACK_IMAGE_TYPE),
                &object.data,
            ),
        })
        .collect();

    let html = templates::photo_addendum_html(&quotation, &photos);
    let body = renderer::render_pdf(&state.renderer, html).await?;
    Ok(pdf(
        &format!("{}-photos.pdf", quotation.quote_number),
        body,
    ))
}
