// Copyright (c) 2021 Tangram Robotics Inc. - All Rights Reserved
// Unauthorized copying of this file, via any medium is strictly prohibited
// Proprietary and confidential
// ----------------------------

//! HTTP surface. Every route lives under [API_PREFIX] and answers with a
//! JSON envelope (`{"success": true, "data": ...}`) or a PDF.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use bytes::Bytes;
use log::info;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::signal;

use crate::app_config::{AppConfig, QuotesConfig, WebhookConfig};
use crate::core::api::database::DatabaseApiConfig;
use crate::core::api::email::EmailApiConfig;
use crate::core::api::mercury::MercuryApiConfig;
use crate::core::api::renderer::RendererApiConfig;
use crate::core::api::storage::StorageConfig;
use crate::core::catalog::Catalog;

mod documents;
pub(crate) mod error;
mod extract;
mod invoices;
mod products;
mod quotations;

pub const API_PREFIX: &str = "/api/desert-solutions";

/// Collaborators and settings shared by every handler.
pub struct AppState {
    pub catalog: Catalog,
    pub database: DatabaseApiConfig,
    pub storage: StorageConfig,
    pub mercury: MercuryApiConfig,
    pub renderer: RendererApiConfig,
    pub email: EmailApiConfig,
    pub quotes: QuotesConfig,
    pub webhook: WebhookConfig,
    pub max_photo_bytes: usize,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: &AppConfig, catalog: Catalog) -> Result<AppState> {
        Ok(AppState {
            catalog,
            database: DatabaseApiConfig::new(config.database.url.clone(), &config.database.jwt)?,
            storage: StorageConfig::new(&config.storage)?,
            mercury: MercuryApiConfig::new(
                config.mercury.url.clone(),
                &config.mercury.api_token,
                config.mercury.account_id.clone(),
            )?,
            renderer: RendererApiConfig::new(config.renderer.url.clone())?,
            email: EmailApiConfig::new(
                config.email.url.clone(),
                &config.email.api_key,
                config.email.from.clone(),
            )?,
            quotes: config.quotes.clone(),
            webhook: config.webhook.clone(),
            max_photo_bytes: config.server.max_photo_bytes,
        })
    }
}

#[derive(Serialize)]
struct Envelope<T> {
    success: bool,
    data: T,
}

/// 200 with the success envelope.
pub(crate) fn ok<T: Serialize>(data: T) -> Response {
    respond(StatusCode::OK, data)
}

/// 201 with the success envelope.
pub(crate) fn created<T: Serialize>(data: T) -> Response {
    respond(StatusCode::CREATED, data)
}

fn respond<T: Serialize>(status: StatusCode, data: T) -> Response {
    (
        status,
        Json(Envelope {
            success: true,
            data,
        }),
    )
        .into_response()
}

/// An inline PDF download.
pub(crate) fn pdf(filename: &str, body: Bytes) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_owned()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        "{} {} {} {}ms",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

pub fn router(state: SharedState) -> Router {
    let max_photo_bytes = state.max_photo_bytes;

    let api = Router::new()
        .route("/health", get(health))
        .route("/products", get(products::list_products))
        .route("/products/{sku}", get(products::get_product))
        .route("/products/{sku}/datasheet", get(products::product_datasheet))
        .route(
            "/quotations",
            post(quotations::create_quotation).get(quotations::list_quotations),
        )
        .route("/quotations/{id}", get(quotations::get_quotation))
        .route("/quotations/{id}/status", patch(quotations::update_status))
        .route("/quotations/{id}/pdf", get(documents::quotation_pdf))
        .route("/quotations/{id}/send", post(documents::send_quotation))
        .route(
            "/quotations/{id}/photos",
            post(documents::upload_photo)
                .layer(DefaultBodyLimit::max(max_photo_bytes))
                .get(documents::list_photos),
        )
        .route("/quotations/{id}/photo-addendum", get(documents::photo_addendum))
        .route("/quotations/{id}/invoice", post(invoices::create_invoice))
        .route("/quotations/{id}/payments", get(quotations::list_payments))
        .route("/invoices/{invoice_id}", get(invoices::get_invoice))
        .route("/webhooks/mercury", post(invoices::mercury_webhook));

    Router::new()
        .nest(API_PREFIX, api)
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

/// Serve until Ctrl+C or SIGTERM, then finish in-flight requests.
pub async fn serve(state: SharedState, address: SocketAddr) -> Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Listening on http://{}{}", address, API_PREFIX);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM, shutting down");
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
