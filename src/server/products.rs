//! Catalog routes: listing, detail, and PDF datasheets.

use std::str::FromStr;

use axum::extract::State;
use axum::response::Response;
use log::warn;
use serde::{Deserialize, Serialize};
use strum::VariantNames;

use super::error::ApiError;
use super::extract::{PathParam, QueryParams};
use super::{ok, pdf, AppState, SharedState};
use crate::core::api::{renderer, storage};
use crate::core::catalog::{Category, Product};
use crate::core::templates;

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    category: Option<String>,
}

#[derive(Debug, Serialize)]
struct SpecLine {
    label: &'static str,
    value: String,
}

/// A product plus its specifications formatted for display.
#[derive(Debug, Serialize)]
struct ProductView<'a> {
    #[serde(flatten)]
    product: &'a Product,
    spec_lines: Vec<SpecLine>,
}

impl<'a> ProductView<'a> {
    fn new(product: &'a Product) -> Self {
        let spec_lines = product
            .spec_lines()
            .into_iter()
            .map(|(label, value)| SpecLine { label, value })
            .collect();
        ProductView {
            product,
            spec_lines,
        }
    }
}

fn find_product<'a>(state: &'a AppState, sku: &str) -> Result<&'a Product, ApiError> {
    state
        .catalog
        .get(sku)
        .ok_or_else(|| ApiError::NotFound(format!("Product not found: {}", sku)))
}

pub async fn list_products(
    State(state): State<SharedState>,
    QueryParams(query): QueryParams<ProductQuery>,
) -> Result<Response, ApiError> {
    let category = match query.category.as_deref() {
        Some(name) => Some(Category::from_str(name).map_err(|_| {
            ApiError::BadRequest(format!(
                "Unknown category: {}. Expected one of: {}",
                name,
                Category::VARIANTS.join(", ")
            ))
        })?),
        None => None,
    };

    let products: Vec<ProductView> = state
        .catalog
        .list(category)
        .into_iter()
        .map(ProductView::new)
        .collect();
    Ok(ok(products))
}

pub async fn get_product(
    State(state): State<SharedState>,
    PathParam(sku): PathParam<String>,
) -> Result<Response, ApiError> {
    let product = find_product(&state, &sku)?;
    Ok(ok(ProductView::new(product)))
}

pub async fn product_datasheet(
    State(state): State<SharedState>,
    PathParam(sku): PathParam<String>,
) -> Result<Response, ApiError> {
    let product = find_product(&state, &sku)?;

    // A missing photo shouldn't block the datasheet.
    let image = match &product.image_key {
        Some(key) => match storage::download(&state.storage, key).await {
            Ok(object) => {
                let content_type = object.content_type.as_deref().unwrap_or("image/jpeg");
                Some(templates::data_uri(content_type, &object.data))
            }
            Err(e) => {
                warn!("Datasheet for {} rendered without image {}: {:#}", sku, key, e);
                None
            }
        },
        None => None,
    };

    let html = templates::datasheet_html(product, image.as_deref());
    let body = renderer::render_pdf(&state.renderer, html).await?;
    Ok(pdf(&format!("{}-datasheet.pdf", product.sku), body))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use httpmock::{
        Method::{GET, POST},
        MockServer,
    };
    use tower::ServiceExt;

    use super::super::tests::{call, get, test_state};
    use super::*;

    #[tokio::test]
    async fn test_list_products_by_category() {
        let server = MockServer::start();
        let (status, body) =
            call(test_state(&server), get("/products?category=mini_split")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let skus: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["sku"].as_str().unwrap())
            .collect();
        assert_eq!(skus, vec!["DS-MS-12K", "DS-MS-24K"]);
    }

    #[tokio::test]
    async fn test_list_products_unknown_category() {
        let server = MockServer::start();
        let (status, body) = call(test_state(&server), get("/products?category=furnace")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Unknown category: furnace. Expected one of: evaporative_cooler"));
    }

    #[tokio::test]
    async fn test_get_product_with_spec_lines() {
        let server = MockServer::start();
        let (status, body) = call(test_state(&server), get("/products/DS-MS-24K")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["category"], "mini_split");
        assert_eq!(
            body["data"]["spec_lines"][0],
            serde_json::json!({"label": "Cooling Capacity", "value": "24,000 BTU/h"})
        );
    }

    #[tokio::test]
    async fn test_get_product_not_found() {
        let server = MockServer::start();
        let (status, body) = call(test_state(&server), get("/products/DS-NOPE")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Product not found: DS-NOPE");
    }

    #[tokio::test]
    async fn test_datasheet_embeds_image() {
        let server = MockServer::start();
        let image = server.mock(|when, then| {
            when.method(GET).path("/test-bucket/catalog/DS-MS-24K.jpg");
            then.status(200)
                .header("Content-Type", "image/png")
                .body("png");
        });
        let render = server.mock(|when, then| {
            when.method(POST)
                .path("/forms/chromium/convert/html")
                .body_contains("data:image/png;base64,cG5n")
                .body_contains("Saguaro 24K");
            then.status(200).body("%PDF-1.7 datasheet");
        });

        let response = super::super::router(test_state(&server))
            .oneshot(get("/products/DS-MS-24K/datasheet"))
            .await
            .unwrap();

        image.assert();
        render.assert();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-disposition"],
            "inline; filename=\"DS-MS-24K-datasheet.pdf\""
        );
    }

    #[tokio::test]
    async fn test_datasheet_without_image_when_download_fails() {
        let server = MockServer::start();
        let image = server.mock(|when, then| {
            when.method(GET).path("/test-bucket/catalog/DS-EC-4500.jpg");
            then.status(404).body("NoSuchKey");
        });
        let render = server.mock(|when, then| {
            when.method(POST).path("/forms/chromium/convert/html");
            then.status(200).body("%PDF-1.7 datasheet");
        });

        let (status, _) = call(test_state(&server), get("/products/DS-EC-4500/datasheet")).await;

        image.assert();
        render.assert();
        assert_eq!(status, StatusCode::OK);
    }
}
