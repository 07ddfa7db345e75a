// Copyright (c) 2021 Tangram Robotics Inc. - All Rights Reserved
// Unauthorized copying of this file, via any medium is strictly prohibited
// Proprietary and confidential
// ----------------------------

//! HTML-to-PDF rendering through a Gotenberg-compatible service.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use log::debug;
use reqwest::multipart::{Form, Part};
use reqwest::Url;

use crate::core::api::database::with_trailing_slash;

const PDF_MAGIC: &[u8] = b"%PDF";

#[derive(Clone, Debug)]
pub struct RendererApiConfig {
    pub base_url: Url,
    pub client: reqwest::Client,
}

impl RendererApiConfig {
    pub fn new_with_params(base_url: Url, timeout: u64) -> Result<Self> {
        let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"),);
        Ok(Self {
            client: reqwest::Client::builder()
                .user_agent(user_agent)
                .timeout(Duration::from_secs(timeout))
                .build()?,
            base_url: with_trailing_slash(base_url),
        })
    }

    /// Rendering pages with embedded photos is slow, so allow a full minute.
    pub fn new(base_url: Url) -> Result<Self> {
        Self::new_with_params(base_url, 60)
    }
}

/// Render an HTML document to a US Letter PDF.
///
/// # Errors
///
/// Returns an error if the renderer is unreachable, returns a non-200
/// response, or returns something that isn't a PDF.
pub async fn render_pdf(configuration: &RendererApiConfig, html: String) -> Result<Bytes> {
    let url = configuration
        .base_url
        .join("forms/chromium/convert/html")
        .context("Invalid renderer URL")?;
    debug!("rendering {} bytes of html via {}", html.len(), url);

    let index = Part::bytes(html.into_bytes())
        .file_name("index.html")
        .mime_str("text/html")?;
    let form = Form::new()
        .part("files", index)
        .text("paperWidth", "8.5")
        .text("paperHeight", "11")
        .text("marginTop", "0.5")
        .text("marginBottom", "0.5")
        .text("printBackground", "true");

    let response = configuration.client.post(url).multipart(form).send().await?;
    response.error_for_status_ref()?;
    debug!("status: {}", response.status());

    let pdf = response.bytes().await?;
    if !pdf.starts_with(PDF_MAGIC) {
        bail!("Renderer returned {} bytes that aren't a PDF", pdf.len());
    }
    Ok(pdf)
}

#[cfg(test)]
mod tests {
    use httpmock::{Method::POST, MockServer};

    use super::*;

    #[tokio::test]
    async fn test_render_pdf_success() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/forms/chromium/convert/html")
                .body_contains("filename=\"index.html\"")
                .body_contains("<h1>Quote</h1>");
            then.status(200)
                .header("Content-Type", "application/pdf")
                .body("%PDF-1.7 fake");
        });

        let config = RendererApiConfig::new_with_params(Url::parse(&server.base_url()).unwrap(), 10)
            .unwrap();
        let pdf = render_pdf(&config, "<h1>Quote</h1>".to_owned()).await.unwrap();

        mock.assert();
        assert_eq!(&pdf[..], b"%PDF-1.7 fake");
    }

    #[tokio::test]
    async fn test_render_pdf_not_a_pdf() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/forms/chromium/convert/html");
            then.status(200).body("<html>error page</html>");
        });

        let config = RendererApiConfig::new_with_params(Url::parse(&server.base_url()).unwrap(), 10)
            .unwrap();
        let e = render_pdf(&config, "<p></p>".to_owned())
            .await
            .unwrap_err()
            .to_string();

        mock.assert();
        assert_eq!(e, "Renderer returned 23 bytes that aren't a PDF");
    }

    #[tokio::test]
    async fn test_render_pdf_renderer_error() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/forms/chromium/convert/html");
            then.status(503).body("busy");
        });

        let config = RendererApiConfig::new_with_params(Url::parse(&server.base_url()).unwrap(), 10)
            .unwrap();
        let e = render_pdf(&config, "<p></p>".to_owned()).await.unwrap_err();

        mock.assert();
        assert_eq!(
            e.downcast_ref::<reqwest::Error>().unwrap().status(),
            Some(reqwest::StatusCode::SERVICE_UNAVAILABLE)
        );
    }
}
