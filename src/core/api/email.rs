// Copyright (c) 2021 Tangram Robotics Inc. - All Rights Reserved
// Unauthorized copying of this file, via any medium is strictly prohibited
// Proprietary and confidential
// ----------------------------

//! Outgoing email through an HTTP email API.

use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info};
use reqwest::{header, Url};
use serde::{Deserialize, Serialize};

use crate::core::api::database::with_trailing_slash;

#[derive(Clone, Debug)]
pub struct EmailApiConfig {
    pub base_url: Url,
    /// Sender, e.g. `Desert Solutions <quotes@example.com>`.
    pub from: String,
    pub client: reqwest::Client,
}

impl EmailApiConfig {
    pub fn new_with_params(base_url: Url, api_key: &str, from: String, timeout: u64) -> Result<Self> {
        let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"),);
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", api_key))?,
        );
        Ok(Self {
            client: reqwest::Client::builder()
                .user_agent(user_agent)
                .default_headers(headers)
                .timeout(Duration::from_secs(timeout))
                .build()?,
            from,
            base_url: with_trailing_slash(base_url),
        })
    }

    pub fn new(base_url: Url, api_key: &str, from: String) -> Result<Self> {
        Self::new_with_params(base_url, api_key, from, 30)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Attachment {
    pub filename: String,
    /// Base64-encoded file contents.
    pub content: String,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, data: &[u8]) -> Self {
        Self {
            filename: filename.into(),
            content: base64::encode(data),
        }
    }
}

/// An email with both HTML and plain-text bodies.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OutgoingEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    /// Sent as `[]` when there are none.
    pub attachments: Vec<Attachment>,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    #[serde(flatten)]
    email: &'a OutgoingEmail,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

/// Send an email and return the provider's message id.
pub async fn send_email(configuration: &EmailApiConfig, email: &OutgoingEmail) -> Result<String> {
    let url = configuration.base_url.join("emails").context("Invalid email URL")?;
    debug!("sending \"{}\" to {:?}", email.subject, email.to);

    let response = configuration
        .client
        .post(url)
        .json(&SendRequest {
            from: &configuration.from,
            email,
        })
        .send()
        .await?;
    response.error_for_status_ref()?;

    let content = response.text().await?;
    debug!("content: {}", content);
    let sent: SendResponse = serde_json::from_str(&content)
        .with_context(|| format!("JSON from Email API was malformed: {}", &content))?;

    info!("Sent email {} \"{}\" to {:?}", sent.id, email.subject, email.to);
    Ok(sent.id)
}

#[cfg(test)]
mod tests {
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    use super::*;

    fn config(server: &MockServer) -> EmailApiConfig {
        EmailApiConfig::new_with_params(
            Url::parse(&server.base_url()).unwrap(),
            "EMAIL-KEY",
            "Desert Solutions <quotes@example.com>".to_owned(),
            10,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_send_email_with_attachment() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .header("Authorization", "Bearer EMAIL-KEY")
                .json_body(json!({
                    "from": "Desert Solutions <quotes@example.com>",
                    "to": ["rosa@example.com"],
                    "subject": "Your quotation",
                    "html": "<p>Hi</p>",
                    "text": "Hi",
                    "attachments": [{"filename": "quote.pdf", "content": "JVBERg=="}]
                }))
                .path("/emails");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!({"id": "msg_1"}));
        });

        let email = OutgoingEmail {
            to: vec!["rosa@example.com".to_owned()],
            subject: "Your quotation".to_owned(),
            html: "<p>Hi</p>".to_owned(),
            text: "Hi".to_owned(),
            reply_to: None,
            attachments: vec![Attachment::new("quote.pdf", b"%PDF")],
        };
        let id = send_email(&config(&server), &email).await.unwrap();

        mock.assert();
        assert_eq!(id, "msg_1");
    }

    #[tokio::test]
    async fn test_send_email_without_attachments() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .json_body(json!({
                    "from": "Desert Solutions <quotes@example.com>",
                    "to": ["rosa@example.com"],
                    "subject": "Payment received",
                    "html": "<p>Thanks</p>",
                    "text": "Thanks",
                    "reply_to": "sales@example.com",
                    "attachments": []
                }))
                .path("/emails");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!({"id": "msg_2"}));
        });

        let email = OutgoingEmail {
            to: vec!["rosa@example.com".to_owned()],
            subject: "Payment received".to_owned(),
            html: "<p>Thanks</p>".to_owned(),
            text: "Thanks".to_owned(),
            reply_to: Some("sales@example.com".to_owned()),
            attachments: Vec::new(),
        };
        let id = send_email(&config(&server), &email).await.unwrap();

        mock.assert();
        assert_eq!(id, "msg_2");
    }

    #[tokio::test]
    async fn test_send_email_rejected() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/emails");
            then.status(422)
                .header("Content-Type", "application/json")
                .json_body(json!({"message": "Invalid `to` field"}));
        });

        let email = OutgoingEmail {
            to: vec!["nope".to_owned()],
            subject: "s".to_owned(),
            html: String::new(),
            text: String::new(),
            reply_to: None,
            attachments: vec![],
        };
        let e = send_email(&config(&server), &email).await.unwrap_err();

        mock.assert();
        assert_eq!(
            e.downcast_ref::<reqwest::Error>().unwrap().status(),
            Some(reqwest::StatusCode::UNPROCESSABLE_ENTITY)
        );
    }
}
