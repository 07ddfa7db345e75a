// Copyright (c) 2021 Tangram Robotics Inc. - All Rights Reserved
// Unauthorized copying of this file, via any medium is strictly prohibited
// Proprietary and confidential
// ----------------------------

//! Quotation photos and catalog images in S3-compatible object storage.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use log::debug;
use rusoto_core::{request, Region};
use rusoto_credential::{AwsCredentials, StaticProvider};
use rusoto_s3::util::{PreSignedRequest, PreSignedRequestOption};
use rusoto_s3::{GetObjectRequest, ListObjectsV2Request, PutObjectRequest, S3Client, S3};
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use crate::app_config::BucketConfig;

/// Longest filename kept in a photo key (after sanitizing).
const MAX_FILENAME_CHARS: usize = 100;

#[derive(Clone)]
pub struct StorageConfig {
    client: S3Client,
    // Needed separately from the client's provider to sign URLs locally.
    credentials: AwsCredentials,
    bucket: String,
    region: Region,
    presign_expiry: Duration,
}

impl StorageConfig {
    pub fn new(settings: &BucketConfig) -> Result<StorageConfig> {
        let region = match &settings.endpoint {
            Some(endpoint) => Region::Custom {
                name: settings.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => Region::from_str(&settings.region)
                .with_context(|| format!("Unknown storage region: {}", settings.region))?,
        };
        let dispatcher = request::HttpClient::new()?;
        // credential docs: https://github.com/rusoto/rusoto/blob/master/AWS-CREDENTIALS.md
        let provider =
            StaticProvider::new_minimal(settings.access_key.clone(), settings.secret_key.clone());
        let client = S3Client::new_with(dispatcher, provider, region.clone());

        Ok(StorageConfig {
            client,
            credentials: AwsCredentials::new(
                settings.access_key.clone(),
                settings.secret_key.clone(),
                None,
                None,
            ),
            bucket: settings.bucket.clone(),
            region,
            presign_expiry: Duration::from_secs(settings.presign_seconds),
        })
    }

    /// Use an already-built client (e.g. one with a mock dispatcher).
    pub fn with_client(
        client: S3Client,
        credentials: AwsCredentials,
        bucket: String,
        region: Region,
        presign_expiry: Duration,
    ) -> StorageConfig {
        StorageConfig {
            client,
            credentials,
            bucket,
            region,
            presign_expiry,
        }
    }
}

/// A downloaded object.
#[derive(Debug)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

fn photos_prefix(quotation_id: Uuid) -> String {
    format!("quotations/{}/photos/", quotation_id)
}

/// Storage keys must be valid UTF-8 and are used in URLs, so keep filenames
/// to a conservative character set.
fn sanitize_filename(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .take(MAX_FILENAME_CHARS)
        .collect();
    let trimmed = sanitized.trim_matches(|c| c == '.' || c == '-');
    if trimmed.is_empty() {
        "photo".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Build a unique key for a quotation photo. The random prefix keeps two
/// uploads of `IMG_0001.jpg` from overwriting each other.
pub fn photo_key(quotation_id: Uuid, filename: &str) -> String {
    format!(
        "{}{}-{}",
        photos_prefix(quotation_id),
        Uuid::new_v4().simple(),
        sanitize_filename(filename)
    )
}

/// The original (sanitized) filename of a photo key.
pub fn filename_from_key(key: &str) -> &str {
    let name = key.rsplit('/').next().unwrap_or(key);
    // 32 hex chars of the uuid plus the dash
    match name.get(33..) {
        Some(rest) if name.as_bytes().get(32) == Some(&b'-') => rest,
        _ => name,
    }
}

/// Upload a photo for a quotation and return its key.
pub async fn upload_photo(
    config: &StorageConfig,
    quotation_id: Uuid,
    filename: &str,
    content_type: &str,
    body: Bytes,
) -> Result<String> {
    let key = photo_key(quotation_id, filename);
    let content_md5 = base64::encode(md5::compute(&body).0);

    let req = PutObjectRequest {
        bucket: config.bucket.clone(),
        key: key.clone(),
        content_length: Some(body.len() as i64),
        content_md5: Some(content_md5),
        content_type: Some(content_type.to_owned()),
        body: Some(body.to_vec().into()),
        ..Default::default()
    };
    debug!("making upload_photo request for key {}", key);
    let resp = config.client.put_object(req).await?;
    debug!("upload_photo response {:?}", resp);
    Ok(key)
}

/// Keys of all photos uploaded for a quotation, sorted.
pub async fn list_photos(config: &StorageConfig, quotation_id: Uuid) -> Result<Vec<String>> {
    let prefix = photos_prefix(quotation_id);
    let mut keys = Vec::new();
    let mut continuation_token = None;

    loop {
        let req = ListObjectsV2Request {
            bucket: config.bucket.clone(),
            prefix: Some(prefix.clone()),
            continuation_token: continuation_token.take(),
            ..Default::default()
        };
        debug!("making list_photos request {:?}", req);
        let resp = config.client.list_objects_v2(req).await?;

        keys.extend(
            resp.contents
                .unwrap_or_default()
                .into_iter()
                .filter_map(|object| object.key),
        );

        match (resp.is_truncated, resp.next_continuation_token) {
            (Some(true), Some(token)) => continuation_token = Some(token),
            _ => break,
        }
    }

    keys.sort();
    Ok(keys)
}

/// A time-limited GET URL for the object. Signed locally, no request is made.
pub fn presigned_url(config: &StorageConfig, key: &str) -> String {
    let req = GetObjectRequest {
        bucket: config.bucket.clone(),
        key: key.to_owned(),
        ..Default::default()
    };
    let options = PreSignedRequestOption {
        expires_in: config.presign_expiry,
    };
    req.get_presigned_url(&config.region, &config.credentials, &options)
}

/// Fetch an object's contents.
pub async fn download(config: &StorageConfig, key: &str) -> Result<StoredObject> {
    let req = GetObjectRequest {
        bucket: config.bucket.clone(),
        key: key.to_owned(),
        ..Default::default()
    };
    debug!("making download request {:?}", req);

    let resp = config.client.get_object(req).await?;
    let content_type = resp.content_type;
    let body = resp.body.ok_or_else(|| anyhow!("Empty object! {}", key))?;

    let mut data = Vec::new();
    body.into_async_read().read_to_end(&mut data).await?;
    debug!("downloaded {} bytes from {}", data.len(), key);

    Ok(StoredObject { data, content_type })
}
