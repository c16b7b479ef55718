//! An adapter over the Azure Blob Storage REST surface.
//!
//! Artifacts produced by a notebook run are uploaded as block blobs and
//! handed back to the caller as read-only signed URLs with a fixed
//! one-hour validity. All requests are authorized with service SAS
//! tokens signed locally by [`SharedKeyCredential`]; nothing here
//! retries, errors are surfaced to the caller as-is.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod sas;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::path::Path;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use reqwest::{Client, StatusCode, header};

pub use sas::{SAS_VERSION, SharedKeyCredential, blob_sas_query};

/// How long a read URL stays valid after issuance.
pub const READ_URL_VALIDITY: Duration = Duration::from_secs(3600);

// Upload and delete tokens don't leave the process, keep them short.
const REQUEST_SAS_VALIDITY: Duration = Duration::from_secs(600);

/// Error produced by the storage adapter.
#[derive(Debug)]
pub struct Error {
    message: String,
}

impl Error {
    #[inline]
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

/// The semantic category of an uploaded artifact.
///
/// Only used as the blob name prefix, there is no behavioral branching
/// on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlobKind {
    /// A file produced by the execution.
    File,
    /// A rendered image.
    Image,
    /// A folder archive.
    Folder,
}

impl Display for BlobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobKind::File => write!(f, "file"),
            BlobKind::Image => write!(f, "image"),
            BlobKind::Folder => write!(f, "folder"),
        }
    }
}

/// Storage options as provided by the environment.
///
/// All fields may be empty; an empty connection string disables blob
/// routing entirely instead of failing.
#[derive(Clone, Debug, Default)]
pub struct StorageConfig {
    /// The storage connection string.
    pub connection_string: String,
    /// The blob container artifacts are uploaded to.
    pub container: String,
    /// The storage account name, for SAS signing.
    pub account_name: String,
    /// The base64-encoded storage account key, for SAS signing.
    pub account_key: String,
}

impl StorageConfig {
    /// Returns whether a storage backend is configured at all.
    ///
    /// Pure predicate, performs no I/O.
    #[inline]
    pub fn is_available(&self) -> bool {
        !self.connection_string.is_empty()
    }
}

/// Account endpoint information carried by a connection string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// The account name.
    pub account_name: String,
    /// The base64-encoded account key.
    pub account_key: String,
    /// The blob endpoint, without a trailing slash.
    pub endpoint: String,
}

/// Parses an `AccountName=...;AccountKey=...` style connection string.
pub fn parse_connection_string(raw: &str) -> Result<ConnectionInfo, Error> {
    let mut account_name = None;
    let mut account_key = None;
    let mut endpoint_suffix = "core.windows.net";
    let mut blob_endpoint = None;

    for pair in raw.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let Some((key, value)) = pair.split_once('=') else {
            return Err(Error::new(format!(
                "malformed connection string segment: {pair}"
            )));
        };
        match key {
            "AccountName" => account_name = Some(value.to_owned()),
            // The account key is itself base64 and may contain `=`,
            // which `split_once` has already taken care of.
            "AccountKey" => account_key = Some(value.to_owned()),
            "EndpointSuffix" => endpoint_suffix = value,
            "BlobEndpoint" => {
                blob_endpoint = Some(value.trim_end_matches('/').to_owned());
            }
            _ => {}
        }
    }

    let account_name = account_name
        .ok_or_else(|| Error::new("connection string has no AccountName"))?;
    let account_key = account_key
        .ok_or_else(|| Error::new("connection string has no AccountKey"))?;
    let endpoint = blob_endpoint.unwrap_or_else(|| {
        format!("https://{account_name}.blob.{endpoint_suffix}")
    });

    Ok(ConnectionInfo {
        account_name,
        account_key,
        endpoint,
    })
}

/// A client for one blob container.
#[derive(Clone, Debug)]
pub struct BlobClient {
    http: Client,
    endpoint: String,
    container: String,
    credential: SharedKeyCredential,
}

impl BlobClient {
    /// Creates a client from the environment-provided configuration.
    ///
    /// The endpoint comes from the connection string; the signing
    /// credential prefers the explicitly configured account name/key
    /// pair and falls back to the pair embedded in the connection
    /// string.
    pub fn from_config(config: &StorageConfig) -> Result<Self, Error> {
        if !config.is_available() {
            return Err(Error::new("no storage connection string configured"));
        }
        if config.container.is_empty() {
            return Err(Error::new("no blob container configured"));
        }

        let info = parse_connection_string(&config.connection_string)?;
        let credential = if !config.account_name.is_empty()
            && !config.account_key.is_empty()
        {
            SharedKeyCredential::new(&config.account_name, &config.account_key)?
        } else {
            SharedKeyCredential::new(&info.account_name, &info.account_key)?
        };

        Ok(Self {
            http: Client::new(),
            endpoint: info.endpoint,
            container: config.container.clone(),
            credential,
        })
    }

    /// Uploads a local file and returns a read-only signed URL for it.
    pub async fn upload_file(&self, path: &Path) -> Result<String, Error> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("artifact");
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        let blob_name = format!(
            "{}-{}-{}{}",
            BlobKind::File,
            stem,
            Utc::now().timestamp_millis(),
            extension
        );

        let data = tokio::fs::read(path).await.map_err(|err| {
            Error::new(format!("failed to read {}: {err}", path.display()))
        })?;
        self.put_blob(&blob_name, data, "application/octet-stream")
            .await?;
        Ok(self.read_url(&blob_name))
    }

    /// Uploads raw bytes and returns a read-only signed URL.
    pub async fn upload_bytes(
        &self,
        data: Vec<u8>,
        kind: BlobKind,
        extension: &str,
        content_type: &str,
    ) -> Result<String, Error> {
        let blob_name = format!(
            "{kind}-{}.{extension}",
            Utc::now().timestamp_millis()
        );
        self.put_blob(&blob_name, data, content_type).await?;
        Ok(self.read_url(&blob_name))
    }

    /// Decodes a base64 PNG payload and uploads it, without touching
    /// the local filesystem.
    pub async fn upload_base64_image(
        &self,
        base64_data: &str,
        kind: BlobKind,
    ) -> Result<String, Error> {
        // Notebook payloads may carry line breaks from the on-disk
        // format; the base64 alphabet has none, so strip whitespace.
        let cleaned = base64_data
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect::<String>();
        let data = BASE64.decode(cleaned).map_err(|err| {
            Error::new(format!("invalid base64 image payload: {err}"))
        })?;
        self.upload_bytes(data, kind, "png", "image/png").await
    }

    /// Deletes a blob by name. Best effort in the sense that nothing is
    /// retried, but errors are surfaced to the caller.
    pub async fn delete_blob(&self, blob_name: &str) -> Result<(), Error> {
        let url = self.signed_url(blob_name, "d", REQUEST_SAS_VALIDITY);
        let resp = self
            .http
            .delete(url)
            .header("x-ms-version", SAS_VERSION)
            .send()
            .await
            .map_err(|err| Error::new(format!("delete failed: {err}")))?;

        let status = resp.status();
        if !status.is_success() && status != StatusCode::ACCEPTED {
            return Err(Error::new(format!(
                "delete of {blob_name} failed with {status}"
            )));
        }
        Ok(())
    }

    async fn put_blob(
        &self,
        blob_name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), Error> {
        info!("uploading blob: {blob_name}");

        let url = self.signed_url(blob_name, "cw", REQUEST_SAS_VALIDITY);
        let resp = self
            .http
            .put(url)
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-version", SAS_VERSION)
            .header(header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .map_err(|err| Error::new(format!("upload failed: {err}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::new(format!(
                "upload of {blob_name} failed with {status}: {body}"
            )));
        }
        Ok(())
    }

    /// Builds the read-only URL handed back to callers, valid for
    /// [`READ_URL_VALIDITY`] from now.
    fn read_url(&self, blob_name: &str) -> String {
        self.signed_url(blob_name, "r", READ_URL_VALIDITY)
    }

    fn signed_url(
        &self,
        blob_name: &str,
        permissions: &str,
        validity: Duration,
    ) -> String {
        let start = Utc::now();
        let expiry = start
            + chrono::Duration::from_std(validity)
                .unwrap_or(chrono::Duration::zero());
        let query = blob_sas_query(
            &self.credential,
            &self.container,
            blob_name,
            permissions,
            start,
            expiry,
        );
        format!(
            "{}/{}/{}?{}",
            self.endpoint, self.container, blob_name, query
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "c2VjcmV0LWtleQ==";

    fn test_config() -> StorageConfig {
        StorageConfig {
            connection_string: format!(
                "DefaultEndpointsProtocol=https;AccountName=testaccount;\
                 AccountKey={TEST_KEY};EndpointSuffix=core.windows.net"
            ),
            container: "artifacts".to_owned(),
            account_name: String::new(),
            account_key: String::new(),
        }
    }

    #[test]
    fn test_availability_predicate() {
        assert!(!StorageConfig::default().is_available());
        assert!(test_config().is_available());
    }

    #[test]
    fn test_parse_connection_string() {
        let info = parse_connection_string(
            &test_config().connection_string,
        )
        .unwrap();
        assert_eq!(info.account_name, "testaccount");
        assert_eq!(info.account_key, TEST_KEY);
        assert_eq!(
            info.endpoint,
            "https://testaccount.blob.core.windows.net"
        );
    }

    #[test]
    fn test_parse_connection_string_with_blob_endpoint() {
        let info = parse_connection_string(&format!(
            "BlobEndpoint=http://127.0.0.1:10000/devstoreaccount1/;\
             AccountName=devstoreaccount1;AccountKey={TEST_KEY}"
        ))
        .unwrap();
        assert_eq!(
            info.endpoint,
            "http://127.0.0.1:10000/devstoreaccount1"
        );
    }

    #[test]
    fn test_parse_connection_string_missing_fields() {
        assert!(parse_connection_string("AccountName=only").is_err());
        assert!(parse_connection_string("garbage").is_err());
    }

    #[test]
    fn test_client_requires_configuration() {
        assert!(BlobClient::from_config(&StorageConfig::default()).is_err());

        let mut config = test_config();
        config.container = String::new();
        assert!(BlobClient::from_config(&config).is_err());
    }

    #[test]
    fn test_read_url_shape() {
        let client = BlobClient::from_config(&test_config()).unwrap();
        let url = client.read_url("image-42.png");
        assert!(url.starts_with(
            "https://testaccount.blob.core.windows.net/artifacts/image-42.png?"
        ));
        assert!(url.contains("sp=r"));
        assert!(url.contains("sr=b"));
    }

    #[test]
    fn test_blob_kind_prefixes() {
        assert_eq!(BlobKind::File.to_string(), "file");
        assert_eq!(BlobKind::Image.to_string(), "image");
        assert_eq!(BlobKind::Folder.to_string(), "folder");
    }
}
