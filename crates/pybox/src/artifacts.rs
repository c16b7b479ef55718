//! Routing of sandbox artifacts to their final location.
//!
//! Inside the container, the output directory is mounted at
//! `/mnt/data`, so that is the path the model sees in notebook
//! outputs. Before an output is handed back to the model, every
//! sandbox path in it is rewritten to something reachable from
//! outside the container: a signed blob URL when storage is
//! configured, the host path of the mounted directory otherwise.

use std::fmt::{self, Display};
use std::path::PathBuf;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures_util::future::try_join_all;
use pybox_storage::{BlobClient, BlobKind};
use serde_json::Value;

/// Where the output directory is mounted inside the container.
pub const SANDBOX_MOUNT: &str = "/mnt/data";

/// An error occurred while routing an artifact.
#[derive(Debug)]
pub struct ArtifactError {
    message: String,
}

impl ArtifactError {
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

impl Display for ArtifactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ArtifactError {}

impl From<pybox_storage::Error> for ArtifactError {
    fn from(err: pybox_storage::Error) -> Self {
        Self::new(err.message())
    }
}

/// Rewrites sandbox paths in notebook outputs to locations the user
/// can actually reach.
#[derive(Clone, Debug)]
pub struct ArtifactRouter {
    output_dir: PathBuf,
    blob: Option<BlobClient>,
}

impl ArtifactRouter {
    /// Creates a router. When `blob` is `None`, artifacts stay on the
    /// local disk and their host paths are returned instead of URLs.
    #[inline]
    pub fn new(output_dir: PathBuf, blob: Option<BlobClient>) -> Self {
        Self { output_dir, blob }
    }

    /// Routes one extracted notebook output.
    ///
    /// Strings and arrays of strings are scanned for sandbox paths;
    /// matching entries are rewritten in place, everything else passes
    /// through unchanged. Array shape and order are preserved.
    pub async fn route_value(
        &self,
        value: Value,
    ) -> Result<Value, ArtifactError> {
        match value {
            Value::String(text) => {
                Ok(Value::String(self.route_text(text).await?))
            }
            Value::Array(items) => {
                let routed =
                    try_join_all(items.into_iter().map(|item| async {
                        match item {
                            Value::String(text) => Ok(Value::String(
                                self.route_text(text).await?,
                            )),
                            other => Ok::<_, ArtifactError>(other),
                        }
                    }))
                    .await?;
                Ok(Value::Array(routed))
            }
            other => {
                warn!("unroutable output value: {other}");
                Ok(other)
            }
        }
    }

    /// Routes the base64 PNG payloads of a run, in order.
    ///
    /// With blob storage the decoded images are uploaded directly and
    /// signed URLs come back; otherwise they are written to the output
    /// directory as `image_{index}.png` and the host paths come back.
    pub async fn route_images(
        &self,
        images: Vec<String>,
    ) -> Result<Vec<String>, ArtifactError> {
        if let Some(blob) = &self.blob {
            return try_join_all(images.iter().map(|payload| async {
                Ok(blob
                    .upload_base64_image(payload, BlobKind::Image)
                    .await?)
            }))
            .await;
        }

        let mut paths = Vec::with_capacity(images.len());
        for (index, payload) in images.iter().enumerate() {
            let cleaned = payload
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect::<String>();
            let data = BASE64.decode(cleaned).map_err(|err| {
                ArtifactError::new(format!(
                    "invalid base64 image payload: {err}"
                ))
            })?;
            let path = self.output_dir.join(format!("image_{index}.png"));
            tokio::fs::write(&path, data).await.map_err(|err| {
                ArtifactError::new(format!(
                    "failed to write {}: {err}",
                    path.display()
                ))
            })?;
            paths.push(path.to_string_lossy().into_owned());
        }
        Ok(paths)
    }

    async fn route_text(&self, text: String) -> Result<String, ArtifactError> {
        if !refers_to_sandbox(&text) {
            return Ok(text);
        }

        let local = self.resolve_local(&text);
        match &self.blob {
            Some(blob) => Ok(blob.upload_file(&local).await?),
            None => Ok(local.to_string_lossy().into_owned()),
        }
    }

    /// Maps a sandbox path back to the host path of the mounted output
    /// directory.
    fn resolve_local(&self, text: &str) -> PathBuf {
        let path = extract_quoted_path(text);
        let relative = path
            .strip_prefix(SANDBOX_MOUNT)
            .unwrap_or(path)
            .trim_start_matches('/');
        self.output_dir.join(relative)
    }
}

/// Returns whether an output string refers to a file in the sandbox.
///
/// Outputs like `repr` often quote the path, so a leading quote is
/// accepted as well.
fn refers_to_sandbox(text: &str) -> bool {
    text.starts_with(SANDBOX_MOUNT)
        || text.starts_with(&format!("'{SANDBOX_MOUNT}"))
}

/// Extracts the first single-quoted substring, or the input itself
/// when nothing is quoted.
fn extract_quoted_path(text: &str) -> &str {
    let Some(start) = text.find('\'') else {
        return text;
    };
    let rest = &text[start + 1..];
    match rest.find('\'') {
        Some(end) => &rest[..end],
        None => text,
    }
}
