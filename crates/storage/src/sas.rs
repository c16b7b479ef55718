use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::Error;

type HmacSha256 = Hmac<Sha256>;

/// The service version the SAS tokens are signed against.
pub const SAS_VERSION: &str = "2020-12-06";

/// The storage account key pair used to sign SAS tokens.
///
/// This is a separate credential path from the connection-string
/// endpoint: the key is the base64-encoded account key, decoded once at
/// construction time.
#[derive(Clone)]
pub struct SharedKeyCredential {
    account: String,
    key: Vec<u8>,
}

impl SharedKeyCredential {
    /// Creates a credential from an account name and its base64-encoded
    /// key.
    pub fn new(
        account: impl Into<String>,
        base64_key: &str,
    ) -> Result<Self, Error> {
        let key = BASE64.decode(base64_key).map_err(|err| {
            Error::new(format!("invalid storage account key: {err}"))
        })?;
        Ok(Self {
            account: account.into(),
            key,
        })
    }

    /// Returns the account name this credential signs for.
    #[inline]
    pub fn account(&self) -> &str {
        &self.account
    }
}

impl std::fmt::Debug for SharedKeyCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedKeyCredential")
            .field("account", &self.account)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Builds the query string of a service SAS for one blob.
///
/// The token grants `permissions` (e.g. `r`, `cw`, `d`) on
/// `container/blob` between `start` and `expiry`.
pub fn blob_sas_query(
    credential: &SharedKeyCredential,
    container: &str,
    blob: &str,
    permissions: &str,
    start: DateTime<Utc>,
    expiry: DateTime<Utc>,
) -> String {
    let start = format_time(start);
    let expiry = format_time(expiry);
    let canonicalized_resource =
        format!("/blob/{}/{}/{}", credential.account, container, blob);

    // Service SAS string-to-sign, field order mandated by the service:
    // permissions, start, expiry, canonicalized resource, identifier,
    // IP, protocol, version, resource, snapshot, encryption scope and
    // the five response header overrides.
    let string_to_sign = format!(
        "{permissions}\n{start}\n{expiry}\n{canonicalized_resource}\n\n\n\n{SAS_VERSION}\nb\n\n\n\n\n\n\n"
    );

    let mut mac = HmacSha256::new_from_slice(&credential.key)
        .expect("HMAC can accept any key size");
    mac.update(string_to_sign.as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());

    format!(
        "sv={SAS_VERSION}&sp={permissions}&st={start}&se={expiry}&sr=b&sig={}",
        encode_query_value(&signature)
    )
}

#[inline]
fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Percent-encodes the characters of the base64 alphabet that are not
/// query-safe.
fn encode_query_value(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '+' => encoded.push_str("%2B"),
            '/' => encoded.push_str("%2F"),
            '=' => encoded.push_str("%3D"),
            _ => encoded.push(c),
        }
    }
    encoded
}
