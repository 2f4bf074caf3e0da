//! Connection string parsing and HMAC-SHA256 request signing.
//!
//! Every request carries:
//! - `x-ms-date`: RFC 1123 timestamp,
//! - `x-ms-content-sha256`: base64 SHA-256 of the body,
//! - `Authorization: HMAC-SHA256 SignedHeaders=x-ms-date;host;x-ms-content-sha256&Signature=<sig>`
//!
//! where the signature covers `METHOD\n<path+query>\n<date>;<host>;<hash>`.

use base64::prelude::*;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use time::macros::format_description;
use url::Url;
use zeroize::Zeroizing;

use crate::core::telephony::base::{TelephonyError, TelephonyResult};

type HmacSha256 = Hmac<Sha256>;

/// Parsed `endpoint=...;accesskey=...` connection string.
pub struct AcsCredentials {
    endpoint: Url,
    access_key: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for AcsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcsCredentials")
            .field("endpoint", &self.endpoint.as_str())
            .field("access_key", &"<redacted>")
            .finish()
    }
}

impl AcsCredentials {
    pub fn from_connection_string(connection_string: &str) -> TelephonyResult<Self> {
        let mut endpoint = None;
        let mut access_key = None;

        for part in connection_string.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let Some((name, value)) = part.split_once('=') else {
                return Err(TelephonyError::InvalidConnectionString(format!(
                    "segment without '=': {part}"
                )));
            };
            match name.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value.trim().to_string()),
                "accesskey" => access_key = Some(value.trim().to_string()),
                _ => {}
            }
        }

        let endpoint = endpoint.ok_or_else(|| {
            TelephonyError::InvalidConnectionString("missing endpoint".to_string())
        })?;
        let access_key = access_key.ok_or_else(|| {
            TelephonyError::InvalidConnectionString("missing accesskey".to_string())
        })?;

        let endpoint = Url::parse(&endpoint)
            .map_err(|e| TelephonyError::InvalidConnectionString(format!("endpoint: {e}")))?;
        if endpoint.host_str().is_none() {
            return Err(TelephonyError::InvalidConnectionString(
                "endpoint has no host".to_string(),
            ));
        }
        let access_key = BASE64_STANDARD
            .decode(access_key.as_bytes())
            .map_err(|e| TelephonyError::InvalidConnectionString(format!("accesskey: {e}")))?;

        Ok(Self {
            endpoint,
            access_key: Zeroizing::new(access_key),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Compute the signing headers for a request.
    pub fn sign(
        &self,
        method: &str,
        url: &Url,
        body: &[u8],
        now: OffsetDateTime,
    ) -> TelephonyResult<SignedHeaders> {
        let date = format_rfc1123(now)?;
        let content_hash = BASE64_STANDARD.encode(Sha256::digest(body));

        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(TelephonyError::InvalidUrl(url.to_string())),
        };
        let path_and_query = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        let string_to_sign = format!(
            "{}\n{}\n{};{};{}",
            method.to_ascii_uppercase(),
            path_and_query,
            date,
            host,
            content_hash
        );

        let mut mac = HmacSha256::new_from_slice(&self.access_key)
            .map_err(|e| TelephonyError::InvalidConnectionString(e.to_string()))?;
        mac.update(string_to_sign.as_bytes());
        let signature = BASE64_STANDARD.encode(mac.finalize().into_bytes());

        Ok(SignedHeaders {
            date,
            content_hash,
            authorization: format!(
                "HMAC-SHA256 SignedHeaders=x-ms-date;host;x-ms-content-sha256&Signature={signature}"
            ),
        })
    }
}

/// Headers produced by [`AcsCredentials::sign`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub date: String,
    pub content_hash: String,
    pub authorization: String,
}

fn format_rfc1123(now: OffsetDateTime) -> TelephonyResult<String> {
    let format = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );
    now.to_offset(time::UtcOffset::UTC)
        .format(&format)
        .map_err(|e| TelephonyError::Serialization(format!("date: {e}")))
}
