//! Presigned uploads to S3-compatible object storage.
//!
//! The API never proxies image bytes. Clients ask for a short-lived
//! AWS SigV4 query-signed PUT URL and upload directly to the bucket.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

/// Image types accepted for avatars, with the file extension used in keys.
pub const AVATAR_CONTENT_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("image/heic", "heic"),
];

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint (MinIO, R2). Uses path-style addressing when set.
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub upload_url_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PresignedUpload {
    pub upload_url: String,
    pub object_key: String,
    pub method: &'static str,
    pub expires_in: u64,
}

#[derive(Clone)]
pub struct StorageService {
    config: StorageConfig,
}

impl StorageService {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    /// New object key under the user's avatar prefix, or `None` for an
    /// unsupported content type.
    pub fn avatar_key(user_id: &str, content_type: &str) -> Option<String> {
        let content_type = content_type.trim().to_ascii_lowercase();
        AVATAR_CONTENT_TYPES
            .iter()
            .find(|(mime, _)| *mime == content_type)
            .map(|(_, ext)| format!("avatars/{}/{}.{}", user_id, uuid::Uuid::new_v4(), ext))
    }

    pub fn presign_put(&self, object_key: &str, now: DateTime<Utc>) -> PresignedUpload {
        PresignedUpload {
            upload_url: self.presign("PUT", object_key, now),
            object_key: object_key.to_string(),
            method: "PUT",
            expires_in: self.config.upload_url_ttl_secs,
        }
    }

    fn host_and_path(&self, object_key: &str) -> (String, String, String) {
        let encoded_key = object_key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        match &self.config.endpoint {
            Some(endpoint) => {
                let endpoint = endpoint.trim_end_matches('/');
                let (scheme, host) = match endpoint.split_once("://") {
                    Some((scheme, host)) => (scheme.to_string(), host.to_string()),
                    None => ("https".to_string(), endpoint.to_string()),
                };
                let path = format!("/{}/{}", self.config.bucket, encoded_key);
                (scheme, host, path)
            }
            None => {
                let host = if self.config.region == "us-east-1" {
                    format!("{}.s3.amazonaws.com", self.config.bucket)
                } else {
                    format!("{}.s3.{}.amazonaws.com", self.config.bucket, self.config.region)
                };
                ("https".to_string(), host, format!("/{}", encoded_key))
            }
        }
    }

    fn presign(&self, method: &str, object_key: &str, now: DateTime<Utc>) -> String {
        let (scheme, host, path) = self.host_and_path(object_key);
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let scope = format!("{}/{}/{}/aws4_request", date, self.config.region, SERVICE);
        let credential = format!("{}/{}", self.config.access_key_id, scope);

        // Already in canonical (sorted) order.
        let query = [
            ("X-Amz-Algorithm", ALGORITHM.to_string()),
            ("X-Amz-Credential", credential),
            ("X-Amz-Date", amz_date.clone()),
            ("X-Amz-Expires", self.config.upload_url_ttl_secs.to_string()),
            ("X-Amz-SignedHeaders", "host".to_string()),
        ]
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

        let canonical_request = format!(
            "{}\n{}\n{}\nhost:{}\n\nhost\nUNSIGNED-PAYLOAD",
            method, path, query, host
        );
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let key = format!("AWS4{}", self.config.secret_access_key);
        let k_date = hmac_sha256(key.as_bytes(), date.as_bytes());
        let k_region = hmac_sha256(&k_date, self.config.region.as_bytes());
        let k_service = hmac_sha256(&k_region, SERVICE.as_bytes());
        let k_signing = hmac_sha256(&k_service, b"aws4_request");
        let signature = hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes()));

        format!(
            "{}://{}{}?{}&X-Amz-Signature={}",
            scheme, host, path, query, signature
        )
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(key).unwrap_or_else(|_| unreachable!());
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
