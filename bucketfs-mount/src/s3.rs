//! S3-compatible object store client.
//!
//! Talks to AWS S3 or any S3-compatible endpoint (MinIO, B2, R2) using
//! path-style addressing. Requests are signed with AWS Signature V4 by
//! hand on top of reqwest, so no SDK dependency is needed.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Response};
use sha2::{Digest, Sha256};
use tracing::debug;

use bucketfs_common::backend::{ListRequest, ListResponse, ObjectStore, StoreError};

type HmacSha256 = Hmac<Sha256>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>, // Custom endpoint for MinIO, B2 or other S3-compatible APIs
    pub access_key_id: String,
    pub secret_access_key: String,
}

pub struct S3Client {
    config: S3Config,
    client: Client,
}

impl S3Client {
    pub fn new(config: S3Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { config, client })
    }

    fn base_url(&self) -> String {
        match &self.config.endpoint {
            Some(ep) => ep.trim_end_matches('/').to_string(),
            None => format!("https://s3.{}.amazonaws.com", self.config.region),
        }
    }

    /// Path of the bucket on the endpoint, including any path the endpoint
    /// itself carries.
    fn bucket_path(&self) -> String {
        format!(
            "{}/{}",
            url_path(&self.base_url()),
            urlencoding::encode(&self.config.bucket)
        )
    }

    fn object_path(&self, key: &str) -> String {
        format!("{}/{}", self.bucket_path(), encode_key(key))
    }

    /// Compute the AWS Signature V4 `Authorization` header for a request.
    #[allow(clippy::too_many_arguments)]
    fn sign(
        &self,
        method: &Method,
        canonical_path: &str,
        canonical_query: &str,
        headers: &BTreeMap<String, String>,
        body_hash: &str,
        date_time: &str,
        date: &str,
    ) -> String {
        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v.trim()))
            .collect();
        let signed_headers: String = headers.keys().cloned().collect::<Vec<_>>().join(";");

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method.as_str(),
            canonical_path,
            canonical_query,
            canonical_headers,
            signed_headers,
            body_hash
        );

        let cr_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));
        let credential_scope = format!("{}/{}/s3/aws4_request", date, self.config.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            date_time, credential_scope, cr_hash
        );

        let signing_key =
            derive_signing_key(&self.config.secret_access_key, date, &self.config.region);
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

        format!(
            "AWS4-HMAC-SHA256 Credential={}/{},SignedHeaders={},Signature={}",
            self.config.access_key_id, credential_scope, signed_headers, signature
        )
    }

    /// Sign and send one request. Non-success responses are turned into
    /// `StoreError::Http` with the S3 error code and message.
    async fn send(
        &self,
        operation: &'static str,
        method: Method,
        canonical_path: &str,
        canonical_query: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<Response, StoreError> {
        let now = Utc::now();
        let date_time = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();

        let base = self.base_url();
        let body_hash_str = body_hash(&body);

        let mut headers = BTreeMap::new();
        headers.insert("host".to_string(), url_host(&base));
        headers.insert("x-amz-content-sha256".to_string(), body_hash_str.clone());
        headers.insert("x-amz-date".to_string(), date_time.clone());
        if let Some(ct) = content_type {
            headers.insert("content-type".to_string(), ct.to_string());
        }

        let auth = self.sign(
            &method,
            canonical_path,
            canonical_query,
            &headers,
            &body_hash_str,
            &date_time,
            &date,
        );

        let mut url = format!("{}{}", url_origin(&base), canonical_path);
        if !canonical_query.is_empty() {
            url.push('?');
            url.push_str(canonical_query);
        }

        let mut req = self
            .client
            .request(method, &url)
            .header("x-amz-date", &date_time)
            .header("x-amz-content-sha256", &body_hash_str)
            .header("Authorization", &auth);
        if let Some(ct) = content_type {
            req = req.header("Content-Type", ct);
        }

        let resp = req
            .body(body)
            .send()
            .await
            .map_err(|source| StoreError::Request { operation, source })?;

        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Http {
            operation,
            status,
            code: first_tag(&body, "Code").map(unescape_xml).unwrap_or_default(),
            message: first_tag(&body, "Message")
                .map(unescape_xml)
                .unwrap_or(body),
        })
    }
}

fn derive_signing_key(secret: &str, date: &str, region: &str) -> Vec<u8> {
    let key = format!("AWS4{}", secret);
    let k_date = hmac_sha256(key.as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, b"s3");
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC key length ok");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn body_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn get_object(&self, key: &str) -> Result<Bytes, StoreError> {
        let path = self.object_path(key);
        let resp = match self
            .send("S3 GET", Method::GET, &path, "", Bytes::new(), None)
            .await
        {
            Ok(resp) => resp,
            Err(StoreError::Http { status: 404, code, .. })
                if code.is_empty() || code == "NoSuchKey" =>
            {
                return Err(StoreError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e),
        };

        let body = resp.bytes().await.map_err(|source| StoreError::Request {
            operation: "S3 GET body",
            source,
        })?;
        debug!(bucket = %self.config.bucket, key = %key, bytes = body.len(), "S3 get complete");
        Ok(body)
    }

    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        let path = self.object_path(key);
        let len = data.len();
        self.send("S3 PUT", Method::PUT, &path, "", data, content_type)
            .await?;
        debug!(bucket = %self.config.bucket, key = %key, bytes = len, "S3 put complete");
        Ok(())
    }

    async fn list_objects(&self, request: &ListRequest) -> Result<ListResponse, StoreError> {
        let max_keys = request.max_keys.to_string();
        let mut params = vec![
            ("list-type", "2"),
            ("max-keys", max_keys.as_str()),
            ("prefix", request.prefix.as_str()),
        ];
        if let Some(delimiter) = &request.delimiter {
            params.push(("delimiter", delimiter.as_str()));
        }
        let query = canonical_query(&params);

        let path = format!("{}/", self.bucket_path());
        let resp = self
            .send("S3 LIST", Method::GET, &path, &query, Bytes::new(), None)
            .await?;
        let body = resp.text().await.map_err(|source| StoreError::Request {
            operation: "S3 LIST body",
            source,
        })?;

        let listing = parse_list_response(&body);
        debug!(
            bucket = %self.config.bucket,
            prefix = %request.prefix,
            count = listing.key_count,
            "S3 list complete"
        );
        Ok(listing)
    }
}

/// Encode an object key for the request path: every segment is
/// percent-encoded, separators are kept.
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Build the canonical (sorted, percent-encoded) query string. The same
/// string is sent on the wire so the signature always matches.
fn canonical_query(params: &[(&str, &str)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| {
            (
                urlencoding::encode(k).into_owned(),
                urlencoding::encode(v).into_owned(),
            )
        })
        .collect();
    encoded.sort();
    encoded
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Parse a ListObjectsV2 XML response: object keys, common prefixes and
/// the reported key count.
fn parse_list_response(xml: &str) -> ListResponse {
    let keys: Vec<String> = tag_blocks(xml, "Contents")
        .into_iter()
        .filter_map(|block| first_tag(block, "Key"))
        .map(unescape_xml)
        .collect();
    let common_prefixes: Vec<String> = tag_blocks(xml, "CommonPrefixes")
        .into_iter()
        .filter_map(|block| first_tag(block, "Prefix"))
        .map(unescape_xml)
        .collect();

    let mut listing = ListResponse::new(keys, common_prefixes);
    if let Some(count) = first_tag(xml, "KeyCount").and_then(|c| c.trim().parse().ok()) {
        listing.key_count = count;
    }
    listing
}

/// Inner text of every `<tag>…</tag>` element, in document order.
fn tag_blocks<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let mut blocks = Vec::new();
    let mut remaining = xml;
    while let Some(start) = remaining.find(&open) {
        remaining = &remaining[start + open.len()..];
        match remaining.find(&close) {
            Some(end) => {
                blocks.push(&remaining[..end]);
                remaining = &remaining[end + close.len()..];
            }
            None => break,
        }
    }
    blocks
}

fn first_tag<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    tag_blocks(xml, tag).into_iter().next()
}

/// Decode the predefined XML entities and numeric character references.
fn unescape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let Some(semi) = rest.find(';') else { break };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .map(|hex| u32::from_str_radix(hex, 16))
                .or_else(|| entity.strip_prefix('#').map(str::parse::<u32>))
                .and_then(Result::ok)
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Extract the host part from a URL for use in signing.
fn url_host(url: &str) -> String {
    let without_scheme = strip_scheme(url);
    without_scheme.split('/').next().unwrap_or(without_scheme).to_string()
}

/// Path component of an endpoint URL without a trailing slash ("" for none).
fn url_path(url: &str) -> String {
    let without_scheme = strip_scheme(url);
    match without_scheme.find('/') {
        Some(idx) => without_scheme[idx..].trim_end_matches('/').to_string(),
        None => String::new(),
    }
}

/// Scheme and host of a URL: everything before the path.
fn url_origin(url: &str) -> &str {
    let scheme_len = url.len() - strip_scheme(url).len();
    match url[scheme_len..].find('/') {
        Some(idx) => &url[..scheme_len + idx],
        None => url,
    }
}

fn strip_scheme(url: &str) -> &str {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url)
}
