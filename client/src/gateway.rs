//! Pinning gateway client
//!
//! Pins blobs through the pinning API and retrieves them through the public
//! gateway.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use datachain_core::config::GatewayConfig;
use datachain_core::external::{expiry_after, BlobStore, ContentId, PinMetadata, SignedUrl};
use log::{debug, info};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use crate::error::{check_status, ClientError, Result};

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    data: String,
}

/// Client for a pinning API and its retrieval gateway
pub struct GatewayClient {
    api_url: String,
    gateway_url: String,
    jwt: Option<String>,
    client: Client,
    timeout: Duration,
}

impl GatewayClient {
    /// Create a client from configuration
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            gateway_url: config.gateway_url.trim_end_matches('/').to_string(),
            jwt: config.jwt.clone(),
            client: Client::new(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Set the request timeout
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn bearer(&self) -> Result<&str> {
        self.jwt
            .as_deref()
            .filter(|jwt| !jwt.is_empty())
            .ok_or_else(|| ClientError::Config("gateway JWT is not configured".to_string()))
    }

    /// Pin a file and return its content identifier
    pub async fn pin_file(&self, bytes: Vec<u8>, metadata: &PinMetadata) -> Result<String> {
        let jwt = self.bearer()?;
        let url = format!("{}/pinning/pinFileToIPFS", self.api_url);
        let size = bytes.len();

        let file = Part::bytes(bytes)
            .file_name(metadata.file_name.clone())
            .mime_str("application/octet-stream")?;
        let pinata_metadata = serde_json::json!({
            "name": metadata.name,
            "keyvalues": metadata.keyvalues,
        });
        let form = Form::new()
            .part("file", file)
            .text("pinataMetadata", pinata_metadata.to_string());

        let response = self
            .client
            .post(&url)
            .bearer_auth(jwt)
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await?;
        let pinned: PinResponse = check_status(response).await?.json().await?;

        info!("Pinned {} bytes as {}", size, pinned.ipfs_hash);
        Ok(pinned.ipfs_hash)
    }

    /// Fetch a file through the gateway
    pub async fn fetch_file(&self, content_id: &str) -> Result<Vec<u8>> {
        let url = format!("{}/ipfs/{}", self.gateway_url, content_id);
        debug!("Fetching {}", url);

        let response = self.client.get(&url).timeout(self.timeout).send().await?;
        let bytes = check_status(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    /// Ask the pinning API for a signed retrieval URL
    pub async fn create_signed_url(&self, content_id: &str, ttl_secs: u64) -> Result<SignedUrl> {
        let jwt = self.bearer()?;
        let url = format!("{}/v3/files/sign", self.api_url);
        let now = Utc::now();
        let expires_at = expiry_after(now, ttl_secs)
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;

        let response = self
            .client
            .post(&url)
            .bearer_auth(jwt)
            .timeout(self.timeout)
            .json(&serde_json::json!({
                "url": format!("{}/files/{}", self.gateway_url, content_id),
                "expires": ttl_secs,
                "date": now.timestamp(),
                "method": "GET",
            }))
            .send()
            .await?;
        let signed: SignResponse = check_status(response).await?.json().await?;

        if signed.data.is_empty() {
            return Err(ClientError::UnexpectedResponse("empty signed URL".to_string()));
        }

        Ok(SignedUrl {
            url: signed.data,
            expires_at,
        })
    }
}

#[async_trait]
impl BlobStore for GatewayClient {
    async fn pin(&self, bytes: Vec<u8>, metadata: PinMetadata) -> datachain_core::Result<ContentId> {
        Ok(self.pin_file(bytes, &metadata).await?)
    }

    async fn fetch(&self, content_id: &str) -> datachain_core::Result<Vec<u8>> {
        Ok(self.fetch_file(content_id).await?)
    }

    async fn signed_url(&self, content_id: &str, ttl_secs: u64) -> datachain_core::Result<SignedUrl> {
        Ok(self.create_signed_url(content_id, ttl_secs).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datachain_core::{CoreError, ErrorKind};
    use mockito::Matcher;

    fn client(url: &str, jwt: Option<&str>) -> GatewayClient {
        GatewayClient::new(&GatewayConfig {
            api_url: url.to_string(),
            gateway_url: url.to_string(),
            jwt: jwt.map(str::to_string),
            default_signed_url_ttl_secs: 3600,
            max_signed_url_ttl_secs: 86_400,
        })
    }

    #[tokio::test]
    async fn test_pin_file() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/pinning/pinFileToIPFS")
            .match_header("authorization", "Bearer secret-jwt")
            .match_header("content-type", Matcher::Regex("^multipart/form-data".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"IpfsHash":"QmTest","PinSize":4,"Timestamp":"2024-01-01T00:00:00Z"}"#)
            .create_async()
            .await;

        let gateway = client(&server.url(), Some("secret-jwt"));
        let metadata = PinMetadata {
            name: "DataChain-rows".to_string(),
            file_name: "rows.csv".to_string(),
            ..Default::default()
        };
        let cid = gateway.pin(b"rows".to_vec(), metadata).await.unwrap();

        assert_eq!(cid, "QmTest");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_pin_requires_jwt() {
        let gateway = client("http://127.0.0.1:9", None);
        let err = gateway.pin(b"rows".to_vec(), PinMetadata::default()).await.unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[tokio::test]
    async fn test_fetch_file() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ipfs/QmTest")
            .with_status(200)
            .with_body("id,value\n")
            .create_async()
            .await;

        let gateway = client(&server.url(), None);
        assert_eq!(gateway.fetch("QmTest").await.unwrap(), b"id,value\n");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_missing_blob_is_external() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ipfs/QmGone")
            .with_status(404)
            .create_async()
            .await;

        let gateway = client(&server.url(), None);
        let err = gateway.fetch("QmGone").await.unwrap_err();
        assert!(matches!(err, CoreError::External(_)));
        assert_ne!(err.user_message(), "dataset does not exist");
    }

    #[tokio::test]
    async fn test_server_error_is_external() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ipfs/QmTest")
            .with_status(502)
            .with_body("upstream unavailable")
            .create_async()
            .await;

        let gateway = client(&server.url(), None);
        let err = gateway.fetch("QmTest").await.unwrap_err();
        assert!(matches!(err, CoreError::External(_)));
    }

    #[tokio::test]
    async fn test_signed_url_huge_ttl_rejected_before_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v3/files/sign")
            .expect(0)
            .create_async()
            .await;

        let gateway = client(&server.url(), Some("secret-jwt"));
        let err = gateway.signed_url("QmTest", u64::MAX).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_signed_url() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v3/files/sign")
            .match_header("authorization", "Bearer secret-jwt")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "expires": 120,
                "method": "GET",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":"https://gw.example/files/QmTest?sig=abc"}"#)
            .create_async()
            .await;

        let gateway = client(&server.url(), Some("secret-jwt"));
        let signed = gateway.signed_url("QmTest", 120).await.unwrap();

        assert_eq!(signed.url, "https://gw.example/files/QmTest?sig=abc");
        assert!(signed.expires_at > Utc::now());
        mock.assert_async().await;
    }
}
