//! HTTP(S) push/pull surface consumed by the orchestrator (spec.md §6).
//!
//! `GET /pubkey?tag=...|?ripe=...` returns a single object blob or 404;
//! `POST /object` admits an object blob; `GET /messages?address=...&since=...`
//! streams inbound objects. The wire bodies are raw object bytes, not JSON.

use crate::error::GatewayError;
use std::time::Duration;

/// External push/pull collaborator (spec.md §1: "the HTTP(S) client used to
/// push/pull objects from gateways" is out of scope beyond its interface).
pub trait Gateway: Send + Sync {
    fn get_pubkey_by_tag(
        &self,
        tag: &[u8; 32],
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>, GatewayError>> + Send;

    fn get_pubkey_by_ripe(
        &self,
        ripe: &[u8; 20],
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>, GatewayError>> + Send;

    fn post_object(
        &self,
        object_bytes: &[u8],
    ) -> impl std::future::Future<Output = Result<(), GatewayError>> + Send;

    fn get_messages_since(
        &self,
        address: &str,
        since: i64,
    ) -> impl std::future::Future<Output = Result<Vec<Vec<u8>>, GatewayError>> + Send;
}

/// `reqwest`-backed [`Gateway`] implementation.
#[derive(Clone, Debug)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("reqwest client configuration is always valid here");
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn get_object(
        &self,
        query: &[(&str, String)],
    ) -> Result<Option<Vec<u8>>, GatewayError> {
        let response = self
            .client
            .get(format!("{}/pubkey", self.base_url))
            .query(query)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        Ok(Some(response.bytes().await?.to_vec()))
    }
}

impl Gateway for HttpGateway {
    async fn get_pubkey_by_tag(&self, tag: &[u8; 32]) -> Result<Option<Vec<u8>>, GatewayError> {
        self.get_object(&[("tag", hex::encode(tag))]).await
    }

    async fn get_pubkey_by_ripe(&self, ripe: &[u8; 20]) -> Result<Option<Vec<u8>>, GatewayError> {
        self.get_object(&[("ripe", hex::encode(ripe))]).await
    }

    async fn post_object(&self, object_bytes: &[u8]) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(format!("{}/object", self.base_url))
            .body(object_bytes.to_vec())
            .send()
            .await?;
        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Rejected(format!("{status}: {body}")))
    }

    async fn get_messages_since(
        &self,
        address: &str,
        since: i64,
    ) -> Result<Vec<Vec<u8>>, GatewayError> {
        let response = self
            .client
            .get(format!("{}/messages", self.base_url))
            .query(&[("address", address), ("since", &since.to_string())])
            .send()
            .await?
            .error_for_status()?;
        let body = response.bytes().await?;
        // Inbound objects are length-prefixed (4-byte big-endian) and
        // concatenated; the gateway's framing is otherwise unspecified.
        let mut objects = Vec::new();
        let mut offset = 0;
        while offset + 4 <= body.len() {
            let len = u32::from_be_bytes(body[offset..offset + 4].try_into().unwrap()) as usize;
            offset += 4;
            if offset + len > body.len() {
                break;
            }
            objects.push(body[offset..offset + len].to_vec());
            offset += len;
        }
        Ok(objects)
    }
}
