//! Chain node client
//!
//! View calls go straight to the node REST API. Transactions are handed to a
//! relay that signs and submits them; this client never holds keys.

use std::time::Duration;

use async_trait::async_trait;
use datachain_core::config::ChainConfig;
use datachain_core::external::{ChainService, TransactionId};
use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{check_status, ClientError, Result};

#[derive(Debug, Serialize)]
struct ViewRequest<'a> {
    function: &'a str,
    type_arguments: Vec<String>,
    arguments: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    function: &'a str,
    arguments: Vec<Value>,
    sender: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    hash: String,
}

/// Client for a chain node and transaction relay
pub struct ChainClient {
    node_url: String,
    relay_url: Option<String>,
    network: String,
    client: Client,
    timeout: Duration,
}

impl ChainClient {
    /// Create a client from configuration
    pub fn new(config: &ChainConfig) -> Self {
        Self {
            node_url: config.node_url.trim_end_matches('/').to_string(),
            relay_url: config
                .relay_url
                .as_deref()
                .map(|url| url.trim_end_matches('/').to_string()),
            network: config.network.clone(),
            client: Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set the request timeout
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Network this client talks to
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Call a view function
    pub async fn call_view(&self, function: &str, arguments: Vec<Value>) -> Result<Vec<Value>> {
        let url = format!("{}/view", self.node_url);
        debug!("View {} on {}", function, self.network);

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&ViewRequest {
                function,
                type_arguments: Vec::new(),
                arguments,
            })
            .send()
            .await?;

        match check_status(response).await?.json::<Value>().await? {
            Value::Array(values) => Ok(values),
            other => Err(ClientError::UnexpectedResponse(format!(
                "view returned {} instead of an array",
                other
            ))),
        }
    }

    /// Submit a transaction through the relay
    pub async fn submit_transaction(
        &self,
        function: &str,
        arguments: Vec<Value>,
        sender: &str,
    ) -> Result<String> {
        let relay = self
            .relay_url
            .as_deref()
            .ok_or_else(|| ClientError::Config("no transaction relay configured".to_string()))?;
        let url = format!("{}/transactions", relay);

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&SubmitRequest {
                function,
                arguments,
                sender,
            })
            .send()
            .await?;
        let submitted: SubmitResponse = check_status(response).await?.json().await?;

        info!("Submitted {} as {}", function, submitted.hash);
        Ok(submitted.hash)
    }
}

#[async_trait]
impl ChainService for ChainClient {
    async fn view(&self, function: &str, args: Vec<Value>) -> datachain_core::Result<Vec<Value>> {
        Ok(self.call_view(function, args).await?)
    }

    async fn submit(
        &self,
        function: &str,
        args: Vec<Value>,
        signer: &str,
    ) -> datachain_core::Result<TransactionId> {
        Ok(self.submit_transaction(function, args, signer).await?)
    }
}
