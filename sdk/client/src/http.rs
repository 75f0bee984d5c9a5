//! HTTP transport for [`LedgerClient`].
//!
//! Reads are `GET {base}{module}?query`, submission is a JSON `POST` to
//! `submitTransaction`. Responses other than submission carry the
//! `{error_code, error_desc, result}` envelope.

use std::time::Duration;

use log::debug;
use serde::{Serialize, de::DeserializeOwned};

use shroud_account::{Account, ConfidentialKeyPair};
use shroud_transaction::{ConfidentialToken, SubmitResponse, TxItem, codes};

use crate::error::ClientError;
use crate::rpc::{
    AccountInfo, CreateAssetRequest, CreateTxRequest, CreateTxResult, DecryptRequest, Metadata,
    RpcEnvelope, SubmitRequest, TransactionHistory,
};
use crate::{LedgerClient, Result};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL of the node (e.g., "http://127.0.0.1:29333/")
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:29333/".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

// ============================================================================
// Client
// ============================================================================

pub struct HttpLedgerClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpLedgerClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::transport("client", e.to_string()))?;

        let mut base_url = config.base_url;
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, module: &str) -> String {
        format!("{}{}", self.base_url, module)
    }

    fn map_send_error(module: &str, e: reqwest::Error) -> ClientError {
        if e.is_timeout() {
            ClientError::Timeout {
                module: module.to_string(),
            }
        } else {
            ClientError::transport(module, e.to_string())
        }
    }

    async fn decode<T: DeserializeOwned>(module: &str, response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::transport(module, format!("HTTP {status}: {body}")));
        }
        response.json().await.map_err(|e| ClientError::Decode {
            module: module.to_string(),
            message: e.to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, module: &str, query: &[(&str, &str)]) -> Result<RpcEnvelope<T>> {
        debug!("GET {module} {query:?}");
        let response = self
            .client
            .get(self.url(module))
            .query(query)
            .send()
            .await
            .map_err(|e| Self::map_send_error(module, e))?;
        Self::decode(module, response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, module: &str, body: &B) -> Result<T> {
        debug!("POST {module}");
        let response = self
            .client
            .post(self.url(module))
            .json(body)
            .send()
            .await
            .map_err(|e| Self::map_send_error(module, e))?;
        Self::decode(module, response).await
    }
}

impl LedgerClient for HttpLedgerClient {
    async fn get_account(&self, address: &str) -> Result<AccountInfo> {
        self.get("getAccount", &[("address", address)])
            .await?
            .open("getAccount")
    }

    async fn create_account(&self) -> Result<Account> {
        self.get("createAccount", &[]).await?.open("createAccount")
    }

    async fn create_confidential_key_pair(&self) -> Result<ConfidentialKeyPair> {
        self.get("createConfidentialKeyPair", &[])
            .await?
            .open("createConfidentialKeyPair")
    }

    async fn create_confidential_asset(&self, request: &CreateAssetRequest) -> Result<ConfidentialToken> {
        let value = request.value.to_string();
        self.get(
            "createConfidentialAsset",
            &[
                ("priv_key", request.priv_key.as_str()),
                ("value", value.as_str()),
                ("to_pub", request.to_pub.as_str()),
                ("to", request.to.as_str()),
            ],
        )
        .await?
        .open("createConfidentialAsset")
    }

    async fn create_confidential_tx(&self, request: &CreateTxRequest) -> Result<CreateTxResult> {
        let value = request.value.to_string();
        self.get(
            "createConfidentialTx",
            &[
                ("spend_key", request.spend_key.as_str()),
                ("from", request.from.as_str()),
                ("to", request.to.as_str()),
                ("to_pub", request.to_pub.as_str()),
                ("value", value.as_str()),
                ("contract_addr", request.contract_addr.as_str()),
            ],
        )
        .await?
        .open("createConfidentialTx")
    }

    async fn submit_transaction(&self, items: &[TxItem]) -> Result<SubmitResponse> {
        let request = SubmitRequest {
            items: items.to_vec(),
        };
        self.post("submitTransaction", &request).await
    }

    async fn get_transaction_history(&self, hash: &str) -> Result<TransactionHistory> {
        self.get("getTransactionHistory", &[("hash", hash)])
            .await?
            .open("getTransactionHistory")
    }

    async fn get_account_metadata(&self, address: &str, key: &str) -> Result<Option<String>> {
        let envelope: RpcEnvelope<Metadata> = self
            .get("getAccountMetaData", &[("address", address), ("key", key)])
            .await?;

        match envelope.error_code {
            codes::SUCCESS => Ok(envelope
                .result
                .and_then(|mut entries| entries.remove(key))
                .map(|entry| entry.value)),
            codes::NOT_EXIST => Ok(None),
            code => Err(ClientError::rejected(
                "getAccountMetaData",
                code,
                envelope.error_desc,
            )),
        }
    }

    async fn decrypt_value(&self, request: &DecryptRequest) -> Result<u64> {
        self.get(
            "decryptValue",
            &[
                ("priv_key", request.priv_key.as_str()),
                ("encrypt_value", request.encrypt_value.as_str()),
                ("from", request.from.as_str()),
            ],
        )
        .await?
        .open("decryptValue")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = HttpLedgerClient::new(HttpClientConfig {
            base_url: "http://localhost:1".into(),
            timeout: Duration::from_millis(50),
        })
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:1/");
        assert_eq!(client.url("getAccount"), "http://localhost:1/getAccount");
    }

    #[tokio::test]
    async fn test_unreachable_node_is_transport_failure() {
        // Port 9 (discard) on localhost is not listening in test environments.
        let client = HttpLedgerClient::new(HttpClientConfig {
            base_url: "http://127.0.0.1:9/".into(),
            timeout: Duration::from_millis(500),
        })
        .unwrap();

        let err = client.get_account("sh1nobody").await.unwrap_err();
        assert!(err.is_transport(), "unexpected error: {err}");
    }
}
