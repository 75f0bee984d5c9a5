use log::{debug, info};

use shroud_client::{ClientError, CreateAssetRequest, LedgerClient};
use shroud_transaction::{ConfidentialToken, ContractCall, IssueParams};

use crate::error::{EngineError, Result};
use crate::verify::verify_range_proof;

/// Creates the token of an initial issuance.
///
/// The token only exists on-ledger once the `issue` call built by
/// [`ConfidentialAssetBuilder::issue_call`] has been applied.
pub struct ConfidentialAssetBuilder<'a, C> {
    client: &'a C,
    local_checks: bool,
}

impl<'a, C: LedgerClient> ConfidentialAssetBuilder<'a, C> {
    pub fn new(client: &'a C, local_checks: bool) -> Self {
        Self {
            client,
            local_checks,
        }
    }

    pub async fn issue(
        &self,
        spend_key: &str,
        value: u64,
        recipient_pub: &str,
        recipient_addr: Option<&str>,
    ) -> Result<ConfidentialToken> {
        let request = CreateAssetRequest {
            priv_key: spend_key.to_string(),
            value,
            to_pub: recipient_pub.to_string(),
            to: recipient_addr.unwrap_or_default().to_string(),
        };

        let token = self
            .client
            .create_confidential_asset(&request)
            .await
            .map_err(|e| match e {
                e if e.is_transport() => EngineError::from(e),
                ClientError::NodeRejected { desc, .. } => EngineError::AssetCreationFailed(desc),
                e => EngineError::AssetCreationFailed(e.to_string()),
            })?;

        if token.commit.is_empty() || token.range_proof.is_empty() || token.encrypt_value.is_empty() {
            return Err(EngineError::AssetCreationFailed(
                "construction service returned an incomplete token".into(),
            ));
        }
        if self.local_checks && !verify_range_proof(&token.commit, &token.range_proof) {
            return Err(EngineError::RangeProofRejected { index: 0 });
        }

        debug!("created issuance token {}", token.commit);
        Ok(token)
    }

    pub fn issue_call(&self, name: &str, symbol: &str, token: ConfidentialToken) -> ContractCall {
        info!("prepared issue of {name} ({symbol})");
        ContractCall::Issue(IssueParams {
            name: name.to_string(),
            symbol: symbol.to_string(),
            token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shroud_account::Account;
    use shroud_devnet::{DevnetLedger, FaultPlan};

    fn ledger() -> DevnetLedger {
        DevnetLedger::new(&Account::new("sh1genesis", "privgenesis"), 1_000)
    }

    #[tokio::test]
    async fn test_issue_produces_verifiable_token() {
        let ledger = ledger();
        let keys = ledger.create_confidential_key_pair().await.unwrap();
        let builder = ConfidentialAssetBuilder::new(&ledger, true);

        let token = builder
            .issue(&keys.priv_key, 100_000_000, &keys.pub_key, None)
            .await
            .unwrap();
        assert!(verify_range_proof(&token.commit, &token.range_proof));
        assert!(token.to.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_key_fails_creation() {
        let ledger = ledger();
        let builder = ConfidentialAssetBuilder::new(&ledger, true);

        let err = builder.issue("not-a-key", 10, "also-not-a-key", None).await.unwrap_err();
        assert!(matches!(err, EngineError::AssetCreationFailed(_)));
    }

    #[tokio::test]
    async fn test_unreachable_node_is_transport_failure() {
        let ledger = ledger().with_faults(FaultPlan {
            unreachable: true,
            ..FaultPlan::default()
        });
        let builder = ConfidentialAssetBuilder::new(&ledger, true);

        let err = builder.issue("k", 10, "p", None).await.unwrap_err();
        assert!(matches!(err, EngineError::TransportFailure(_)));
    }
}
