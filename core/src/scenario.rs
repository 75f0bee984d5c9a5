//! Setup and the end-to-end confidential transfer scenarios.
//!
//! Setup funds four participants from genesis, deploys the
//! confidential-asset contract from the issuer and issues the initial
//! supply to it. The scenarios then move value around:
//!
//! | scenario         | flow            | amount     | shape                  |
//! |------------------|-----------------|------------|------------------------|
//! | `transfer_1_1_1` | issuer -> alice | 50,000,000 | 1 in, 1 out, 1 change  |
//! | `split`          | alice -> alice  | 30,000,000 | 1 in, 1 out, 1 change  |
//! | `transfer_2_1_1` | alice -> bob    | 40,000,000 | 2 in, 1 out, 1 change  |
//! | `transfer_1_1`   | bob -> carol    | 40,000,000 | 1 in, 1 out            |

use log::{info, warn};
use serde::Deserialize;

use shroud_account::{Account, Participant, Role};
use shroud_client::{DecryptRequest, HistoryTx, LedgerClient};
use shroud_config::ShroudConfig;
use shroud_transaction::{
    CONFIDENTIAL_CONTRACT_PAYLOAD, ConfidentialToken, ContractCall, Operation, RangeproofVerifyParams,
    TallyVerifyParams, TokenRef, TokenSet,
};

use crate::asset::ConfidentialAssetBuilder;
use crate::directory::{AccountDirectory, await_account, resolve_nonce};
use crate::error::{EngineError, Result};
use crate::orchestrator::{Finality, SubmissionOrchestrator, TxBatch};
use crate::poll_policy;
use crate::transfer::{CandidateTransfer, ConfidentialTransferBuilder};

pub const ISSUER: &str = "issuer";
pub const ALICE: &str = "alice";
pub const BOB: &str = "bob";
pub const CAROL: &str = "carol";

const ROLES: [&str; 4] = [ISSUER, ALICE, BOB, CAROL];

/// What a submitted transfer left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub hash: String,
    pub inputs: Vec<TokenRef>,
    pub input_commits: Vec<String>,
    pub outputs: Vec<ConfidentialToken>,
    pub excess_sig: String,
    pub excess_msg: String,
    pub outcome: Finality,
}

impl TransferReceipt {
    /// Fail unless the transfer was applied.
    pub fn confirmed(self) -> Result<Self> {
        match self.outcome.error("transfer") {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Decrypted holdings of one participant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Balance {
    pub values: Vec<u64>,
    pub total: u64,
}

#[derive(Deserialize)]
struct Deployment {
    contract_address: String,
}

pub struct ScenarioDriver<C> {
    client: C,
    config: ShroudConfig,
    directory: AccountDirectory,
}

impl<C: LedgerClient> ScenarioDriver<C> {
    /// Create, fund and register participants, deploy the contract and
    /// issue the initial supply to the issuer.
    pub async fn setup(client: C, config: ShroudConfig) -> Result<Self> {
        let genesis = Account::new(&config.genesis.address, &config.genesis.private_key);
        let mut driver = Self {
            client,
            config,
            directory: AccountDirectory::new(genesis),
        };

        let mut participants = Vec::with_capacity(ROLES.len());
        for role in ROLES {
            participants.push(Participant {
                role: Role::from(role),
                account: driver.client.create_account().await?,
                keys: driver.client.create_confidential_key_pair().await?,
            });
        }
        driver.fund(&participants).await?;

        let propagation = poll_policy(&driver.config.propagation);
        for participant in participants {
            await_account(&driver.client, participant.address(), &propagation).await?;
            driver.directory.register(participant)?;
        }

        let contract = driver.deploy_contract().await?;
        driver.directory.set_contract_address(&contract)?;
        driver.issue().await?;

        driver.directory.seal();
        info!("setup complete, contract {contract}");
        Ok(driver)
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &ShroudConfig {
        &self.config
    }

    pub fn directory(&self) -> &AccountDirectory {
        &self.directory
    }

    pub fn participant(&self, role: &str) -> Result<&Participant> {
        self.directory.participant(&Role::from(role))
    }

    fn orchestrator(&self) -> SubmissionOrchestrator<'_, C> {
        SubmissionOrchestrator::from_config(&self.client, &self.config)
    }

    async fn submit_and_confirm(&self, batch: TxBatch, what: &str) -> Result<HistoryTx> {
        let orchestrator = self.orchestrator();
        let hash = orchestrator.submit(batch).await?.single_hash()?;
        orchestrator.wait_for_finality(&hash).await.confirmed(what)
    }

    /// Fund every participant in one item signed by genesis.
    async fn fund(&self, participants: &[Participant]) -> Result<()> {
        let genesis = self.directory.genesis();
        let _guard = self.directory.lock_source(&genesis.address).await;

        let nonce = resolve_nonce(&self.client, &genesis.address, None).await?;
        let mut batch = TxBatch::new(self.config.batch.gas_price);
        for participant in participants {
            batch.add_operation(
                genesis,
                nonce,
                Operation::create_account(participant.address(), self.config.contract.account_init_balance),
                self.config.batch.fee_limit,
            )?;
        }
        self.submit_and_confirm(batch, "account funding").await?;
        Ok(())
    }

    /// Deploy the contract from the issuer; returns its address.
    async fn deploy_contract(&self) -> Result<String> {
        let issuer = self.participant(ISSUER)?;
        let _guard = self.directory.lock_source(issuer.address()).await;

        let nonce = resolve_nonce(&self.client, issuer.address(), None).await?;
        let mut batch = TxBatch::new(self.config.batch.gas_price);
        batch.add_operation(
            &issuer.account,
            nonce,
            Operation::deploy_contract(CONFIDENTIAL_CONTRACT_PAYLOAD),
            self.config.batch.contract_fee_limit,
        )?;

        let tx = self.submit_and_confirm(batch, "contract deployment").await?;
        let deployed: Vec<Deployment> = serde_json::from_str(&tx.error_desc)
            .map_err(|e| EngineError::Encoding(format!("deployment result {:?}: {e}", tx.error_desc)))?;
        deployed
            .into_iter()
            .next()
            .map(|d| d.contract_address)
            .ok_or(EngineError::ContractNotDeployed)
    }

    async fn issue(&self) -> Result<()> {
        let issuer = self.participant(ISSUER)?;
        let contract = self.directory.contract_address()?;
        let _guard = self.directory.lock_source(issuer.address()).await;

        let builder = ConfidentialAssetBuilder::new(&self.client, self.config.verification.local_checks);
        let token = builder
            .issue(
                issuer.spend_key(),
                self.config.contract.issue_amount,
                issuer.pub_key(),
                None,
            )
            .await?;
        let call = builder.issue_call(
            &self.config.contract.name,
            &self.config.contract.symbol,
            token,
        );

        let nonce = resolve_nonce(&self.client, issuer.address(), None).await?;
        let mut batch = TxBatch::new(self.config.batch.gas_price);
        batch.add_operation(
            &issuer.account,
            nonce,
            Operation::contract_call(contract, &call)?,
            self.config.batch.issue_asset_fee_limit,
        )?;
        self.submit_and_confirm(batch, "issue").await?;
        Ok(())
    }

    // ========================================================================
    // Transfers
    // ========================================================================

    /// Build a candidate transfer without submitting it.
    pub async fn build_transfer(&self, from: &str, to: &str, value: u64) -> Result<CandidateTransfer> {
        let sender = self.participant(from)?;
        let recipient = self.participant(to)?;
        let contract = self.directory.contract_address()?;
        ConfidentialTransferBuilder::new(&self.client, self.config.verification.local_checks)
            .build(contract, sender, recipient, value)
            .await
    }

    /// Submit an already-built candidate from `from` and wait for it to settle.
    ///
    /// The receipt carries the outcome whatever it is; use
    /// [`TransferReceipt::confirmed`] to require success.
    pub async fn submit_transfer(&self, from: &str, candidate: CandidateTransfer) -> Result<TransferReceipt> {
        let sender = self.participant(from)?;
        let _guard = self.directory.lock_source(sender.address()).await;
        self.submit_locked(sender, candidate).await
    }

    /// Build, submit and confirm a transfer, holding the sender's lock
    /// throughout.
    pub async fn transfer(&self, from: &str, to: &str, value: u64) -> Result<TransferReceipt> {
        let sender = self.participant(from)?;
        let _guard = self.directory.lock_source(sender.address()).await;
        let candidate = self.build_transfer(from, to, value).await?;
        self.submit_locked(sender, candidate).await?.confirmed()
    }

    async fn submit_locked(&self, sender: &Participant, candidate: CandidateTransfer) -> Result<TransferReceipt> {
        let contract = self.directory.contract_address()?;
        let nonce = resolve_nonce(&self.client, sender.address(), None).await?;

        let inputs = candidate.inputs.clone();
        let input_commits = candidate.input_commits.clone();
        let outputs = candidate.outputs.clone();
        let excess_sig = candidate.excess_sig.clone();
        let excess_msg = candidate.excess_msg.clone();

        let mut batch = TxBatch::new(self.config.batch.gas_price);
        batch.add_operation(
            &sender.account,
            nonce,
            Operation::contract_call(contract, &candidate.into_call())?,
            self.config.batch.contract_fee_limit,
        )?;

        let orchestrator = self.orchestrator();
        let hash = orchestrator.submit(batch).await?.single_hash()?;
        let outcome = orchestrator.wait_for_finality(&hash).await;
        if !outcome.is_confirmed() {
            warn!("transfer {hash} from {} ended {:?}", sender.role, outcome.state());
        }

        Ok(TransferReceipt {
            hash,
            inputs,
            input_commits,
            outputs,
            excess_sig,
            excess_msg,
            outcome,
        })
    }

    pub async fn transfer_1_1_1(&self) -> Result<TransferReceipt> {
        self.transfer(ISSUER, ALICE, 50_000_000).await
    }

    pub async fn split(&self) -> Result<TransferReceipt> {
        self.transfer(ALICE, ALICE, 30_000_000).await
    }

    pub async fn transfer_2_1_1(&self) -> Result<TransferReceipt> {
        self.transfer(ALICE, BOB, 40_000_000).await
    }

    pub async fn transfer_1_1(&self) -> Result<TransferReceipt> {
        self.transfer(BOB, CAROL, 40_000_000).await
    }

    /// Every scenario in order.
    pub async fn run_all(&self) -> Result<Vec<TransferReceipt>> {
        Ok(vec![
            self.transfer_1_1_1().await?,
            self.split().await?,
            self.transfer_2_1_1().await?,
            self.transfer_1_1().await?,
        ])
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Tokens `role` holds in the contract.
    pub async fn tokens(&self, role: &str) -> Result<TokenSet> {
        let participant = self.participant(role)?;
        let contract = self.directory.contract_address()?;
        match self.client.get_account_metadata(contract, participant.address()).await? {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| EngineError::Encoding(format!("token set of {role}: {e}"))),
            None => Ok(TokenSet::default()),
        }
    }

    /// Decrypt every token `role` holds.
    pub async fn balance(&self, role: &str) -> Result<Balance> {
        let participant = self.participant(role)?;
        let mut balance = Balance::default();
        for token in self.tokens(role).await?.tokens {
            let request = DecryptRequest {
                priv_key: participant.spend_key().to_string(),
                encrypt_value: token.encrypt_value,
                from: token.from_pubkey,
            };
            let value = self.client.decrypt_value(&request).await?;
            balance.values.push(value);
            balance.total = balance.total.saturating_add(value);
        }
        Ok(balance)
    }

    // ========================================================================
    // Fixture verifications
    // ========================================================================

    /// Ask the contract to re-check the tally of a captured transfer.
    pub async fn tally_verify_fixture(&self, receipt: &TransferReceipt) -> Result<Finality> {
        let call = ContractCall::TallyVerify(TallyVerifyParams {
            excess_sig: receipt.excess_sig.clone(),
            excess_msg: receipt.excess_msg.clone(),
            inputs: receipt.input_commits.clone(),
            outputs: receipt.outputs.iter().map(|o| o.commit.clone()).collect(),
        });
        self.fixture_call(call).await
    }

    /// Ask the contract to re-check the range proof of one captured output.
    pub async fn rangeproof_verify_fixture(&self, receipt: &TransferReceipt, index: usize) -> Result<Finality> {
        let output = receipt.outputs.get(index).ok_or_else(|| {
            EngineError::InvalidCandidate(format!("receipt has no output {index}"))
        })?;
        let call = ContractCall::RangeproofVerify(RangeproofVerifyParams {
            commit: output.commit.clone(),
            proof: output.range_proof.clone(),
        });
        self.fixture_call(call).await
    }

    async fn fixture_call(&self, call: ContractCall) -> Result<Finality> {
        let genesis = self.directory.genesis();
        let contract = self.directory.contract_address()?;
        let _guard = self.directory.lock_source(&genesis.address).await;

        let nonce = resolve_nonce(&self.client, &genesis.address, None).await?;
        let mut batch = TxBatch::new(self.config.batch.gas_price);
        batch.add_operation(
            genesis,
            nonce,
            Operation::contract_call(contract, &call)?,
            self.config.batch.contract_fee_limit,
        )?;

        let orchestrator = self.orchestrator();
        let hash = orchestrator.submit(batch).await?.single_hash()?;
        let finality = orchestrator.wait_for_finality(&hash).await;
        info!("{} fixture: {:?}", call.method(), finality.state());
        Ok(finality)
    }
}
