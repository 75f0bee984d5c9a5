//! Shroud devnet
//!
//! An in-process ledger implementing [`LedgerClient`], used by the engine's
//! tests and by `shroud run --devnet`.
//!
//! ```text
//! ┌──────────────┐  LedgerClient  ┌───────────────────────────────────────┐
//! │ shroud-core  │ ─────────────▶ │ DevnetLedger                          │
//! └──────────────┘                │  • construction service (crypto)      │
//!                                 │  • accounts / nonces / history        │
//!                                 │  • confidential-asset contract        │
//!                                 │  • FaultPlan                          │
//!                                 └───────────────────────────────────────┘
//! ```
//!
//! Submitted items are applied synchronously: by the time
//! `submitTransaction` returns, their outcome is already in history.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::info;

use shroud_account::{Account, ConfidentialKeyPair};
use shroud_client::{
    AccountInfo, ClientError, CreateAssetRequest, CreateTxRequest, CreateTxResult, DecryptRequest,
    LedgerClient, Result, TransactionHistory,
};
use shroud_transaction::{ConfidentialToken, SubmitResponse, TokenSet, TxItem, codes};

pub mod contract;
pub mod service;
pub mod state;

pub use contract::{ContractContext, ContractError};
pub use service::select_inputs;
pub use state::{AccountRecord, LedgerState};

/// Default genesis balance of a fresh devnet.
pub const DEFAULT_GENESIS_BALANCE: u64 = 1_000_000_000_000_000;

/// Failures the devnet can be told to inject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultPlan {
    /// The construction service commits the payment output to a wrong value.
    pub skew_output_value: bool,
    /// History lookups of a hash submitted while set report "not found"
    /// this many times first.
    pub history_lag_polls: u32,
    /// Every call fails with a transport error.
    pub unreachable: bool,
}

pub struct DevnetLedger {
    state: Mutex<LedgerState>,
    faults: Mutex<FaultPlan>,
    submit_calls: AtomicUsize,
}

impl DevnetLedger {
    pub fn new(genesis: &Account, genesis_balance: u64) -> Self {
        info!("devnet started, genesis {}", genesis.address);
        Self {
            state: Mutex::new(LedgerState::with_genesis(genesis, genesis_balance)),
            faults: Mutex::new(FaultPlan::default()),
            submit_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_faults(self, faults: FaultPlan) -> Self {
        self.set_faults(faults);
        self
    }

    pub fn set_faults(&self, faults: FaultPlan) {
        *self.faults.lock().unwrap_or_else(PoisonError::into_inner) = faults;
    }

    /// Number of `submitTransaction` calls received so far.
    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    /// Snapshot of one account, contract accounts included.
    pub fn account(&self, address: &str) -> Option<AccountRecord> {
        self.state().accounts.get(address).cloned()
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn faults(&self) -> FaultPlan {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn reachable(&self, module: &str) -> Result<()> {
        if self.faults().unreachable {
            return Err(ClientError::transport(module, "devnet unreachable"));
        }
        Ok(())
    }

    fn token_set(&self, contract: &str, owner: &str) -> Result<TokenSet> {
        let state = self.state();
        let record = state
            .accounts
            .get(contract)
            .filter(|r| r.contract.is_some())
            .ok_or_else(|| {
                ClientError::rejected("createConfidentialTx", codes::NOT_EXIST, "contract not exist")
            })?;
        let json = record.metadata.get(owner).ok_or_else(|| {
            ClientError::rejected(
                "createConfidentialTx",
                codes::NOT_EXIST,
                format!("no tokens held by {owner}"),
            )
        })?;
        serde_json::from_str(json).map_err(|e| ClientError::Decode {
            module: "createConfidentialTx".into(),
            message: e.to_string(),
        })
    }
}

impl LedgerClient for DevnetLedger {
    async fn get_account(&self, address: &str) -> Result<AccountInfo> {
        self.reachable("getAccount")?;
        let state = self.state();
        let record = state
            .accounts
            .get(address)
            .ok_or_else(|| ClientError::rejected("getAccount", codes::NOT_EXIST, "account not exist"))?;
        Ok(AccountInfo {
            address: record.address.clone(),
            nonce: (record.nonce > 0).then_some(record.nonce),
            balance: record.balance,
        })
    }

    async fn create_account(&self) -> Result<Account> {
        self.reachable("createAccount")?;
        Ok(self.state().generate_account())
    }

    async fn create_confidential_key_pair(&self) -> Result<ConfidentialKeyPair> {
        self.reachable("createConfidentialKeyPair")?;
        Ok(shroud_privacy::generate_keypair())
    }

    async fn create_confidential_asset(&self, request: &CreateAssetRequest) -> Result<ConfidentialToken> {
        self.reachable("createConfidentialAsset")?;
        service::create_asset(request)
    }

    async fn create_confidential_tx(&self, request: &CreateTxRequest) -> Result<CreateTxResult> {
        self.reachable("createConfidentialTx")?;
        let owned = self.token_set(&request.contract_addr, &request.from)?;
        service::create_transfer(&owned, request, self.faults().skew_output_value)
    }

    async fn submit_transaction(&self, items: &[TxItem]) -> Result<SubmitResponse> {
        self.reachable("submitTransaction")?;
        self.submit_calls.fetch_add(1, Ordering::SeqCst);

        let lag = self.faults().history_lag_polls;
        let mut state = self.state();
        let results: Vec<_> = items.iter().map(|item| state.submit_item(item)).collect();
        if lag > 0 {
            for result in results.iter().filter(|r| r.is_success()) {
                state.history_hidden.insert(result.hash.clone(), lag);
            }
        }
        let success_count = results.iter().filter(|r| r.is_success()).count();
        Ok(SubmitResponse {
            success_count,
            results,
        })
    }

    async fn get_transaction_history(&self, hash: &str) -> Result<TransactionHistory> {
        self.reachable("getTransactionHistory")?;
        let mut state = self.state();
        let still_hidden = match state.history_hidden.get_mut(hash) {
            Some(remaining) => {
                *remaining = remaining.saturating_sub(1);
                Some(*remaining)
            }
            None => None,
        };
        if still_hidden == Some(0) {
            state.history_hidden.remove(hash);
        }

        match state.history.get(hash) {
            Some(tx) if still_hidden.is_none() => Ok(TransactionHistory {
                total_count: 1,
                transactions: vec![tx.clone()],
            }),
            _ => Err(ClientError::rejected(
                "getTransactionHistory",
                codes::NOT_EXIST,
                "transaction not found",
            )),
        }
    }

    async fn get_account_metadata(&self, address: &str, key: &str) -> Result<Option<String>> {
        self.reachable("getAccountMetaData")?;
        Ok(self
            .state()
            .accounts
            .get(address)
            .and_then(|record| record.metadata.get(key).cloned()))
    }

    async fn decrypt_value(&self, request: &DecryptRequest) -> Result<u64> {
        self.reachable("decryptValue")?;
        shroud_privacy::decrypt_value(&request.priv_key, &request.encrypt_value, &request.from)
            .map(|opening| opening.value)
            .map_err(|e| ClientError::rejected("decryptValue", codes::INVALID_PARAMETER, e.to_string()))
    }
}
