//! Ledger state and transaction application.

use std::collections::{BTreeMap, HashMap};

use log::{debug, warn};
use rand::RngCore;
use serde_json::json;

use shroud_account::Account;
use shroud_client::HistoryTx;
use shroud_transaction::{
    CONFIDENTIAL_CONTRACT_PAYLOAD, CreateAccount, Operation, SubmitResult, TransactionJson, TxItem,
    codes,
};

use crate::contract::ContractContext;

#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub address: String,
    /// `None` for contract accounts and accounts nobody holds a key for.
    pub private_key: Option<String>,
    /// Nonce of the last applied transaction; 0 if none yet.
    pub nonce: u64,
    pub balance: u64,
    pub contract: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub assets: BTreeMap<String, u64>,
}

impl AccountRecord {
    fn new(address: String, private_key: Option<String>, balance: u64) -> Self {
        Self {
            address,
            private_key,
            nonce: 0,
            balance,
            contract: None,
            metadata: BTreeMap::new(),
            assets: BTreeMap::new(),
        }
    }
}

#[derive(Debug)]
struct OpFailure {
    code: i32,
    desc: String,
}

impl OpFailure {
    fn new(code: i32, desc: impl Into<String>) -> Self {
        Self {
            code,
            desc: desc.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct LedgerState {
    pub(crate) accounts: HashMap<String, AccountRecord>,
    /// Keys handed out by `createAccount` for accounts not yet funded.
    keyring: HashMap<String, String>,
    pub(crate) history: HashMap<String, HistoryTx>,
    /// Polls left before a recorded hash shows up in history.
    pub(crate) history_hidden: HashMap<String, u32>,
    ledger_seq: u64,
    tx_count: u64,
}

fn derive_address(seed: &[u8]) -> String {
    let digest = blake3::hash(seed);
    format!("sh1{}", &hex::encode(digest.as_bytes())[..40])
}

impl LedgerState {
    pub fn with_genesis(genesis: &Account, balance: u64) -> Self {
        let mut state = Self::default();
        state.accounts.insert(
            genesis.address.clone(),
            AccountRecord::new(genesis.address.clone(), Some(genesis.private_key.clone()), balance),
        );
        state
    }

    /// Generate a keypair the way `createAccount` does; the account only
    /// exists once a `create_account` operation funds it.
    pub fn generate_account(&mut self) -> Account {
        let mut secret = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);

        let account = Account {
            address: derive_address(&secret),
            private_key: format!("priv{}", hex::encode(secret)),
            private_key_aes: hex::encode(blake3::derive_key("shroud devnet key wrap", &secret)),
        };
        self.keyring
            .insert(account.address.clone(), account.private_key.clone());
        account
    }

    fn tx_hash(&mut self, tx: &TransactionJson) -> String {
        self.tx_count += 1;
        let mut hasher = blake3::Hasher::new();
        hasher.update(&serde_json::to_vec(tx).unwrap_or_default());
        hasher.update(&self.tx_count.to_le_bytes());
        hex::encode(hasher.finalize().as_bytes())
    }

    /// Validate and apply one submitted item.
    ///
    /// Admission failures (unknown source, missing signature, bad nonce)
    /// are reported in the returned result and leave no trace. Once
    /// admitted the nonce is consumed, and the execution outcome, success
    /// or failure, is recorded in history.
    pub fn submit_item(&mut self, item: &TxItem) -> SubmitResult {
        let tx = &item.transaction_json;
        let hash = self.tx_hash(tx);

        if let Err(failure) = self.admit(item) {
            warn!(
                "devnet rejected {} nonce {}: {}",
                tx.source_address, tx.nonce, failure.desc
            );
            return SubmitResult {
                error_code: failure.code,
                hash,
                error_desc: failure.desc,
            };
        }

        if let Some(source) = self.accounts.get_mut(&tx.source_address) {
            source.nonce = tx.nonce;
        }
        self.ledger_seq += 1;

        let (error_code, error_desc) = match self.execute(tx, &hash) {
            Ok(desc) => (codes::SUCCESS, desc),
            Err(failure) => {
                warn!("devnet tx {hash} failed: {}", failure.desc);
                (failure.code, failure.desc)
            }
        };
        self.history.insert(
            hash.clone(),
            HistoryTx {
                hash: hash.clone(),
                error_code,
                error_desc,
                ledger_seq: self.ledger_seq,
            },
        );

        SubmitResult {
            error_code: codes::SUCCESS,
            hash,
            error_desc: String::new(),
        }
    }

    fn admit(&self, item: &TxItem) -> Result<(), OpFailure> {
        let tx = &item.transaction_json;
        let source = self
            .accounts
            .get(&tx.source_address)
            .ok_or_else(|| OpFailure::new(codes::NOT_EXIST, "source account not exist"))?;

        let signed = source
            .private_key
            .as_ref()
            .is_some_and(|key| item.private_keys.contains(key));
        if !signed {
            return Err(OpFailure::new(codes::NOT_ENOUGH_WEIGHT, "signature weight not enough"));
        }

        if tx.nonce != source.nonce + 1 {
            return Err(OpFailure::new(
                codes::BAD_SEQUENCE,
                format!("bad nonce: expected {}, got {}", source.nonce + 1, tx.nonce),
            ));
        }

        if tx.operations.is_empty() {
            return Err(OpFailure::new(codes::INVALID_PARAMETER, "missing operations"));
        }
        Ok(())
    }

    /// Apply every operation of `tx` atomically; returns the success `error_desc`.
    fn execute(&mut self, tx: &TransactionJson, hash: &str) -> Result<String, OpFailure> {
        let mut work = self.accounts.clone();
        let mut keyring = self.keyring.clone();
        let mut deployed = Vec::new();
        let source = tx.source_address.as_str();

        for (index, op) in tx.operations.iter().enumerate() {
            match op {
                Operation::CreateAccount(body) => {
                    if let Some(address) = create_account(&mut work, &mut keyring, source, body, hash, index)? {
                        deployed.push(json!({"contract_address": address, "operation_index": index}));
                    }
                }
                Operation::IssueAsset(body) => {
                    let record = account_mut(&mut work, source)?;
                    let held = record.assets.entry(body.code.clone()).or_default();
                    *held = held.saturating_add(body.amount);
                }
                Operation::Payment(body) => {
                    invoke(&mut work, source, &body.dest_address, 0, &body.input, hash)?;
                }
                Operation::PayCoin(body) => {
                    let from = if body.source_address.is_empty() {
                        source
                    } else {
                        body.source_address.as_str()
                    };
                    invoke(&mut work, from, &body.dest_address, body.amount, &body.input, hash)?;
                }
            }
        }

        self.accounts = work;
        self.keyring = keyring;
        debug!("devnet applied {hash} ({} ops)", tx.operations.len());

        if deployed.is_empty() {
            Ok(String::new())
        } else {
            Ok(serde_json::Value::Array(deployed).to_string())
        }
    }
}

fn account_mut<'a>(
    accounts: &'a mut HashMap<String, AccountRecord>,
    address: &str,
) -> Result<&'a mut AccountRecord, OpFailure> {
    accounts
        .get_mut(address)
        .ok_or_else(|| OpFailure::new(codes::NOT_EXIST, format!("account {address} not exist")))
}

fn debit(accounts: &mut HashMap<String, AccountRecord>, address: &str, amount: u64) -> Result<(), OpFailure> {
    let record = account_mut(accounts, address)?;
    record.balance = record
        .balance
        .checked_sub(amount)
        .ok_or_else(|| OpFailure::new(codes::ACCOUNT_LOW_RESERVE, format!("{address} balance too low")))?;
    Ok(())
}

/// Returns the new contract address when the operation deploys one.
fn create_account(
    accounts: &mut HashMap<String, AccountRecord>,
    keyring: &mut HashMap<String, String>,
    source: &str,
    body: &CreateAccount,
    hash: &str,
    index: usize,
) -> Result<Option<String>, OpFailure> {
    debit(accounts, source, body.init_balance)?;

    if let Some(contract) = &body.contract {
        if contract.payload != CONFIDENTIAL_CONTRACT_PAYLOAD {
            return Err(OpFailure::new(codes::INVALID_PARAMETER, "unsupported contract payload"));
        }
        let address = derive_address(format!("{hash}:{index}").as_bytes());
        let mut record = AccountRecord::new(address.clone(), None, body.init_balance);
        record.contract = Some(contract.payload.clone());
        accounts.insert(address.clone(), record);
        return Ok(Some(address));
    }

    if body.dest_address.is_empty() {
        return Err(OpFailure::new(codes::INVALID_PARAMETER, "missing dest_address"));
    }
    if accounts.contains_key(&body.dest_address) {
        return Err(OpFailure::new(
            codes::ALREADY_EXISTS,
            format!("account {} already exists", body.dest_address),
        ));
    }
    let key = keyring.remove(&body.dest_address);
    accounts.insert(
        body.dest_address.clone(),
        AccountRecord::new(body.dest_address.clone(), key, body.init_balance),
    );
    Ok(None)
}

/// Move `amount` to `dest` and run its contract, if it has one.
fn invoke(
    accounts: &mut HashMap<String, AccountRecord>,
    source: &str,
    dest: &str,
    amount: u64,
    input: &str,
    hash: &str,
) -> Result<(), OpFailure> {
    if !accounts.contains_key(dest) {
        return Err(OpFailure::new(codes::NOT_EXIST, format!("account {dest} not exist")));
    }
    debit(accounts, source, amount)?;

    let record = account_mut(accounts, dest)?;
    record.balance = record.balance.saturating_add(amount);
    if record.contract.is_none() {
        return Ok(());
    }

    let mut context = ContractContext {
        storage: &mut record.metadata,
        sender: source,
        tx_hash: hash,
    };
    context
        .execute(input)
        .map_err(|e| OpFailure::new(codes::CONTRACT_EXECUTE_FAIL, e.to_string()))
}
