//! Participant registry and nonce resolution.
//!
//! The directory is filled during setup, then sealed; after that it is
//! only read. Nonces are never cached here: they are resolved against the
//! ledger right before a batch is built.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info};
use tokio::sync::OwnedMutexGuard;

use shroud_account::{Account, Participant, Role};
use shroud_client::{AccountInfo, Attempt, LedgerClient, RetryPolicy};

use crate::error::{EngineError, Result};

#[derive(Debug)]
pub struct AccountDirectory {
    genesis: Account,
    participants: BTreeMap<Role, Participant>,
    contract_address: Option<String>,
    sealed: bool,
    source_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AccountDirectory {
    pub fn new(genesis: Account) -> Self {
        Self {
            genesis,
            participants: BTreeMap::new(),
            contract_address: None,
            sealed: false,
            source_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&mut self, participant: Participant) -> Result<()> {
        if self.sealed {
            return Err(EngineError::DirectorySealed);
        }
        debug!("registered {} as {}", participant.address(), participant.role);
        self.participants.insert(participant.role.clone(), participant);
        Ok(())
    }

    pub fn set_contract_address(&mut self, address: impl Into<String>) -> Result<()> {
        if self.sealed {
            return Err(EngineError::DirectorySealed);
        }
        self.contract_address = Some(address.into());
        Ok(())
    }

    /// No more registrations after this.
    pub fn seal(&mut self) {
        info!(
            "account directory sealed with {} participants",
            self.participants.len()
        );
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn genesis(&self) -> &Account {
        &self.genesis
    }

    pub fn participant(&self, role: &Role) -> Result<&Participant> {
        self.participants
            .get(role)
            .ok_or_else(|| EngineError::UnknownRole(role.to_string()))
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    pub fn contract_address(&self) -> Result<&str> {
        self.contract_address
            .as_deref()
            .ok_or(EngineError::ContractNotDeployed)
    }

    /// Serialise work on one source account.
    ///
    /// Hold the guard from nonce resolution until the transaction using
    /// that nonce has settled.
    pub async fn lock_source(&self, address: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .source_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            locks.entry(address.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Next nonce for `address`: 1 if it never transacted, otherwise the
/// ledger's nonce + 1.
///
/// `pending` is a caller-known nonce for an account the ledger may not
/// have applied yet; it is used when the account is not found, and wins
/// when it is ahead of the ledger.
pub async fn resolve_nonce<C: LedgerClient>(
    client: &C,
    address: &str,
    pending: Option<u64>,
) -> Result<u64> {
    match client.get_account(address).await {
        Ok(info) => {
            let next = info.nonce.map_or(1, |n| n + 1);
            let nonce = pending.map_or(next, |p| p.max(next));
            debug!("resolved nonce {nonce} for {address}");
            Ok(nonce)
        }
        Err(e) if e.is_not_found() => {
            pending.ok_or_else(|| EngineError::AccountNotFound(address.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Poll until a freshly created account is visible on the ledger.
pub async fn await_account<C: LedgerClient>(
    client: &C,
    address: &str,
    policy: &RetryPolicy,
) -> Result<AccountInfo> {
    let outcome = policy
        .run("account propagation", |_| async move {
            match client.get_account(address).await {
                Ok(info) => Attempt::Done(Ok(info)),
                Err(e) if e.is_not_found() || e.is_transport() => Attempt::Retry(e),
                Err(e) => Attempt::Done(Err(e)),
            }
        })
        .await;

    match outcome {
        Ok(result) => result.map_err(EngineError::from),
        Err(exhausted) if exhausted.last.is_not_found() => {
            Err(EngineError::AccountNotFound(address.to_string()))
        }
        Err(exhausted) => Err(exhausted.last.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use shroud_account::ConfidentialKeyPair;
    use shroud_devnet::{DevnetLedger, FaultPlan};

    fn participant(role: &str) -> Participant {
        Participant {
            role: Role::from(role),
            account: Account::new(format!("sh1{role}"), format!("priv{role}")),
            keys: ConfidentialKeyPair {
                priv_key: format!("{role}-priv"),
                pub_key: format!("{role}-pub"),
            },
        }
    }

    #[test]
    fn test_role_lookup() {
        let mut directory = AccountDirectory::new(Account::new("sh1genesis", "privgenesis"));
        directory.register(participant("alice")).unwrap();

        let alice = directory.participant(&Role::from("alice")).unwrap();
        assert_eq!(alice.address(), "sh1alice");
        assert_eq!(alice.pub_key(), "alice-pub");
        assert!(matches!(
            directory.participant(&Role::from("mallory")),
            Err(EngineError::UnknownRole(_))
        ));
    }

    #[test]
    fn test_sealed_directory_is_read_only() {
        let mut directory = AccountDirectory::new(Account::new("sh1genesis", "privgenesis"));
        assert!(matches!(
            directory.contract_address(),
            Err(EngineError::ContractNotDeployed)
        ));
        directory.set_contract_address("sh1contract").unwrap();
        directory.seal();

        assert!(matches!(
            directory.register(participant("bob")),
            Err(EngineError::DirectorySealed)
        ));
        assert!(directory.set_contract_address("sh1other").is_err());
        assert_eq!(directory.contract_address().unwrap(), "sh1contract");
    }

    #[tokio::test]
    async fn test_lock_source_serialises_per_address() {
        let directory = AccountDirectory::new(Account::new("sh1genesis", "privgenesis"));
        let guard = directory.lock_source("sh1alice").await;

        // A different source is independent.
        let _other = directory.lock_source("sh1bob").await;

        let lock = {
            let locks = directory.source_locks.lock().unwrap();
            locks.get("sh1alice").unwrap().clone()
        };
        assert!(lock.try_lock().is_err());
        drop(guard);
        assert!(lock.try_lock().is_ok());
    }

    fn ledger() -> DevnetLedger {
        DevnetLedger::new(&Account::new("sh1genesis", "privgenesis"), 1_000)
    }

    #[tokio::test]
    async fn test_resolve_nonce_of_fresh_account_is_one() {
        let ledger = ledger();
        assert_eq!(resolve_nonce(&ledger, "sh1genesis", None).await.unwrap(), 1);
        // A pending nonce ahead of the ledger wins.
        assert_eq!(resolve_nonce(&ledger, "sh1genesis", Some(4)).await.unwrap(), 4);
        assert_eq!(resolve_nonce(&ledger, "sh1genesis", Some(0)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_resolve_nonce_of_missing_account() {
        let ledger = ledger();
        assert!(matches!(
            resolve_nonce(&ledger, "sh1nobody", None).await,
            Err(EngineError::AccountNotFound(addr)) if addr == "sh1nobody"
        ));
        assert_eq!(resolve_nonce(&ledger, "sh1nobody", Some(4)).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_await_account() {
        let ledger = ledger();
        let policy = RetryPolicy::fixed(3, Duration::from_millis(1));

        let info = await_account(&ledger, "sh1genesis", &policy).await.unwrap();
        assert_eq!(info.nonce, None);
        assert!(matches!(
            await_account(&ledger, "sh1nobody", &policy).await,
            Err(EngineError::AccountNotFound(_))
        ));

        ledger.set_faults(FaultPlan {
            unreachable: true,
            ..FaultPlan::default()
        });
        assert!(matches!(
            await_account(&ledger, "sh1genesis", &policy).await,
            Err(EngineError::TransportFailure(_))
        ));
    }
}
