//! Batching, submission and confirmation.
//!
//! ```text
//! ┌──────────┐   submit   ┌─────────┐  chunks sent  ┌───────────┐
//! │ Building │ ─────────▶ │ Batched │ ────────────▶ │ Submitted │
//! └──────────┘            └─────────┘               └─────┬─────┘
//!                                           wait_for_finality │
//!                        ┌───────────┬──────────────┬─────────┘
//!                        ▼           ▼              ▼
//!                    Confirmed    Rejected       TimedOut
//! ```
//!
//! Nothing here resubmits. A rejected or timed-out item is reported to the
//! caller, who rebuilds it with a fresh nonce if it wants to retry.

use std::time::Duration;

use log::{debug, info, warn};

use shroud_account::Account;
use shroud_client::{Attempt, HistoryTx, LedgerClient, RetryPolicy};
use shroud_config::ShroudConfig;
use shroud_transaction::{Operation, SubmitResult, TransactionJson, TxItem, codes};

use crate::error::{EngineError, Result};
use crate::poll_policy;

// ============================================================================
// Batch State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Operations are still being added.
    Building,
    /// Split into chunks, nothing sent yet.
    Batched,
    /// Every chunk has been handed to the node.
    Submitted,
    Confirmed,
    Rejected,
    TimedOut,
}

/// Terminal status of one submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finality {
    /// Applied; carries the history entry (its `error_desc` may hold results
    /// such as a deployed contract address).
    Confirmed(HistoryTx),
    /// Applied with a non-zero error code; the nonce is consumed.
    Rejected { code: i32, desc: String },
    /// No definitive status within the polling budget. The transaction may
    /// or may not have applied.
    TimedOut { attempts: u32 },
}

impl Finality {
    pub fn state(&self) -> BatchState {
        match self {
            Finality::Confirmed(_) => BatchState::Confirmed,
            Finality::Rejected { .. } => BatchState::Rejected,
            Finality::TimedOut { .. } => BatchState::TimedOut,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Finality::Confirmed(_))
    }

    /// Turn anything but `Confirmed` into an error.
    pub fn confirmed(self, what: &str) -> Result<HistoryTx> {
        match self {
            Finality::Confirmed(tx) => Ok(tx),
            Finality::Rejected { code, desc } => Err(EngineError::NodeRejected {
                module: what.to_string(),
                code,
                desc,
            }),
            Finality::TimedOut { attempts } => Err(EngineError::Timeout {
                what: what.to_string(),
                attempts,
            }),
        }
    }

    /// The error this outcome amounts to, if it is not `Confirmed`.
    pub fn error(&self, what: &str) -> Option<EngineError> {
        self.clone().confirmed(what).err()
    }
}

// ============================================================================
// Batch
// ============================================================================

/// Items to submit, one per (source, nonce).
#[derive(Debug)]
pub struct TxBatch {
    items: Vec<TxItem>,
    gas_price: u64,
    state: BatchState,
}

impl TxBatch {
    pub fn new(gas_price: u64) -> Self {
        Self {
            items: Vec::new(),
            gas_price,
            state: BatchState::Building,
        }
    }

    /// Append `op` to the item of `source` at `nonce`, creating it if needed.
    ///
    /// Items of one source must use consecutive nonces in the order they
    /// are added. The item's fee limit is the largest requested by its
    /// operations.
    pub fn add_operation(&mut self, source: &Account, nonce: u64, op: Operation, fee_limit: u64) -> Result<()> {
        let last = self
            .items
            .iter()
            .rposition(|item| item.transaction_json.source_address == source.address);

        if let Some(index) = last {
            let tx = &mut self.items[index].transaction_json;
            if tx.nonce == nonce {
                tx.fee_limit = tx.fee_limit.max(fee_limit);
                tx.operations.push(op);
                return Ok(());
            }
            if nonce != tx.nonce + 1 {
                return Err(EngineError::NonceGap {
                    address: source.address.clone(),
                    expected: tx.nonce + 1,
                    got: nonce,
                });
            }
        }

        self.items.push(TxItem {
            transaction_json: TransactionJson {
                source_address: source.address.clone(),
                nonce,
                fee_limit,
                gas_price: self.gas_price,
                operations: vec![op],
            },
            private_keys: vec![source.private_key.clone()],
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn items(&self) -> &[TxItem] {
        &self.items
    }

    fn transition(&mut self, next: BatchState) {
        debug!("batch {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

// ============================================================================
// Submission Result
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Admitted by the node; poll `hash` for finality.
    Accepted { hash: String },
    /// Refused by the node at submission.
    Rejected { hash: String, code: i32, desc: String },
    /// Never reached the node because its chunk failed in transport.
    Unsent { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub source: String,
    pub nonce: u64,
    pub outcome: ItemOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionResult {
    /// Sum of the node-reported success counts of every chunk.
    pub success_count: usize,
    /// Number of `submitTransaction` calls made.
    pub chunks: usize,
    /// One report per batch item, in batch order.
    pub items: Vec<ItemReport>,
}

impl SubmissionResult {
    /// Hashes of accepted items, in batch order.
    pub fn accepted_hashes(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter_map(|item| match &item.outcome {
                ItemOutcome::Accepted { hash } => Some(hash.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Items that were refused or never sent.
    pub fn failures(&self) -> impl Iterator<Item = &ItemReport> {
        self.items
            .iter()
            .filter(|item| !matches!(item.outcome, ItemOutcome::Accepted { .. }))
    }

    /// The hash of a single-item submission, or the reason it failed.
    pub fn single_hash(&self) -> Result<String> {
        match self.items.as_slice() {
            [item] => match &item.outcome {
                ItemOutcome::Accepted { hash } => Ok(hash.clone()),
                ItemOutcome::Rejected { code, desc, .. } => Err(EngineError::NodeRejected {
                    module: "submitTransaction".into(),
                    code: *code,
                    desc: desc.clone(),
                }),
                ItemOutcome::Unsent { reason } => Err(EngineError::TransportFailure(reason.clone())),
            },
            items => Err(EngineError::InvalidCandidate(format!(
                "expected one submitted item, got {}",
                items.len()
            ))),
        }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct SubmissionOrchestrator<'a, C> {
    client: &'a C,
    max_items: usize,
    chunk_pause: Duration,
    finality: RetryPolicy,
}

impl<'a, C: LedgerClient> SubmissionOrchestrator<'a, C> {
    pub fn new(client: &'a C, max_items: usize, chunk_pause: Duration, finality: RetryPolicy) -> Self {
        Self {
            client,
            max_items: max_items.max(1),
            chunk_pause,
            finality,
        }
    }

    pub fn from_config(client: &'a C, config: &ShroudConfig) -> Self {
        Self::new(
            client,
            config.batch.max_items,
            Duration::from_millis(config.batch.chunk_pause_ms),
            poll_policy(&config.finality),
        )
    }

    /// Submit `batch` in chunks of at most `max_items` items.
    ///
    /// Chunks go out sequentially with a pause before every chunk after the
    /// first. A chunk that fails in transport stops the submission; its
    /// items and all later ones are reported as unsent.
    pub async fn submit(&self, mut batch: TxBatch) -> Result<SubmissionResult> {
        let mut result = SubmissionResult::default();
        if batch.is_empty() {
            return Ok(result);
        }

        batch.transition(BatchState::Batched);
        let chunk_count = batch.items.len().div_ceil(self.max_items);
        let mut halted: Option<String> = None;

        for (index, chunk) in batch.items.chunks(self.max_items).enumerate() {
            if let Some(reason) = &halted {
                result.items.extend(chunk.iter().map(|item| unsent(item, reason)));
                continue;
            }
            if index > 0 && !self.chunk_pause.is_zero() {
                tokio::time::sleep(self.chunk_pause).await;
            }

            match self.client.submit_transaction(chunk).await {
                Ok(response) => {
                    result.chunks += 1;
                    result.success_count += response.success_count;
                    info!(
                        "chunk {}/{}: {} items, {} accepted",
                        index + 1,
                        chunk_count,
                        chunk.len(),
                        response.success_count
                    );
                    for (pos, item) in chunk.iter().enumerate() {
                        result.items.push(report(item, response.results.get(pos)));
                    }
                }
                Err(e) => {
                    result.chunks += 1;
                    let reason = e.to_string();
                    warn!("chunk {}/{} not submitted: {reason}", index + 1, chunk_count);
                    result.items.extend(chunk.iter().map(|item| unsent(item, &reason)));
                    halted = Some(reason);
                }
            }
        }

        for failure in result.failures() {
            match &failure.outcome {
                ItemOutcome::Rejected { code, desc, .. } => warn!(
                    "{} nonce {} rejected with error_code {code}: {desc}",
                    failure.source, failure.nonce
                ),
                ItemOutcome::Unsent { reason } => {
                    warn!("{} nonce {} unsent: {reason}", failure.source, failure.nonce)
                }
                ItemOutcome::Accepted { .. } => {}
            }
        }

        batch.transition(BatchState::Submitted);
        Ok(result)
    }

    /// Poll history until `hash` is applied, rejected, or the policy runs out.
    ///
    /// A lookup error means "not yet applied". Polling never resubmits, so
    /// calling this again on a confirmed hash is harmless.
    pub async fn wait_for_finality(&self, hash: &str) -> Finality {
        let client = self.client;
        let outcome = self
            .finality
            .run("finality", |_| async move {
                match client.get_transaction_history(hash).await {
                    Ok(history) => match history.find(hash) {
                        Some(tx) if tx.error_code == codes::SUCCESS => Attempt::Done(Finality::Confirmed(tx.clone())),
                        Some(tx) => Attempt::Done(Finality::Rejected {
                            code: tx.error_code,
                            desc: tx.error_desc.clone(),
                        }),
                        None => Attempt::Retry(format!("{hash} missing from history")),
                    },
                    Err(e) => Attempt::Retry(e.to_string()),
                }
            })
            .await;

        let finality = match outcome {
            Ok(finality) => finality,
            Err(exhausted) => {
                warn!(
                    "{hash} unresolved after {} attempts: {}",
                    exhausted.attempts, exhausted.last
                );
                Finality::TimedOut {
                    attempts: exhausted.attempts,
                }
            }
        };
        info!("{hash}: {:?}", finality.state());
        finality
    }
}

fn unsent(item: &TxItem, reason: &str) -> ItemReport {
    ItemReport {
        source: item.transaction_json.source_address.clone(),
        nonce: item.transaction_json.nonce,
        outcome: ItemOutcome::Unsent {
            reason: reason.to_string(),
        },
    }
}

fn report(item: &TxItem, result: Option<&SubmitResult>) -> ItemReport {
    let outcome = match result {
        Some(r) if r.is_success() => ItemOutcome::Accepted { hash: r.hash.clone() },
        Some(r) => ItemOutcome::Rejected {
            hash: r.hash.clone(),
            code: r.error_code,
            desc: r.error_desc.clone(),
        },
        None => ItemOutcome::Rejected {
            hash: String::new(),
            code: codes::INTERNAL_ERROR,
            desc: "no result returned for item".into(),
        },
    };
    ItemReport {
        source: item.transaction_json.source_address.clone(),
        nonce: item.transaction_json.nonce,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shroud_devnet::{DevnetLedger, FaultPlan};

    fn genesis() -> Account {
        Account::new("sh1genesis", "privgenesis")
    }

    fn fast() -> RetryPolicy {
        RetryPolicy::fixed(5, Duration::from_millis(1))
    }

    async fn funding_batch(ledger: &DevnetLedger, count: usize) -> TxBatch {
        let g = genesis();
        let mut batch = TxBatch::new(1000);
        for i in 0..count {
            let account = ledger.create_account().await.unwrap();
            batch
                .add_operation(&g, i as u64 + 1, Operation::create_account(&account.address, 10), 100)
                .unwrap();
        }
        batch
    }

    #[test]
    fn test_operations_share_an_item_per_nonce() {
        let g = genesis();
        let mut batch = TxBatch::new(1000);
        batch.add_operation(&g, 1, Operation::create_account("sh1a", 1), 100).unwrap();
        batch.add_operation(&g, 1, Operation::create_account("sh1b", 1), 300).unwrap();
        batch.add_operation(&g, 2, Operation::create_account("sh1c", 1), 100).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.items()[0].transaction_json.operations.len(), 2);
        assert_eq!(batch.items()[0].transaction_json.fee_limit, 300);
        assert_eq!(batch.state(), BatchState::Building);
    }

    #[test]
    fn test_nonce_gap_is_refused() {
        let g = genesis();
        let mut batch = TxBatch::new(1000);
        batch.add_operation(&g, 4, Operation::create_account("sh1a", 1), 100).unwrap();

        let err = batch
            .add_operation(&g, 6, Operation::create_account("sh1b", 1), 100)
            .unwrap_err();
        assert!(matches!(err, EngineError::NonceGap { expected: 5, got: 6, .. }));
        assert!(batch.add_operation(&g, 3, Operation::create_account("sh1b", 1), 100).is_err());

        // Another source has its own sequence.
        let other = Account::new("sh1other", "privother");
        batch.add_operation(&other, 9, Operation::create_account("sh1c", 1), 100).unwrap();
    }

    #[tokio::test]
    async fn test_batch_splits_into_ceil_chunks() {
        let ledger = DevnetLedger::new(&genesis(), 1_000_000);
        let batch = funding_batch(&ledger, 7).await;
        let orchestrator = SubmissionOrchestrator::new(&ledger, 3, Duration::ZERO, fast());

        let result = orchestrator.submit(batch).await.unwrap();
        assert_eq!(ledger.submit_calls(), 3);
        assert_eq!(result.chunks, 3);
        assert_eq!(result.items.len(), 7);
        assert_eq!(result.success_count, 7);
        assert_eq!(result.accepted_hashes().len(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_precedes_every_chunk_but_the_first() {
        let pause = Duration::from_millis(100);
        let ledger = DevnetLedger::new(&genesis(), 1_000_000);
        let orchestrator = SubmissionOrchestrator::new(&ledger, 3, pause, fast());

        let batch = funding_batch(&ledger, 7).await;
        let started = tokio::time::Instant::now();
        let result = orchestrator.submit(batch).await.unwrap();
        assert_eq!(result.chunks, 3);
        assert_eq!(started.elapsed(), 2 * pause);

        // A single chunk goes out immediately.
        let mut single = TxBatch::new(1000);
        for nonce in 8..10 {
            let account = ledger.create_account().await.unwrap();
            single
                .add_operation(&genesis(), nonce, Operation::create_account(&account.address, 10), 100)
                .unwrap();
        }
        let started = tokio::time::Instant::now();
        let result = orchestrator.submit(single).await.unwrap();
        assert_eq!(result.chunks, 1);
        assert_eq!(result.success_count, 2);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_success_count_matches_accepted_items() {
        let ledger = DevnetLedger::new(&genesis(), 1_000_000);
        let g = genesis();
        let mut batch = TxBatch::new(1000);
        batch.add_operation(&g, 1, Operation::create_account("sh1a", 1), 100).unwrap();
        // Unknown source: refused at admission.
        let stranger = Account::new("sh1stranger", "privstranger");
        batch.add_operation(&stranger, 1, Operation::create_account("sh1b", 1), 100).unwrap();
        batch.add_operation(&g, 2, Operation::create_account("sh1c", 1), 100).unwrap();

        let orchestrator = SubmissionOrchestrator::new(&ledger, 2, Duration::ZERO, fast());
        let result = orchestrator.submit(batch).await.unwrap();

        assert_eq!(ledger.submit_calls(), 2);
        assert_eq!(result.success_count, 2);
        assert_eq!(result.failures().count(), 1);
        let failure = result.failures().next().unwrap();
        assert_eq!(failure.source, "sh1stranger");
        assert!(matches!(failure.outcome, ItemOutcome::Rejected { code: codes::NOT_EXIST, .. }));
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_calls() {
        let ledger = DevnetLedger::new(&genesis(), 1_000_000);
        let orchestrator = SubmissionOrchestrator::new(&ledger, 3, Duration::ZERO, fast());
        let result = orchestrator.submit(TxBatch::new(1000)).await.unwrap();
        assert_eq!(result, SubmissionResult::default());
        assert_eq!(ledger.submit_calls(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_marks_items_unsent() {
        let ledger = DevnetLedger::new(&genesis(), 1_000_000);
        let batch = funding_batch(&ledger, 4).await;
        ledger.set_faults(FaultPlan {
            unreachable: true,
            ..FaultPlan::default()
        });
        let orchestrator = SubmissionOrchestrator::new(&ledger, 2, Duration::ZERO, fast());

        let result = orchestrator.submit(batch).await.unwrap();
        assert_eq!(result.success_count, 0);
        assert_eq!(result.chunks, 1);
        assert_eq!(result.failures().count(), 4);
        assert!(result
            .items
            .iter()
            .all(|item| matches!(item.outcome, ItemOutcome::Unsent { .. })));
    }

    #[tokio::test]
    async fn test_finality_confirms_and_repoll_is_idempotent() {
        let ledger = DevnetLedger::new(&genesis(), 1_000_000);
        let batch = funding_batch(&ledger, 1).await;
        let orchestrator = SubmissionOrchestrator::new(&ledger, 10, Duration::ZERO, fast());

        let result = orchestrator.submit(batch).await.unwrap();
        let hash = result.single_hash().unwrap();

        assert!(orchestrator.wait_for_finality(&hash).await.is_confirmed());
        assert!(orchestrator.wait_for_finality(&hash).await.is_confirmed());
        assert_eq!(ledger.submit_calls(), 1);
    }

    #[tokio::test]
    async fn test_finality_waits_out_history_lag() {
        let ledger = DevnetLedger::new(&genesis(), 1_000_000).with_faults(FaultPlan {
            history_lag_polls: 3,
            ..FaultPlan::default()
        });
        let batch = funding_batch(&ledger, 1).await;
        let orchestrator = SubmissionOrchestrator::new(&ledger, 10, Duration::ZERO, fast());
        let hash = orchestrator.submit(batch).await.unwrap().single_hash().unwrap();

        assert!(orchestrator.wait_for_finality(&hash).await.is_confirmed());
    }

    #[tokio::test]
    async fn test_finality_times_out() {
        let ledger = DevnetLedger::new(&genesis(), 1_000_000).with_faults(FaultPlan {
            history_lag_polls: 100,
            ..FaultPlan::default()
        });
        let batch = funding_batch(&ledger, 1).await;
        let orchestrator = SubmissionOrchestrator::new(&ledger, 10, Duration::ZERO, fast());
        let hash = orchestrator.submit(batch).await.unwrap().single_hash().unwrap();

        let finality = orchestrator.wait_for_finality(&hash).await;
        assert_eq!(finality, Finality::TimedOut { attempts: 5 });
        assert!(matches!(
            finality.confirmed("funding"),
            Err(EngineError::Timeout { attempts: 5, .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_execution_is_rejected() {
        let ledger = DevnetLedger::new(&genesis(), 1_000_000);
        let g = genesis();
        let mut batch = TxBatch::new(1000);
        // Funding more than genesis holds fails at execution, after admission.
        batch
            .add_operation(&g, 1, Operation::create_account("sh1rich", 10_000_000), 100)
            .unwrap();
        let orchestrator = SubmissionOrchestrator::new(&ledger, 10, Duration::ZERO, fast());
        let hash = orchestrator.submit(batch).await.unwrap().single_hash().unwrap();

        let finality = orchestrator.wait_for_finality(&hash).await;
        assert!(matches!(
            finality,
            Finality::Rejected { code: codes::ACCOUNT_LOW_RESERVE, .. }
        ));
    }
}
