use std::time::Duration;

use shroud_account::Account;
use shroud_client::{LedgerClient, RetryPolicy};
use shroud_config::ShroudConfig;
use shroud_core::scenario::{ALICE, BOB, CAROL, ISSUER};
use shroud_core::{EngineError, Finality, ScenarioDriver, SubmissionOrchestrator, TxBatch, resolve_nonce, verify};
use shroud_devnet::{DEFAULT_GENESIS_BALANCE, DevnetLedger, FaultPlan};
use shroud_transaction::contract::TALLY_RESULT_KEY;
use shroud_transaction::{Operation, codes};

fn test_config() -> ShroudConfig {
    let mut config = ShroudConfig::default();
    config.genesis.address = "sh1genesis".into();
    config.genesis.private_key = "privgenesis".into();
    config.batch.chunk_pause_ms = 0;
    config.finality.max_attempts = 5;
    config.finality.interval_ms = 1;
    config.propagation.max_attempts = 5;
    config.propagation.interval_ms = 1;
    config
}

async fn driver_with(config: ShroudConfig) -> ScenarioDriver<DevnetLedger> {
    let genesis = Account::new(&config.genesis.address, &config.genesis.private_key);
    let ledger = DevnetLedger::new(&genesis, DEFAULT_GENESIS_BALANCE);
    ScenarioDriver::setup(ledger, config).await.unwrap()
}

async fn driver() -> ScenarioDriver<DevnetLedger> {
    driver_with(test_config()).await
}

fn flip_first_hex_digit(s: &str) -> String {
    let mut chars: Vec<char> = s.chars().collect();
    chars[0] = if chars[0] == '0' { '1' } else { '0' };
    chars.into_iter().collect()
}

#[tokio::test]
async fn test_setup_issues_supply_to_issuer() {
    let driver = driver().await;

    assert!(driver.directory().is_sealed());
    assert!(driver.directory().contract_address().is_ok());

    let issuer = driver.balance(ISSUER).await.unwrap();
    assert_eq!(issuer.values, vec![100_000_000]);
    for role in [ALICE, BOB, CAROL] {
        assert_eq!(driver.balance(role).await.unwrap().total, 0);
    }
}

#[tokio::test]
async fn test_one_input_payment_with_change() {
    let driver = driver().await;
    let receipt = driver.transfer_1_1_1().await.unwrap();

    assert_eq!(receipt.inputs.len(), 1);
    assert_eq!(receipt.outputs.len(), 2);
    assert_eq!(receipt.outputs[0].to, driver.participant(ALICE).unwrap().address());
    assert_eq!(receipt.outputs[1].to, driver.participant(ISSUER).unwrap().address());
    assert!(receipt.outcome.is_confirmed());

    assert_eq!(driver.balance(ALICE).await.unwrap().total, 50_000_000);
    assert_eq!(driver.balance(ISSUER).await.unwrap().total, 50_000_000);
}

#[tokio::test]
async fn test_all_scenarios_balance_exactly() {
    let driver = driver().await;
    let receipts = driver.run_all().await.unwrap();

    // alice -> bob combines the 30M output of the split with its 20M change.
    let consolidation = &receipts[2];
    assert_eq!(consolidation.inputs.len(), 2);
    assert_eq!(consolidation.outputs.len(), 2);

    // bob -> carol spends bob's single 40M token exactly.
    let exact = &receipts[3];
    assert_eq!(exact.inputs.len(), 1);
    assert_eq!(exact.outputs.len(), 1);

    assert_eq!(driver.balance(ISSUER).await.unwrap().total, 50_000_000);
    assert_eq!(driver.balance(ALICE).await.unwrap().values, vec![10_000_000]);
    assert_eq!(driver.balance(BOB).await.unwrap().total, 0);
    assert_eq!(driver.balance(CAROL).await.unwrap().values, vec![40_000_000]);
}

#[tokio::test]
async fn test_outputs_carry_valid_range_proofs() {
    let driver = driver().await;
    let receipt = driver.transfer_1_1_1().await.unwrap();

    for output in &receipt.outputs {
        assert!(verify::verify_range_proof(&output.commit, &output.range_proof));
    }

    let mut proof = hex::decode(&receipt.outputs[0].range_proof).unwrap();
    proof[10] ^= 0x01;
    assert!(!verify::verify_range_proof(&receipt.outputs[0].commit, &hex::encode(proof)));
}

#[tokio::test]
async fn test_nonces_increase_per_transfer() {
    let driver = driver().await;
    let issuer = driver.participant(ISSUER).unwrap().address().to_string();

    let before = resolve_nonce(driver.client(), &issuer, None).await.unwrap();
    driver.transfer_1_1_1().await.unwrap();
    let after = resolve_nonce(driver.client(), &issuer, None).await.unwrap();
    assert_eq!(after, before + 1);
}

#[tokio::test]
async fn test_out_of_order_submission_is_rejected() {
    let driver = driver().await;
    let alice = driver.participant(ALICE).unwrap().account.clone();
    let policy = RetryPolicy::fixed(5, Duration::from_millis(1));
    let orchestrator = SubmissionOrchestrator::new(driver.client(), 10, Duration::ZERO, policy);

    let nonce = resolve_nonce(driver.client(), &alice.address, None).await.unwrap();
    let batch_for = |nonce: u64, dest: &str| {
        let mut batch = TxBatch::new(1000);
        batch
            .add_operation(&alice, nonce, Operation::create_account(dest, 1), 100)
            .unwrap();
        batch
    };

    let err = orchestrator
        .submit(batch_for(nonce + 1, "sh1second"))
        .await
        .unwrap()
        .single_hash()
        .unwrap_err();
    assert!(matches!(err, EngineError::NodeRejected { code: codes::BAD_SEQUENCE, .. }));

    let first = orchestrator.submit(batch_for(nonce, "sh1first")).await.unwrap();
    assert!(first.single_hash().is_ok());
    let second = orchestrator.submit(batch_for(nonce + 1, "sh1second")).await.unwrap();
    assert!(second.single_hash().is_ok());
}

#[tokio::test]
async fn test_tampered_output_is_rejected_by_contract() {
    let driver = driver().await;
    let mut candidate = driver.build_transfer(ISSUER, ALICE, 50_000_000).await.unwrap();
    assert!(candidate.tally_ok);

    candidate.outputs[0].encrypt_value = flip_first_hex_digit(&candidate.outputs[0].encrypt_value);

    // The local audit would have caught it.
    assert!(
        verify::audit_transfer(
            "issuer",
            &candidate.excess_sig,
            &candidate.excess_msg,
            &candidate.inputs,
            &candidate.input_commits,
            &candidate.outputs,
        )
        .is_err()
    );

    let receipt = driver.submit_transfer(ISSUER, candidate).await.unwrap();
    assert!(matches!(
        receipt.outcome,
        Finality::Rejected { code: codes::CONTRACT_EXECUTE_FAIL, .. }
    ));
    assert!(receipt.clone().confirmed().is_err());

    // Nothing moved.
    assert_eq!(driver.balance(ISSUER).await.unwrap().values, vec![100_000_000]);
    assert_eq!(driver.balance(ALICE).await.unwrap().total, 0);

    // A rebuilt transfer with a fresh nonce goes through.
    driver.transfer_1_1_1().await.unwrap();
}

#[tokio::test]
async fn test_skewed_construction_is_never_submitted() {
    let driver = driver().await;
    driver.client().set_faults(FaultPlan {
        skew_output_value: true,
        ..FaultPlan::default()
    });
    let submits = driver.client().submit_calls();

    let err = driver.transfer_1_1_1().await.unwrap_err();
    assert!(matches!(err, EngineError::TallyMismatch(_)));
    assert_eq!(driver.client().submit_calls(), submits);
}

#[tokio::test]
async fn test_fixture_verifications() {
    let driver = driver().await;
    let receipt = driver.transfer_1_1_1().await.unwrap();

    assert!(driver.tally_verify_fixture(&receipt).await.unwrap().is_confirmed());
    let contract = driver.directory().contract_address().unwrap();
    let recorded = driver
        .client()
        .get_account_metadata(contract, TALLY_RESULT_KEY)
        .await
        .unwrap();
    assert_eq!(recorded.as_deref(), Some("true"));

    assert!(driver.rangeproof_verify_fixture(&receipt, 1).await.unwrap().is_confirmed());
    assert!(matches!(
        driver.rangeproof_verify_fixture(&receipt, 2).await,
        Err(EngineError::InvalidCandidate(_))
    ));

    let mut forged = receipt.clone();
    forged.input_commits = vec![receipt.outputs[1].commit.clone()];
    assert!(matches!(
        driver.tally_verify_fixture(&forged).await.unwrap(),
        Finality::Rejected { code: codes::CONTRACT_EXECUTE_FAIL, .. }
    ));
}

#[tokio::test]
async fn test_finality_timeout_is_a_failure() {
    let driver = driver().await;
    driver.client().set_faults(FaultPlan {
        history_lag_polls: 1000,
        ..FaultPlan::default()
    });

    let err = driver.transfer_1_1_1().await.unwrap_err();
    assert!(matches!(err, EngineError::Timeout { attempts: 5, .. }));
}

#[tokio::test]
async fn test_unknown_role_and_empty_holder() {
    let driver = driver().await;
    assert!(matches!(
        driver.transfer("mallory", ALICE, 1).await,
        Err(EngineError::UnknownRole(_))
    ));
    assert!(matches!(
        driver.transfer(BOB, CAROL, 1).await,
        Err(EngineError::NodeRejected { .. })
    ));
    assert!(matches!(
        driver.transfer(ISSUER, ALICE, 0).await,
        Err(EngineError::InvalidCandidate(_))
    ));
}

#[tokio::test]
async fn test_local_checks_can_be_disabled() {
    let mut config = test_config();
    config.verification.local_checks = false;
    let driver = driver_with(config).await;

    driver.transfer_1_1_1().await.unwrap();
    assert_eq!(driver.balance(ALICE).await.unwrap().total, 50_000_000);
}

#[tokio::test]
async fn test_unreachable_node_fails_setup() {
    let config = test_config();
    let genesis = Account::new(&config.genesis.address, &config.genesis.private_key);
    let ledger = DevnetLedger::new(&genesis, DEFAULT_GENESIS_BALANCE).with_faults(FaultPlan {
        unreachable: true,
        ..FaultPlan::default()
    });

    let err = ScenarioDriver::setup(ledger, config).await.err().unwrap();
    assert!(matches!(err, EngineError::TransportFailure(_)));
}
