//! Command implementations, generic over the ledger they run against.

use std::time::Duration;

use anyhow::Context;
use log::info;

use shroud_account::Account;
use shroud_client::{HttpClientConfig, HttpLedgerClient, LedgerClient};
use shroud_config::ShroudConfig;
use shroud_core::scenario::{ALICE, BOB, CAROL, ISSUER};
use shroud_core::{Finality, ScenarioDriver, TransferReceipt};
use shroud_devnet::{DEFAULT_GENESIS_BALANCE, DevnetLedger};

pub enum Command {
    Run,
    Setup,
    Balance(String),
    VerifyFixtures,
}

pub enum Target {
    Node,
    Devnet,
}

pub async fn execute(command: Command, target: Target, config: ShroudConfig) -> anyhow::Result<()> {
    match target {
        Target::Devnet => {
            let genesis = Account::new(&config.genesis.address, &config.genesis.private_key);
            println!("🧪 Using in-process devnet");
            dispatch(command, DevnetLedger::new(&genesis, DEFAULT_GENESIS_BALANCE), config).await
        }
        Target::Node => {
            println!("🌐 Using ledger node at {}", config.node.url);
            let client = HttpLedgerClient::new(HttpClientConfig {
                base_url: config.node.url.clone(),
                timeout: Duration::from_secs(config.node.timeout_secs),
            })
            .context("building HTTP client")?;
            dispatch(command, client, config).await
        }
    }
}

async fn dispatch<C: LedgerClient>(command: Command, client: C, config: ShroudConfig) -> anyhow::Result<()> {
    let driver = ScenarioDriver::setup(client, config).await.context("setup failed")?;
    print_setup(&driver);

    match command {
        Command::Setup => Ok(()),
        Command::Run => {
            let receipts = driver.run_all().await.context("scenario failed")?;
            for (name, receipt) in ["transfer_1_1_1", "split", "transfer_2_1_1", "transfer_1_1"]
                .iter()
                .zip(&receipts)
            {
                print_receipt(name, receipt);
            }
            for role in [ISSUER, ALICE, BOB, CAROL] {
                print_balance(&driver, role).await?;
            }
            Ok(())
        }
        Command::Balance(role) => {
            driver.run_all().await.context("scenario failed")?;
            print_balance(&driver, &role).await
        }
        Command::VerifyFixtures => {
            let receipt = driver.transfer_1_1_1().await.context("capturing fixture transfer")?;
            print_receipt("fixture", &receipt);

            let tally = driver.tally_verify_fixture(&receipt).await?;
            report("tallyVerify", &tally);
            let mut all_ok = tally.is_confirmed();
            for index in 0..receipt.outputs.len() {
                let range = driver.rangeproof_verify_fixture(&receipt, index).await?;
                report(&format!("rangeproofVerify[{index}]"), &range);
                all_ok &= range.is_confirmed();
            }

            if !all_ok {
                anyhow::bail!("fixture verification failed");
            }
            Ok(())
        }
    }
}

fn print_setup<C: LedgerClient>(driver: &ScenarioDriver<C>) {
    println!("✅ Setup complete");
    if let Ok(contract) = driver.directory().contract_address() {
        println!("   contract: {contract}");
    }
    for participant in driver.directory().participants() {
        println!("   {:<8} {}", participant.role.as_str(), participant.address());
    }
}

fn print_receipt(name: &str, receipt: &TransferReceipt) {
    println!(
        "✅ {name}: {} inputs, {} outputs, tx {}",
        receipt.inputs.len(),
        receipt.outputs.len(),
        receipt.hash
    );
}

async fn print_balance<C: LedgerClient>(driver: &ScenarioDriver<C>, role: &str) -> anyhow::Result<()> {
    let balance = driver
        .balance(role)
        .await
        .with_context(|| format!("reading balance of {role}"))?;
    info!("{role} holds {} tokens", balance.values.len());
    println!("💰 {role}: {} {:?}", balance.total, balance.values);
    Ok(())
}

fn report(check: &str, finality: &Finality) {
    match finality {
        Finality::Confirmed(_) => println!("✅ {check}: verified"),
        Finality::Rejected { code, desc } => println!("❌ {check}: rejected ({code}) {desc}"),
        Finality::TimedOut { attempts } => println!("⏳ {check}: no result after {attempts} attempts"),
    }
}
