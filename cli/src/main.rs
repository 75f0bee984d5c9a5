mod commands;

use std::env;
use std::path::PathBuf;

use anyhow::Context;
use shroud_config::ShroudConfig;

use commands::{Command, Target};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let command = match args[1].as_str() {
        "run" => Command::Run,
        "setup" => Command::Setup,
        "balance" => match args.get(2).filter(|a| !a.starts_with("--")) {
            Some(role) => Command::Balance(role.clone()),
            None => {
                println!("Usage: balance <role>");
                println!("  role - issuer, alice, bob or carol");
                return;
            }
        },
        "verify-fixtures" => Command::VerifyFixtures,
        "sample-config" => {
            print!("{}", ShroudConfig::generate_sample());
            return;
        }
        "help" | "--help" | "-h" => {
            print_usage();
            return;
        }
        cmd => {
            println!("❌ Unknown command: {}", cmd);
            println!();
            print_usage();
            std::process::exit(1);
        }
    };

    let options = parse_options(&args[2..]);
    let config = match load_config(&options) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Error loading config: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = commands::execute(command, options.target, config).await {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

struct Options {
    target: Target,
    node_url: Option<String>,
    config_path: Option<PathBuf>,
}

fn parse_options(args: &[String]) -> Options {
    let mut options = Options {
        target: Target::Node,
        node_url: None,
        config_path: None,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--devnet" => {
                options.target = Target::Devnet;
            }
            "--node" => {
                if let Some(url) = args.get(i + 1) {
                    options.node_url = Some(url.clone());
                    i += 1;
                }
            }
            "--config" => {
                if let Some(path) = args.get(i + 1) {
                    options.config_path = Some(PathBuf::from(path));
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    options
}

fn load_config(options: &Options) -> anyhow::Result<ShroudConfig> {
    let mut config = match &options.config_path {
        Some(path) => ShroudConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ShroudConfig::load()?,
    };
    if let Some(url) = &options.node_url {
        config.node.url = url.clone();
    }
    Ok(config)
}

fn print_usage() {
    println!("Shroud CLI - Confidential Transfer Lifecycle Tool");
    println!();
    println!("USAGE:");
    println!("  shroud <command> [options]");
    println!();
    println!("COMMANDS:");
    println!("  run                        Setup, run every transfer scenario, print balances");
    println!("  setup                      Fund participants, deploy the contract, issue supply");
    println!("  balance <role>             Run the scenarios, then print one role's holdings");
    println!("  verify-fixtures            Re-check a captured transfer through the contract");
    println!("  sample-config              Print a sample shroud.toml");
    println!("  help                       Show this help message");
    println!();
    println!("OPTIONS:");
    println!("  --devnet                   Use an in-process ledger instead of a node");
    println!("  --node <url>               Ledger node URL (default: http://127.0.0.1:29333/)");
    println!("  --config <path>            Config file (default: ./shroud.toml, ~/.shroud/config.toml)");
    println!();
    println!("EXAMPLES:");
    println!("  shroud run --devnet                  # Full lifecycle against the devnet");
    println!("  shroud balance carol --devnet        # Carol's holdings after the scenarios");
    println!("  shroud setup --node http://10.0.0.5:29333/");
    println!("  shroud sample-config > shroud.toml");
    println!();
    println!("ENVIRONMENT VARIABLES:");
    println!("  SHROUD_CONFIG        Config file path");
    println!("  SHROUD_NODE_URL      Ledger node URL");
    println!("  SHROUD_LOCAL_CHECKS  Run tally/range checks before submitting (1/true)");
    println!("  RUST_LOG             Log level (debug/info/warn/error)");
}
