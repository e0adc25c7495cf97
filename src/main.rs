use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use ethers_core::types::H256;

use share_trader::abi::{decode_hex, inspect_calldata, parse_address, parse_u256};
use share_trader::config::{DEFAULT_TOKEN, DEFAULT_TRADE_CONTRACT};
use share_trader::erc4337::{BundlerClient, PollPolicy};
use share_trader::purchase::explorer_link;
use share_trader::utils::logging::init_logging;
use share_trader::{
    purchase_call_data, PresignedSigner, PurchaseOutcome, Quote, ReqwestTransport, ShareBuyer, TradeSignature,
    TraderConfig, TraderResult, UserOpSigner,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Buy player shares through an ERC-4337 smart wallet", long_about = None)]
struct Cli {
    /// JSON config file; TRADER_* environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Quote, sponsor, sign and submit a share purchase
    Buy {
        #[arg(long)]
        player_id: u64,

        #[arg(long, default_value_t = 1)]
        shares: u64,

        /// Wallet owner's 65-byte signature over the user operation hash
        #[arg(long, conflicts_with_all = ["prompt_signature", "dry_run"])]
        owner_signature: Option<String>,

        /// Print the user operation hash and read the owner's signature from stdin
        #[arg(long, conflicts_with = "dry_run")]
        prompt_signature: bool,

        /// Stop before submission and print the priced user operation
        #[arg(long)]
        dry_run: bool,
    },

    /// Wait for the receipt of a submitted user operation
    Receipt { user_op_hash: String },

    /// Decode call data offline
    Decode { calldata: String },

    /// Print executeBatch call data for a purchase, offline
    EncodeBatch {
        #[arg(long)]
        player_id: u64,

        #[arg(long)]
        max_gold_wei: String,

        /// Trade nonce issued with the trade signature
        #[arg(long)]
        nonce: String,

        #[arg(long)]
        deadline: u64,

        /// Trade signature from the trading API
        #[arg(long)]
        signature: String,

        #[arg(long, env = "TRADER_SMART_WALLET")]
        wallet: String,

        #[arg(long, default_value = DEFAULT_TOKEN)]
        token: String,

        #[arg(long, default_value = DEFAULT_TRADE_CONTRACT)]
        trade_contract: String,
    },
}

/// Shows the hash to the operator and reads the signature back
struct PromptSigner;

impl UserOpSigner for PromptSigner {
    fn sign(&self, user_op_hash: H256) -> TraderResult<Vec<u8>> {
        eprintln!("User operation hash: {:?}", user_op_hash);
        let line = prompt("Owner signature (hex): ")?;
        let signature = PresignedSigner::from_hex(line.trim())?;
        signature.sign(user_op_hash)
    }
}

/// Prompts go to stderr so stdout stays parseable with --json
fn prompt(label: &str) -> TraderResult<String> {
    eprint!("{}", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn bearer_token() -> anyhow::Result<String> {
    if let Ok(token) = std::env::var("TRADER_BEARER_TOKEN") {
        if !token.trim().is_empty() {
            return Ok(token.trim().to_string());
        }
    }
    let token = prompt("Bearer token: ")?;
    if token.is_empty() {
        bail!("a bearer token is required");
    }
    Ok(token)
}

fn print_outcome(outcome: &PurchaseOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    if let Some(err) = &outcome.error {
        println!("Purchase failed: {}", err);
    } else if outcome.dry_run {
        println!("Dry run complete, nothing submitted");
    } else {
        println!("Purchase complete");
    }
    if let Some(hash) = outcome.user_op_hash {
        println!("  user operation: {:?}", hash);
    }
    if let Some(hash) = outcome.transaction_hash {
        println!("  transaction:    {:?}", hash);
    }
    if let Some(url) = &outcome.explorer_url {
        println!("  explorer:       {}", url);
    }
    if let Some(op) = &outcome.user_operation {
        println!("{}", serde_json::to_string_pretty(op)?);
    }
    Ok(())
}

fn buy(
    config: TraderConfig,
    player_id: u64,
    shares: u64,
    signer: Option<Box<dyn UserOpSigner>>,
    json: bool,
) -> anyhow::Result<ExitCode> {
    config.validate()?;
    let token = bearer_token()?;
    let transport = ReqwestTransport::shared(config.http_timeout())?;

    let mut buyer = ShareBuyer::new(&config, &token, transport)?;
    if let Some(signer) = signer {
        buyer = buyer.with_signer(signer);
    }
    if !json {
        buyer = buyer.with_progress(|line| println!("{}", line));
    }

    let outcome = buyer.buy(player_id, shares);
    print_outcome(&outcome, json)?;
    Ok(if outcome.success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn receipt(config: TraderConfig, user_op_hash: &str, json: bool) -> anyhow::Result<ExitCode> {
    config.validate_bundler()?;
    let hash_bytes = decode_hex(user_op_hash)?;
    if hash_bytes.len() != 32 {
        bail!("user operation hash must be 32 bytes");
    }
    let hash = H256::from_slice(&hash_bytes);

    let entry_point = parse_address(&config.entry_point)?;
    let transport = ReqwestTransport::shared(config.http_timeout())?;
    let bundler = BundlerClient::new(&config.bundler_rpc_url, entry_point, transport);

    let policy = PollPolicy {
        interval: Duration::from_secs(config.poll_interval_secs.max(1)),
        timeout: Duration::from_secs(config.poll_timeout_secs),
    };
    let receipt = bundler.wait_for_receipt(hash, &policy)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&receipt)?);
    } else {
        println!("success:     {}", receipt.success);
        println!("transaction: {:?}", receipt.transaction_hash());
        println!("explorer:    {}", explorer_link(&config.explorer_tx_url, receipt.transaction_hash()));
        if let Some(reason) = &receipt.reason {
            println!("reason:      {}", reason);
        }
    }
    Ok(if receipt.success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn decode(calldata: &str, json: bool) -> anyhow::Result<ExitCode> {
    let bytes = decode_hex(calldata).context("call data is not hex")?;
    let report = inspect_calldata(&bytes)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report);
    }
    Ok(ExitCode::SUCCESS)
}

#[allow(clippy::too_many_arguments)]
fn encode_batch(
    player_id: u64,
    max_gold_wei: &str,
    nonce: &str,
    deadline: u64,
    signature: &str,
    wallet: String,
    token: String,
    trade_contract: String,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let config = TraderConfig {
        smart_wallet: wallet,
        token,
        trade_contract,
        ..TraderConfig::default()
    };
    let settings = config.settings()?;

    let quote = Quote {
        uuid: String::new(),
        player_id,
        shares: 0,
        total_max_gold_to_spend: String::new(),
        total_max_gold_to_spend_wei: parse_u256(max_gold_wei)?,
    };
    let trade_signature = TradeSignature {
        signature: signature.to_string(),
        nonce: parse_u256(nonce)?,
        deadline,
    };

    let call_data = purchase_call_data(&settings, &quote, &trade_signature)?;
    let encoded = format!("0x{}", hex::encode(&call_data));
    if json {
        let out = serde_json::json!({ "callData": encoded, "length": call_data.len() });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", encoded);
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Buy {
            player_id,
            shares,
            owner_signature,
            prompt_signature,
            dry_run,
        } => {
            let config = TraderConfig::load(cli.config.as_deref())?;
            let signer: Option<Box<dyn UserOpSigner>> = match (owner_signature, prompt_signature, dry_run) {
                (_, _, true) => None,
                (Some(hex), _, _) => {
                    let signer = PresignedSigner::from_hex(&hex)?;
                    Some(Box::new(signer))
                }
                (None, true, _) => Some(Box::new(PromptSigner)),
                (None, false, false) => {
                    bail!("pass --owner-signature, --prompt-signature or --dry-run")
                }
            };
            buy(config, player_id, shares, signer, cli.json)
        }
        Command::Receipt { user_op_hash } => {
            let config = TraderConfig::load(cli.config.as_deref())?;
            receipt(config, &user_op_hash, cli.json)
        }
        Command::Decode { calldata } => decode(&calldata, cli.json),
        Command::EncodeBatch {
            player_id,
            max_gold_wei,
            nonce,
            deadline,
            signature,
            wallet,
            token,
            trade_contract,
        } => encode_batch(
            player_id,
            &max_gold_wei,
            &nonce,
            deadline,
            &signature,
            wallet,
            token,
            trade_contract,
            cli.json,
        ),
    }
}
