//! Share purchase pipeline
//!
//! One purchase is a fixed sequence of blocking calls:
//! quote, trade signature, nonce and fees, call data, sponsorship and gas,
//! owner signature, submission, receipt.

use ethers_core::types::{H256, U256};
use serde::Serialize;
use tracing::{info, warn};

use crate::abi::{self, decode_hex, BatchCall, BuySharesCall};
use crate::config::{PurchaseSettings, TraderConfig};
use crate::erc4337::{BundlerClient, NodeClient, PaymasterClient, UserOperation};
use crate::error::{ErrorCode, TraderError, TraderResult};
use crate::trading::{Quote, TradeSignature, TradingClient};
use crate::utils::logging::redact_hex;
use crate::utils::SharedTransport;

/// Produces the wallet owner's signature over a user operation hash
pub trait UserOpSigner {
    /// Raw 65-byte ECDSA signature (r, s, v); wrapping is done by the caller
    fn sign(&self, user_op_hash: H256) -> TraderResult<Vec<u8>>;
}

/// Signature supplied up front by the operator
pub struct PresignedSigner {
    signature: Vec<u8>,
}

impl PresignedSigner {
    pub fn from_hex(signature: &str) -> TraderResult<Self> {
        let signature = decode_hex(signature)
            .map_err(|e| TraderError::new(ErrorCode::HexError, "Owner signature is not hex").with_details(e.to_string()))?;
        check_signature_len(&signature)?;
        Ok(Self { signature })
    }
}

impl UserOpSigner for PresignedSigner {
    fn sign(&self, _user_op_hash: H256) -> TraderResult<Vec<u8>> {
        Ok(self.signature.clone())
    }
}

pub fn check_signature_len(signature: &[u8]) -> TraderResult<()> {
    if signature.len() != 65 {
        return Err(TraderError::invalid_input(format!(
            "Owner signature must be 65 bytes, got {}",
            signature.len()
        )));
    }
    Ok(())
}

/// Result of one purchase attempt, printed as JSON
#[derive(Debug, Clone, Default, Serialize)]
pub struct PurchaseOutcome {
    pub success: bool,
    /// Stopped before submission, nothing was sent on-chain
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
    pub player_id: u64,
    pub shares: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_gold_to_spend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_op_hash: Option<H256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<H256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_gas_cost: Option<U256>,
    /// Final operation, included on dry runs so it can be signed offline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_operation: Option<UserOperation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TraderError>,
}

impl PurchaseOutcome {
    fn new(player_id: u64, shares: u64) -> Self {
        Self {
            player_id,
            shares,
            ..Self::default()
        }
    }
}

/// Batch executed by the smart wallet: approve the spend, then buy
pub fn purchase_call_data(settings: &PurchaseSettings, quote: &Quote, signature: &TradeSignature) -> TraderResult<Vec<u8>> {
    let max_gold = quote.total_max_gold_to_spend_wei;

    let buy = BuySharesCall {
        player_ids: vec![U256::from(quote.player_id)],
        max_gold_amounts: vec![max_gold],
        nonce: signature.nonce,
        deadline: U256::from(signature.deadline),
        user: settings.smart_wallet,
        signature: signature.signature_bytes()?,
    };

    let calls = [
        BatchCall::new(settings.token, abi::approve(settings.trade_contract, max_gold)?),
        BatchCall::new(settings.trade_contract, abi::buy_shares(&buy)?),
    ];
    Ok(abi::execute_batch(&calls)?)
}

type Progress = Box<dyn Fn(&str)>;

/// Runs share purchases through the smart wallet
pub struct ShareBuyer {
    trading: TradingClient,
    node: NodeClient,
    bundler: BundlerClient,
    paymaster: PaymasterClient,
    settings: PurchaseSettings,
    signer: Option<Box<dyn UserOpSigner>>,
    progress: Option<Progress>,
}

impl ShareBuyer {
    pub fn new(config: &TraderConfig, bearer_token: &str, transport: SharedTransport) -> TraderResult<Self> {
        let settings = config.settings()?;

        let mut paymaster =
            PaymasterClient::new(config.paymaster_url(), settings.entry_point, settings.chain_id, transport.clone());
        if let Some(context) = &config.paymaster_context {
            paymaster = paymaster.with_context(context.clone());
        }

        Ok(Self {
            trading: TradingClient::new(&config.api_base_url, bearer_token, transport.clone())
                .with_slippage_bps(config.slippage_bps),
            node: NodeClient::new(&config.node_rpc_url, settings.entry_point, transport.clone()),
            bundler: BundlerClient::new(&config.bundler_rpc_url, settings.entry_point, transport),
            paymaster,
            settings,
            signer: None,
            progress: None,
        })
    }

    /// Without a signer, `buy` stops after pricing the operation
    pub fn with_signer(mut self, signer: Box<dyn UserOpSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Receive one line per completed step
    pub fn with_progress(mut self, progress: impl Fn(&str) + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn settings(&self) -> &PurchaseSettings {
        &self.settings
    }

    /// Buy `shares` shares of `player_id`. Failures are reported in the outcome.
    pub fn buy(&self, player_id: u64, shares: u64) -> PurchaseOutcome {
        let mut outcome = PurchaseOutcome::new(player_id, shares);

        match self.execute(&mut outcome) {
            Ok(()) => outcome,
            Err(err) => {
                warn!(error = %err, "purchase failed");
                outcome.success = false;
                outcome.error = Some(err);
                outcome
            }
        }
    }

    fn execute(&self, outcome: &mut PurchaseOutcome) -> TraderResult<()> {
        if outcome.shares == 0 {
            return Err(TraderError::invalid_input("Share quantity must be positive"));
        }
        let settings = &self.settings;

        let quote = self.trading.get_quote(outcome.player_id, outcome.shares)?;
        outcome.quote_id = Some(quote.uuid.clone());
        outcome.max_gold_to_spend = Some(quote.total_max_gold_to_spend.clone());
        self.report(&format!(
            "[1/7] Quote {}: max {} gold",
            quote.uuid, quote.total_max_gold_to_spend
        ));

        let trade_signature = self.trading.get_buy_signature(&quote.uuid)?;
        check_deadline(&trade_signature)?;
        self.report(&format!(
            "[2/7] Trade signature, nonce {}, deadline {}",
            trade_signature.nonce, trade_signature.deadline
        ));

        let nonce = self.node.get_nonce(settings.smart_wallet, settings.nonce_key)?;
        let fees = self.node.fee_quote(&settings.fee_policy)?;
        self.report(&format!(
            "[3/7] Wallet nonce {}, max fee {} wei",
            nonce, fees.max_fee_per_gas
        ));

        let call_data = purchase_call_data(settings, &quote, &trade_signature)?;
        info!(call_data = %redact_hex(&hex::encode(&call_data)), len = call_data.len(), "call data built");
        self.report(&format!("[4/7] Call data built ({} bytes)", call_data.len()));

        let user_op = self.sponsor(UserOperation::new(settings.smart_wallet, nonce, call_data).with_fees(&fees))?;
        let user_op_hash = user_op.hash(settings.entry_point, settings.chain_id)?;
        outcome.user_op_hash = Some(user_op_hash);
        self.report(&format!("[5/7] Sponsored, user operation hash {:?}", user_op_hash));

        let signer = match &self.signer {
            Some(signer) => signer,
            None => {
                info!(user_op_hash = ?user_op_hash, "dry run, not submitting");
                outcome.dry_run = true;
                outcome.success = true;
                outcome.user_operation = Some(user_op);
                return Ok(());
            }
        };

        let owner_signature = signer.sign(user_op_hash)?;
        check_signature_len(&owner_signature)?;
        // Signing may have waited on the operator
        check_deadline(&trade_signature)?;
        let user_op = user_op.with_signature(abi::wrap_owner_signature(settings.owner_index, &owner_signature)?);

        let sent_hash = self.bundler.send_user_operation(&user_op)?;
        if sent_hash != user_op_hash {
            warn!(expected = ?user_op_hash, got = ?sent_hash, "bundler returned a different user operation hash");
            outcome.user_op_hash = Some(sent_hash);
        }
        self.report(&format!("[6/7] Submitted {:?}", sent_hash));

        let receipt = self.bundler.wait_for_receipt(sent_hash, &settings.poll_policy)?;
        let tx_hash = receipt.transaction_hash();
        outcome.transaction_hash = Some(tx_hash);
        outcome.explorer_url = Some(explorer_link(&settings.explorer_tx_url, tx_hash));
        outcome.actual_gas_cost = receipt.actual_gas_cost;

        if !receipt.success {
            let reason = receipt.reason.unwrap_or_else(|| "no revert reason".to_string());
            return Err(TraderError::new(
                ErrorCode::UserOperationFailed,
                format!("User operation reverted in transaction {:?}", tx_hash),
            )
            .with_details(reason));
        }

        outcome.success = true;
        self.report(&format!("[7/7] Included in transaction {:?}", tx_hash));
        Ok(())
    }

    /// Stub sponsorship, gas estimate, then final sponsorship.
    /// Carries the dummy owner signature throughout.
    fn sponsor(&self, user_op: UserOperation) -> TraderResult<UserOperation> {
        let user_op = user_op.with_signature(abi::dummy_owner_signature()?);

        let stub = self.paymaster.get_paymaster_stub_data(&user_op)?;
        let user_op = user_op.with_paymaster_and_data(stub.paymaster_and_data.clone());

        let gas = self.bundler.estimate_or_fallback(&user_op, &self.settings.fallback_gas)?;
        let user_op = user_op.with_gas(&gas);

        if stub.is_final == Some(true) {
            return Ok(user_op);
        }
        let data = self.paymaster.get_paymaster_data(&user_op)?;
        Ok(user_op.with_paymaster_and_data(data.paymaster_and_data))
    }

    fn report(&self, line: &str) {
        info!("{}", line);
        if let Some(progress) = &self.progress {
            progress(line);
        }
    }
}

fn check_deadline(signature: &TradeSignature) -> TraderResult<()> {
    let now = chrono::Utc::now().timestamp();
    if signature.is_expired(now) {
        return Err(TraderError::new(
            ErrorCode::SignatureExpired,
            format!("Trade signature expired at {}", signature.deadline),
        )
        .with_details(format!("now {}", now)));
    }
    Ok(())
}

pub fn explorer_link(base: &str, tx_hash: H256) -> String {
    format!("{}{:?}", base, tx_hash)
}
