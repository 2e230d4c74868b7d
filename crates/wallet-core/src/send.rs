//! Send flow: validate, fetch a UTXO, build, sign, verify, finalize, broadcast.
//!
//! One [`SendFlow::run`] call walks the states in order and stops at the
//! first failure. Nothing is retried; a new `run` starts again from `Idle`.

use std::fmt;

use chain_shic::address::validate_destination;
use chain_shic::network::tx_explorer_url;
use chain_shic::transaction::{
    build_transfer, extract_finalized, finalize_input, sign_input, validate_input_signatures,
    ChangePolicy, TransferPlan,
};
use chain_shic::utxo::UnspentOutput;
use tracing::{debug, info, warn};

use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::explorer::ChainClient;
use crate::registry::AccountRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Idle,
    Validating,
    FetchingUtxo,
    Building,
    Signing,
    Validated,
    Finalized,
    Broadcasting,
    Succeeded,
    Failed,
}

impl fmt::Display for SendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SendState::Idle => "idle",
            SendState::Validating => "validating",
            SendState::FetchingUtxo => "fetching-utxo",
            SendState::Building => "building",
            SendState::Signing => "signing",
            SendState::Validated => "validated",
            SendState::Finalized => "finalized",
            SendState::Broadcasting => "broadcasting",
            SendState::Succeeded => "succeeded",
            SendState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What the user asked to send. `amount_sat` includes the fee.
#[derive(Clone)]
pub struct SendRequest {
    /// Account to spend from; the selected account when `None`.
    pub from_index: Option<usize>,
    pub destination: String,
    pub amount_sat: u64,
    pub password: String,
}

impl fmt::Debug for SendRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendRequest")
            .field("from_index", &self.from_index)
            .field("destination", &self.destination)
            .field("amount_sat", &self.amount_sat)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub txid: String,
    pub raw_hex: String,
    /// Value paid to the destination.
    pub sent_sat: u64,
    /// Input value minus all outputs.
    pub fee_sat: u64,
    /// True when no change output was written.
    pub donated: bool,
    pub explorer_url: String,
}

pub struct SendFlow {
    fee_sat: u64,
    change_policy: ChangePolicy,
    state: SendState,
    trace: Vec<SendState>,
    failure: Option<WalletError>,
}

impl SendFlow {
    pub fn new(fee_sat: u64, change_policy: ChangePolicy) -> Self {
        Self {
            fee_sat,
            change_policy,
            state: SendState::Idle,
            trace: vec![SendState::Idle],
            failure: None,
        }
    }

    pub fn from_config(config: &WalletConfig) -> Self {
        Self::new(config.fee_sat, config.change_policy)
    }

    pub fn state(&self) -> SendState {
        self.state
    }

    /// Every state entered during the last run, starting at `Idle`.
    pub fn trace(&self) -> &[SendState] {
        &self.trace
    }

    pub fn failure_reason(&self) -> Option<&WalletError> {
        self.failure.as_ref()
    }

    pub async fn run(
        &mut self,
        registry: &AccountRegistry,
        client: &dyn ChainClient,
        request: SendRequest,
    ) -> Result<SendReceipt, WalletError> {
        self.state = SendState::Idle;
        self.trace = vec![SendState::Idle];
        self.failure = None;

        match self.execute(registry, client, &request).await {
            Ok(receipt) => {
                self.enter(SendState::Succeeded);
                info!(txid = %receipt.txid, sent = receipt.sent_sat, fee = receipt.fee_sat, "send succeeded");
                Ok(receipt)
            }
            Err(e) => {
                warn!(state = %self.state, error = %e, "send failed");
                self.enter(SendState::Failed);
                self.failure = Some(e.clone());
                Err(e)
            }
        }
    }

    fn enter(&mut self, state: SendState) {
        debug!(from = %self.state, to = %state, "send state");
        self.state = state;
        self.trace.push(state);
    }

    async fn execute(
        &mut self,
        registry: &AccountRegistry,
        client: &dyn ChainClient,
        request: &SendRequest,
    ) -> Result<SendReceipt, WalletError> {
        self.enter(SendState::Validating);
        if !registry.verify_password(&request.password) {
            return Err(WalletError::PasswordMismatch);
        }
        validate_destination(&request.destination)?;
        let send_value_sat = request
            .amount_sat
            .checked_sub(self.fee_sat)
            .filter(|v| *v > 0)
            .ok_or(WalletError::AmountBelowFee { fee: self.fee_sat })?;

        let index = request
            .from_index
            .unwrap_or_else(|| registry.state().selected_index());
        let sender = registry
            .state()
            .accounts()
            .get(index)
            .ok_or(WalletError::AccountNotFound(index))?
            .address
            .clone();

        self.enter(SendState::FetchingUtxo);
        let available = client.balance(&sender).await?;
        if available < request.amount_sat {
            return Err(WalletError::InsufficientFunds { available });
        }
        let candidate = client
            .unspent(&sender, send_value_sat)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                WalletError::UtxoUnavailable(format!("no output of {sender} covers {send_value_sat}"))
            })?;
        let previous_tx = client.raw_transaction(&candidate.txid).await?;
        let utxo = UnspentOutput::resolve(&candidate, &previous_tx)?;
        debug!(txid = %candidate.txid, vout = candidate.vout, value = utxo.value_sat, "utxo selected");

        self.enter(SendState::Building);
        let plan = TransferPlan {
            destination: request.destination.clone(),
            send_value_sat,
            fee_sat: self.fee_sat,
            change_policy: self.change_policy,
            change_address: sender,
        };
        let mut transfer = build_transfer(&utxo, &plan)?;

        self.enter(SendState::Signing);
        {
            let signer = registry.signer_for(index)?;
            sign_input(&mut transfer.psbt, 0, &signer)?;
        }

        validate_input_signatures(&transfer.psbt, 0)?;
        self.enter(SendState::Validated);

        finalize_input(&mut transfer.psbt, 0)?;
        let donated = transfer.remainder_donated();
        let finalized = extract_finalized(transfer.psbt)?;
        self.enter(SendState::Finalized);

        self.enter(SendState::Broadcasting);
        let txid = client.broadcast(&finalized.hex).await?;
        let local_txid = finalized.txid.to_string();
        if txid != local_txid {
            warn!(reported = %txid, computed = %local_txid, "broadcast txid differs from local");
        }

        Ok(SendReceipt {
            explorer_url: tx_explorer_url(&txid),
            txid,
            raw_hex: finalized.hex,
            sent_sat: transfer.send_value_sat,
            fee_sat: transfer.fee_paid_sat,
            donated,
        })
    }
}

impl Default for SendFlow {
    fn default() -> Self {
        Self::new(chain_shic::network::FIXED_FEE_SAT, ChangePolicy::default())
    }
}
