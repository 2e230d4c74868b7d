use bitcoin::consensus::encode::deserialize;
use bitcoin::{OutPoint, ScriptBuf, Transaction, Txid};

use crate::error::ShicError;

/// Output reference as reported by the unspent-output query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoCandidate {
    /// Transaction ID as a hex string (display order).
    pub txid: String,
    /// Output index within that transaction.
    pub vout: u32,
}

/// A spendable output together with the full transaction that created it.
///
/// Legacy P2PKH signing commits to the previous output script, and the PSBT
/// carries the whole previous transaction as its non-witness UTXO.
#[derive(Debug, Clone)]
pub struct UnspentOutput {
    pub outpoint: OutPoint,
    pub value_sat: u64,
    pub script_pubkey: ScriptBuf,
    pub previous_tx: Transaction,
}

impl UnspentOutput {
    /// Resolve `candidate` against the raw hex of its parent transaction.
    ///
    /// Fails when the hex does not hash to the candidate's txid or the output
    /// index is out of range.
    pub fn resolve(candidate: &UtxoCandidate, previous_tx_hex: &str) -> Result<Self, ShicError> {
        let txid: Txid = candidate
            .txid
            .parse()
            .map_err(|e| ShicError::UtxoUnavailable(format!("invalid txid: {e}")))?;

        let previous_tx = decode_transaction_hex(previous_tx_hex)
            .map_err(|e| ShicError::UtxoUnavailable(e.to_string()))?;

        let computed = previous_tx.compute_txid();
        if computed != txid {
            return Err(ShicError::UtxoUnavailable(format!(
                "raw transaction hashes to {computed}, expected {txid}"
            )));
        }

        let output = previous_tx
            .output
            .get(candidate.vout as usize)
            .ok_or_else(|| {
                ShicError::UtxoUnavailable(format!(
                    "output {} not present in {txid} ({} outputs)",
                    candidate.vout,
                    previous_tx.output.len()
                ))
            })?;

        Ok(Self {
            outpoint: OutPoint::new(txid, candidate.vout),
            value_sat: output.value.to_sat(),
            script_pubkey: output.script_pubkey.clone(),
            previous_tx,
        })
    }
}

/// Parse consensus-encoded transaction hex.
pub fn decode_transaction_hex(raw: &str) -> Result<Transaction, ShicError> {
    let bytes = hex::decode(raw.trim())
        .map_err(|e| ShicError::TransactionBuildError(format!("invalid transaction hex: {e}")))?;
    deserialize(&bytes)
        .map_err(|e| ShicError::TransactionBuildError(format!("undecodable transaction: {e}")))
}
