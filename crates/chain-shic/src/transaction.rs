use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode::serialize_hex;
use bitcoin::ecdsa::Signature as InputSignature;
use bitcoin::hashes::Hash;
use bitcoin::psbt::Psbt;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::{All, Message, Secp256k1, SecretKey, VerifyOnly};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{Amount, PublicKey, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use tracing::{debug, warn};

use crate::address::{address_to_script_pubkey, validate_destination};
use crate::error::ShicError;
use crate::network::DUST_THRESHOLD_SAT;
use crate::utxo::UnspentOutput;

/// What happens to the part of the input not sent to the destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChangePolicy {
    /// Single output; the whole remainder goes to the miner.
    #[default]
    DonateToFee,
    /// Pay `input - send - fee` back to the sender when it clears dust.
    ReturnToSender,
}

/// Parameters of a single-input transfer.
#[derive(Debug, Clone)]
pub struct TransferPlan {
    pub destination: String,
    pub send_value_sat: u64,
    pub fee_sat: u64,
    pub change_policy: ChangePolicy,
    /// Only used with [`ChangePolicy::ReturnToSender`].
    pub change_address: String,
}

/// A built PSBT plus the value split it encodes.
#[derive(Debug, Clone)]
pub struct UnsignedTransfer {
    pub psbt: Psbt,
    pub input_value_sat: u64,
    pub send_value_sat: u64,
    pub change_sat: u64,
    /// Input value minus all outputs.
    pub fee_paid_sat: u64,
}

impl UnsignedTransfer {
    /// True when no change output was written.
    pub fn remainder_donated(&self) -> bool {
        self.change_sat == 0
    }
}

/// A fully signed transaction ready for broadcast.
#[derive(Debug, Clone)]
pub struct FinalizedTransaction {
    pub tx: Transaction,
    pub txid: Txid,
    pub hex: String,
}

/// Signing capability handed to the PSBT signer.
///
/// Exposes the public key and digest signing only. The secret never leaves
/// the implementor.
pub trait InputSigner {
    fn public_key(&self) -> PublicKey;
    fn sign_digest(&self, digest: [u8; 32]) -> Result<Signature, ShicError>;
}

/// [`InputSigner`] backed by an in-memory secp256k1 secret.
pub struct KeySigner {
    secret: SecretKey,
    public: PublicKey,
    secp: Secp256k1<All>,
}

impl KeySigner {
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self, ShicError> {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(bytes)
            .map_err(|e| ShicError::InvalidPrivateKey(format!("invalid secret key: {e}")))?;
        let public = PublicKey::new(bitcoin::secp256k1::PublicKey::from_secret_key(
            &secp, &secret,
        ));
        Ok(Self {
            secret,
            public,
            secp,
        })
    }
}

impl InputSigner for KeySigner {
    fn public_key(&self) -> PublicKey {
        self.public
    }

    fn sign_digest(&self, digest: [u8; 32]) -> Result<Signature, ShicError> {
        Ok(self
            .secp
            .sign_ecdsa(&Message::from_digest(digest), &self.secret))
    }
}

impl Drop for KeySigner {
    fn drop(&mut self) {
        self.secret.non_secure_erase();
    }
}

/// Build the unsigned PSBT: one input carrying its full previous transaction,
/// one output to the destination, and an optional change output.
pub fn build_transfer(
    utxo: &UnspentOutput,
    plan: &TransferPlan,
) -> Result<UnsignedTransfer, ShicError> {
    if plan.send_value_sat == 0 {
        return Err(ShicError::TransactionBuildError(
            "send value must be positive".into(),
        ));
    }
    if utxo.value_sat < plan.send_value_sat {
        return Err(ShicError::UtxoUnavailable(format!(
            "output holds {} sat, cannot cover {} sat",
            utxo.value_sat, plan.send_value_sat
        )));
    }

    let destination_script = validate_destination(&plan.destination)?.script_pubkey();

    let mut outputs = vec![TxOut {
        value: Amount::from_sat(plan.send_value_sat),
        script_pubkey: destination_script,
    }];

    let remainder = utxo.value_sat - plan.send_value_sat;
    let mut change_sat = 0;
    if plan.change_policy == ChangePolicy::ReturnToSender {
        let change = remainder.saturating_sub(plan.fee_sat);
        if change > DUST_THRESHOLD_SAT {
            outputs.push(TxOut {
                value: Amount::from_sat(change),
                script_pubkey: address_to_script_pubkey(&plan.change_address)?,
            });
            change_sat = change;
        } else {
            debug!(change, "change at or below dust, leaving it to the fee");
        }
    }

    let fee_paid_sat = remainder - change_sat;
    if fee_paid_sat < plan.fee_sat {
        warn!(
            fee_paid_sat,
            fee_sat = plan.fee_sat,
            "selected output leaves less than the fixed fee"
        );
    }

    let tx = Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: utxo.outpoint,
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::default(),
        }],
        output: outputs,
    };

    let mut psbt = Psbt::from_unsigned_tx(tx)
        .map_err(|e| ShicError::TransactionBuildError(format!("psbt: {e}")))?;
    psbt.inputs[0].non_witness_utxo = Some(utxo.previous_tx.clone());

    Ok(UnsignedTransfer {
        psbt,
        input_value_sat: utxo.value_sat,
        send_value_sat: plan.send_value_sat,
        change_sat,
        fee_paid_sat,
    })
}

/// Legacy SIGHASH_ALL digest for `index`, plus the script being spent.
fn legacy_sighash(psbt: &Psbt, index: usize) -> Result<([u8; 32], ScriptBuf), ShicError> {
    let txin = psbt
        .unsigned_tx
        .input
        .get(index)
        .ok_or_else(|| ShicError::SigningError(format!("no input at index {index}")))?;
    let previous_tx = psbt
        .inputs
        .get(index)
        .and_then(|input| input.non_witness_utxo.as_ref())
        .ok_or_else(|| ShicError::SigningError(format!("input {index} has no previous tx")))?;

    if previous_tx.compute_txid() != txin.previous_output.txid {
        return Err(ShicError::SigningError(format!(
            "input {index} previous tx does not match its outpoint"
        )));
    }
    let spent = previous_tx
        .output
        .get(txin.previous_output.vout as usize)
        .ok_or_else(|| ShicError::SigningError(format!("input {index} spends a missing output")))?;

    let cache = SighashCache::new(&psbt.unsigned_tx);
    let sighash = cache
        .legacy_signature_hash(index, &spent.script_pubkey, EcdsaSighashType::All.to_u32())
        .map_err(|e| ShicError::SigningError(format!("sighash computation failed: {e}")))?;

    Ok((sighash.to_byte_array(), spent.script_pubkey.clone()))
}

/// Sign input `index` and record the result as a partial signature.
///
/// The spent script must be P2PKH to the signer's own key.
pub fn sign_input(
    psbt: &mut Psbt,
    index: usize,
    signer: &dyn InputSigner,
) -> Result<(), ShicError> {
    let (digest, spent_script) = legacy_sighash(psbt, index)?;
    let public_key = signer.public_key();

    if spent_script != ScriptBuf::new_p2pkh(&public_key.pubkey_hash()) {
        return Err(ShicError::SigningError(format!(
            "key does not control input {index}"
        )));
    }

    let signature = signer.sign_digest(digest)?;
    psbt.inputs[index].partial_sigs.insert(
        public_key,
        InputSignature {
            signature,
            sighash_type: EcdsaSighashType::All,
        },
    );
    Ok(())
}

/// Independently verify every partial signature on input `index`.
pub fn validate_input_signatures(psbt: &Psbt, index: usize) -> Result<(), ShicError> {
    let sigs = &psbt
        .inputs
        .get(index)
        .ok_or_else(|| ShicError::SignatureInvalid(format!("no input at index {index}")))?
        .partial_sigs;
    if sigs.is_empty() {
        return Err(ShicError::SignatureInvalid(format!(
            "input {index} carries no signatures"
        )));
    }

    let (digest, spent_script) =
        legacy_sighash(psbt, index).map_err(|e| ShicError::SignatureInvalid(e.to_string()))?;
    let message = Message::from_digest(digest);
    let secp: Secp256k1<VerifyOnly> = Secp256k1::verification_only();

    for (public_key, sig) in sigs {
        if sig.sighash_type != EcdsaSighashType::All {
            return Err(ShicError::SignatureInvalid(format!(
                "unexpected sighash type {}",
                sig.sighash_type
            )));
        }
        if spent_script != ScriptBuf::new_p2pkh(&public_key.pubkey_hash()) {
            return Err(ShicError::SignatureInvalid(format!(
                "signature key does not match input {index}"
            )));
        }
        secp.verify_ecdsa(&message, &sig.signature, &public_key.inner)
            .map_err(|e| ShicError::SignatureInvalid(format!("input {index}: {e}")))?;
    }
    Ok(())
}

/// Move the single partial signature on `index` into its final scriptSig.
pub fn finalize_input(psbt: &mut Psbt, index: usize) -> Result<(), ShicError> {
    let input = psbt
        .inputs
        .get_mut(index)
        .ok_or_else(|| ShicError::FinalizeError(format!("no input at index {index}")))?;

    if input.partial_sigs.len() != 1 {
        return Err(ShicError::FinalizeError(format!(
            "input {index} needs exactly one signature, has {}",
            input.partial_sigs.len()
        )));
    }
    let (public_key, sig) = input
        .partial_sigs
        .iter()
        .next()
        .map(|(pk, sig)| (*pk, *sig))
        .ok_or_else(|| ShicError::FinalizeError(format!("input {index} is unsigned")))?;

    let sig_push = PushBytesBuf::try_from(sig.to_vec())
        .map_err(|e| ShicError::FinalizeError(format!("signature push: {e}")))?;
    let script_sig = Builder::new()
        .push_slice(sig_push)
        .push_key(&public_key)
        .into_script();

    input.final_script_sig = Some(script_sig);
    input.partial_sigs.clear();
    input.sighash_type = None;
    input.redeem_script = None;
    input.bip32_derivation.clear();
    Ok(())
}

/// Extract the network transaction once every input is finalized.
///
/// The fee-rate sanity check is skipped: the flat fee on a small legacy
/// transaction exceeds the library's absurd-rate threshold.
pub fn extract_finalized(psbt: Psbt) -> Result<FinalizedTransaction, ShicError> {
    if let Some(i) = psbt.inputs.iter().position(|i| i.final_script_sig.is_none()) {
        return Err(ShicError::FinalizeError(format!("input {i} is not finalized")));
    }
    let tx = psbt.extract_tx_unchecked_fee_rate();
    let txid = tx.compute_txid();
    let hex = serialize_hex(&tx);
    Ok(FinalizedTransaction { tx, txid, hex })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utxo::tests::funding_tx;
    use crate::utxo::{decode_transaction_hex, UtxoCandidate};

    const SENDER: &str = "SPCHCmSzgsQQZirfqwxqHrToBpBRX4zxCQ";
    const RECIPIENT: &str = "SX5biQLHTe8dheDcWuUxRurvd4BTEHZNM6";

    fn signer() -> KeySigner {
        KeySigner::from_secret_bytes(&[0x42; 32]).unwrap()
    }

    fn utxo(value_sat: u64) -> UnspentOutput {
        let tx = funding_tx(value_sat, address_to_script_pubkey(SENDER).unwrap());
        let candidate = UtxoCandidate {
            txid: tx.compute_txid().to_string(),
            vout: 0,
        };
        UnspentOutput::resolve(&candidate, &serialize_hex(&tx)).unwrap()
    }

    fn plan(send_value_sat: u64, change_policy: ChangePolicy) -> TransferPlan {
        TransferPlan {
            destination: RECIPIENT.into(),
            send_value_sat,
            fee_sat: 10_000_000,
            change_policy,
            change_address: SENDER.into(),
        }
    }

    #[test]
    fn test_signer_public_key_matches_sender() {
        let pk = signer().public_key();
        assert_eq!(
            pk.to_string(),
            "0324653eac434488002cc06bbfb7f10fe18991e35f9fe4302dbea6d2353dc0ab1c"
        );
    }

    #[test]
    fn test_build_sign_validate_finalize() {
        let mut transfer =
            build_transfer(&utxo(100_000_000), &plan(40_000_000, ChangePolicy::DonateToFee))
                .unwrap();
        assert_eq!(transfer.psbt.unsigned_tx.output.len(), 1);
        assert_eq!(transfer.fee_paid_sat, 60_000_000);
        assert!(transfer.remainder_donated());

        sign_input(&mut transfer.psbt, 0, &signer()).unwrap();
        validate_input_signatures(&transfer.psbt, 0).unwrap();
        finalize_input(&mut transfer.psbt, 0).unwrap();

        let finalized = extract_finalized(transfer.psbt).unwrap();
        let decoded = decode_transaction_hex(&finalized.hex).unwrap();
        assert_eq!(decoded.compute_txid(), finalized.txid);
        assert_eq!(decoded.output[0].value.to_sat(), 40_000_000);
        assert_eq!(
            decoded.output[0].script_pubkey,
            address_to_script_pubkey(RECIPIENT).unwrap()
        );

        // scriptSig: <der sig + 0x01> <33-byte pubkey>
        let pushes: Vec<_> = decoded.input[0]
            .script_sig
            .instructions()
            .map(|ins| ins.unwrap())
            .collect();
        assert_eq!(pushes.len(), 2);
        let key_push = pushes[1].push_bytes().unwrap();
        assert_eq!(key_push.as_bytes(), &signer().public_key().to_bytes()[..]);
        let sig_push = pushes[0].push_bytes().unwrap().as_bytes();
        assert_eq!(*sig_push.last().unwrap(), 0x01);
    }

    #[test]
    fn test_return_to_sender_adds_change() {
        let transfer = build_transfer(
            &utxo(100_000_000),
            &plan(40_000_000, ChangePolicy::ReturnToSender),
        )
        .unwrap();
        let outs = &transfer.psbt.unsigned_tx.output;
        assert_eq!(outs.len(), 2);
        assert_eq!(outs[1].value.to_sat(), 50_000_000);
        assert_eq!(outs[1].script_pubkey, address_to_script_pubkey(SENDER).unwrap());
        assert_eq!(transfer.fee_paid_sat, 10_000_000);
        assert!(!transfer.remainder_donated());
    }

    #[test]
    fn test_dust_change_is_donated() {
        let transfer = build_transfer(
            &utxo(50_000_500),
            &plan(40_000_000, ChangePolicy::ReturnToSender),
        )
        .unwrap();
        assert_eq!(transfer.psbt.unsigned_tx.output.len(), 1);
        assert_eq!(transfer.fee_paid_sat, 10_000_500);
    }

    #[test]
    fn test_output_smaller_than_send_value_rejected() {
        let err = build_transfer(&utxo(1_000), &plan(40_000_000, ChangePolicy::DonateToFee))
            .unwrap_err();
        assert!(matches!(err, ShicError::UtxoUnavailable(_)));
    }

    #[test]
    fn test_zero_send_value_rejected() {
        assert!(build_transfer(&utxo(1_000), &plan(0, ChangePolicy::DonateToFee)).is_err());
    }

    #[test]
    fn test_foreign_key_cannot_sign() {
        let mut transfer =
            build_transfer(&utxo(100_000_000), &plan(40_000_000, ChangePolicy::DonateToFee))
                .unwrap();
        let other = KeySigner::from_secret_bytes(&[0x07; 32]).unwrap();
        match sign_input(&mut transfer.psbt, 0, &other) {
            Err(ShicError::SigningError(msg)) => assert!(msg.contains("does not control")),
            other => panic!("expected SigningError, got {:?}", other),
        }
    }

    #[test]
    fn test_signature_over_wrong_digest_fails_validation() {
        let mut transfer =
            build_transfer(&utxo(100_000_000), &plan(40_000_000, ChangePolicy::DonateToFee))
                .unwrap();
        let key = signer();
        let bogus = key.sign_digest([0u8; 32]).unwrap();
        transfer.psbt.inputs[0].partial_sigs.insert(
            key.public_key(),
            InputSignature {
                signature: bogus,
                sighash_type: EcdsaSighashType::All,
            },
        );
        assert!(matches!(
            validate_input_signatures(&transfer.psbt, 0),
            Err(ShicError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn test_unsigned_input_fails_validation_and_finalize() {
        let mut transfer =
            build_transfer(&utxo(100_000_000), &plan(40_000_000, ChangePolicy::DonateToFee))
                .unwrap();
        assert!(validate_input_signatures(&transfer.psbt, 0).is_err());
        assert!(finalize_input(&mut transfer.psbt, 0).is_err());
        assert!(extract_finalized(transfer.psbt).is_err());
    }

    #[test]
    fn test_invalid_destination_rejected_at_build() {
        let mut p = plan(40_000_000, ChangePolicy::DonateToFee);
        p.destination = "1BoatSLRHtKNngkdXEeobR76b53LETtpyT".into();
        assert!(matches!(
            build_transfer(&utxo(100_000_000), &p),
            Err(ShicError::InvalidAddress(_))
        ));
    }
}
