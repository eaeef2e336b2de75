//! Transaction view consumed by the authenticator pipeline
//!
//! The wire encoding of transactions belongs to the host; this module only
//! models what authenticators read: ordered messages with their signers, the
//! fee, signatures and the optional authenticator selection.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SmartAccountError};
use crate::identifiers::AccountAddress;

/// A single fee coin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    /// Denomination
    pub denom: String,
    /// Amount in base units
    pub amount: u64,
}

impl Coin {
    /// Create a coin
    pub fn new(denom: impl Into<String>, amount: u64) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

/// Fee attached to a transaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    /// Coins paid
    pub amount: Vec<Coin>,
    /// Gas limit requested by the sender
    pub gas_limit: u64,
    /// Explicit payer; defaults to the first signer
    pub payer: Option<AccountAddress>,
    /// Account granting the fee allowance, if any
    pub granter: Option<AccountAddress>,
}

/// Type-tagged message payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalAny {
    /// Message type url, e.g. `/cosmos.bank.v1beta1.MsgSend`
    pub type_url: String,
    /// JSON-encoded message body
    #[serde(with = "crate::encoding::base64_bytes")]
    pub value: Vec<u8>,
}

/// Message carried by a transaction together with its signers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxMsg {
    /// Message type url
    pub type_url: String,
    /// JSON-encoded message body
    #[serde(with = "crate::encoding::base64_bytes")]
    pub value: Vec<u8>,
    /// Accounts that must authorize this message
    pub signers: Vec<AccountAddress>,
}

impl TxMsg {
    /// Build a message from a JSON body signed by `signer`.
    pub fn new(
        type_url: impl Into<String>,
        body: &serde_json::Value,
        signer: AccountAddress,
    ) -> Result<Self> {
        Ok(Self {
            type_url: type_url.into(),
            value: serde_json::to_vec(body)?,
            signers: vec![signer],
        })
    }

    /// Typed payload view
    pub fn to_any(&self) -> LocalAny {
        LocalAny {
            type_url: self.type_url.clone(),
            value: self.value.clone(),
        }
    }
}

/// Signature over the transaction by one signer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureV2 {
    /// Public key of the signer, when supplied in the transaction
    pub pub_key: Option<Vec<u8>>,
    /// Raw signature bytes
    pub signature: Vec<u8>,
    /// Account sequence the signature commits to
    pub sequence: u64,
}

/// Auxiliary transaction data selecting one authenticator per message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxExtension {
    /// Authenticator id chosen for each message, in message order
    pub selected_authenticators: Vec<u64>,
}

/// Transaction as seen by the authenticator pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    /// Messages in execution order
    pub msgs: Vec<TxMsg>,
    /// Fee and payer information
    pub fee: Fee,
    /// Free-form memo
    pub memo: String,
    /// Height after which the transaction is invalid; zero disables
    pub timeout_height: u64,
    /// One signature per entry of [`Tx::signers`]
    pub signatures: Vec<SignatureV2>,
    /// Optional authenticator selection
    pub extension: Option<TxExtension>,
}

#[derive(Serialize)]
struct SignDoc<'a> {
    chain_id: &'a str,
    account_number: u64,
    sequence: u64,
    timeout_height: u64,
    memo: &'a str,
    msgs: Vec<LocalAny>,
    fee: &'a Fee,
}

impl Tx {
    /// Distinct signers in order of first appearance
    pub fn signers(&self) -> Vec<AccountAddress> {
        let mut signers: Vec<AccountAddress> = Vec::new();
        for signer in self.msgs.iter().flat_map(|msg| msg.signers.iter()) {
            if !signers.contains(signer) {
                signers.push(signer.clone());
            }
        }
        signers
    }

    /// Explicit payer, or the first signer when none is set
    pub fn fee_payer(&self) -> Option<AccountAddress> {
        self.fee
            .payer
            .clone()
            .or_else(|| self.signers().into_iter().next())
    }

    /// Fee granter, if any
    pub fn fee_granter(&self) -> Option<&AccountAddress> {
        self.fee.granter.as_ref()
    }

    /// Messages as typed payloads
    pub fn msg_anys(&self) -> Vec<LocalAny> {
        self.msgs.iter().map(TxMsg::to_any).collect()
    }

    /// Selected authenticator ids, if the extension is present
    pub fn selected_authenticators(&self) -> Option<&[u64]> {
        self.extension
            .as_ref()
            .map(|ext| ext.selected_authenticators.as_slice())
    }

    /// Deterministic bytes a signer commits to.
    pub fn sign_bytes(&self, chain_id: &str, account_number: u64, sequence: u64) -> Result<Vec<u8>> {
        let doc = SignDoc {
            chain_id,
            account_number,
            sequence,
            timeout_height: self.timeout_height,
            memo: &self.memo,
            msgs: self.msg_anys(),
            fee: &self.fee,
        };
        serde_json::to_vec(&doc)
            .map_err(|e| SmartAccountError::serialization(format!("sign doc: {e}")))
    }

    /// Signers paired with their signatures.
    ///
    /// Fails when the counts differ.
    pub fn signers_and_signatures(&self) -> Result<Vec<(AccountAddress, SignatureV2)>> {
        let signers = self.signers();
        if signers.len() != self.signatures.len() {
            return Err(SmartAccountError::unauthorized(format!(
                "invalid number of signer; expected: {}, got {}",
                signers.len(),
                self.signatures.len()
            )));
        }
        Ok(signers.into_iter().zip(self.signatures.iter().cloned()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn addr(byte: u8) -> AccountAddress {
        AccountAddress::new(vec![byte; 20])
    }

    fn sample_tx() -> Tx {
        Tx {
            msgs: vec![
                TxMsg::new("/test.MsgA", &json!({"x": "1"}), addr(1)).unwrap(),
                TxMsg::new("/test.MsgB", &json!({"y": "2"}), addr(2)).unwrap(),
                TxMsg::new("/test.MsgA", &json!({"x": "3"}), addr(1)).unwrap(),
            ],
            ..Tx::default()
        }
    }

    #[test]
    fn test_signers_are_deduplicated_in_order() {
        assert_eq!(sample_tx().signers(), vec![addr(1), addr(2)]);
    }

    #[test]
    fn test_fee_payer_defaults_to_first_signer() {
        let mut tx = sample_tx();
        assert_eq!(tx.fee_payer(), Some(addr(1)));
        tx.fee.payer = Some(addr(9));
        assert_eq!(tx.fee_payer(), Some(addr(9)));
    }

    #[test]
    fn test_sign_bytes_depend_on_sequence() {
        let tx = sample_tx();
        let a = tx.sign_bytes("chain", 1, 0).unwrap();
        let b = tx.sign_bytes("chain", 1, 1).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, tx.sign_bytes("chain", 1, 0).unwrap());
    }

    #[test]
    fn test_signature_count_must_match_signers() {
        let tx = sample_tx();
        assert!(tx.signers_and_signatures().is_err());
    }
}
