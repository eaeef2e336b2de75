//! Requests handed to authenticators
//!
//! An [`AuthenticationRequest`] is built fresh for every message in every
//! phase. [`TrackRequest`] and [`ConfirmExecutionRequest`] are the narrower
//! projections forwarded to external policy contracts.

use serde::{Deserialize, Serialize};

use smart_account_core::encoding::{base64_bytes, base64_option, base64_vec};
use smart_account_core::{
    AccountAddress, AccountKeeper, Coin, CompositeId, Context, LocalAny, Result, SignatureV2,
    SmartAccountError, Tx,
};

/// Sign bytes for the supported sign modes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignModeData {
    /// Direct-mode sign bytes
    #[serde(with = "base64_bytes")]
    pub direct: Vec<u8>,
    /// Textual-mode rendering, when available
    pub textual: Option<String>,
}

/// Transaction data the signer committed to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplicitTxData {
    /// Chain identifier
    pub chain_id: String,
    /// Signer account number
    pub account_number: u64,
    /// Signer account sequence
    pub account_sequence: u64,
    /// Timeout height of the transaction
    pub timeout_height: u64,
    /// All messages in the transaction
    pub msgs: Vec<LocalAny>,
    /// Transaction memo
    pub memo: String,
}

/// Every signer of the transaction and their signature
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplifiedSignatureData {
    /// Signers in transaction order
    pub signers: Vec<AccountAddress>,
    /// Signatures aligned with `signers`
    #[serde(with = "base64_vec")]
    pub signatures: Vec<Vec<u8>>,
}

/// Everything an authenticator may inspect for one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationRequest {
    /// Position of the authenticator in its combinator tree
    pub authenticator_id: CompositeId,
    /// Account that signed the message
    pub account: AccountAddress,
    /// Account paying the fee
    pub fee_payer: AccountAddress,
    /// Fee granter, if any
    pub fee_granter: Option<AccountAddress>,
    /// Fee coins
    pub fee: Vec<Coin>,
    /// Message being authenticated
    pub msg: LocalAny,
    /// Index of `msg` in the transaction
    pub msg_index: u64,
    /// The account's signature
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
    /// Sign bytes
    pub sign_mode_tx_data: SignModeData,
    /// Transaction data
    pub tx_data: ExplicitTxData,
    /// All signers and signatures
    pub signature_data: SimplifiedSignatureData,
    /// Whether the transaction is being simulated
    pub simulate: bool,
    /// Parameters supplied by external-policy authenticators
    #[serde(default, with = "base64_option")]
    pub authenticator_params: Option<Vec<u8>>,
}

impl AuthenticationRequest {
    /// Copy of this request addressed to a different node
    pub fn with_authenticator_id(&self, authenticator_id: CompositeId) -> Self {
        Self {
            authenticator_id,
            ..self.clone()
        }
    }
}

/// Projection of [`AuthenticationRequest`] used for `track`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRequest {
    /// Position of the authenticator in its combinator tree
    pub authenticator_id: CompositeId,
    /// Account that signed the message
    pub account: AccountAddress,
    /// Account paying the fee
    pub fee_payer: AccountAddress,
    /// Fee granter, if any
    pub fee_granter: Option<AccountAddress>,
    /// Fee coins
    pub fee: Vec<Coin>,
    /// Message being tracked
    pub msg: LocalAny,
    /// Index of `msg` in the transaction
    pub msg_index: u64,
    /// Parameters supplied by external-policy authenticators
    #[serde(default, with = "base64_option")]
    pub authenticator_params: Option<Vec<u8>>,
}

/// Projection of [`AuthenticationRequest`] used for `confirm_execution`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmExecutionRequest {
    /// Position of the authenticator in its combinator tree
    pub authenticator_id: CompositeId,
    /// Account that signed the message
    pub account: AccountAddress,
    /// Account paying the fee
    pub fee_payer: AccountAddress,
    /// Fee granter, if any
    pub fee_granter: Option<AccountAddress>,
    /// Fee coins
    pub fee: Vec<Coin>,
    /// Message that was executed
    pub msg: LocalAny,
    /// Index of `msg` in the transaction
    pub msg_index: u64,
    /// Parameters supplied by external-policy authenticators
    #[serde(default, with = "base64_option")]
    pub authenticator_params: Option<Vec<u8>>,
}

impl From<&AuthenticationRequest> for TrackRequest {
    fn from(request: &AuthenticationRequest) -> Self {
        Self {
            authenticator_id: request.authenticator_id.clone(),
            account: request.account.clone(),
            fee_payer: request.fee_payer.clone(),
            fee_granter: request.fee_granter.clone(),
            fee: request.fee.clone(),
            msg: request.msg.clone(),
            msg_index: request.msg_index,
            authenticator_params: request.authenticator_params.clone(),
        }
    }
}

impl From<&AuthenticationRequest> for ConfirmExecutionRequest {
    fn from(request: &AuthenticationRequest) -> Self {
        Self {
            authenticator_id: request.authenticator_id.clone(),
            account: request.account.clone(),
            fee_payer: request.fee_payer.clone(),
            fee_granter: request.fee_granter.clone(),
            fee: request.fee.clone(),
            msg: request.msg.clone(),
            msg_index: request.msg_index,
            authenticator_params: request.authenticator_params.clone(),
        }
    }
}

/// Replay check applied while building a request
pub type ReplayProtection = fn(&ExplicitTxData, &SignatureV2) -> Result<()>;

/// The signature must commit to the account's current sequence.
pub fn sequence_match(tx_data: &ExplicitTxData, signature: &SignatureV2) -> Result<()> {
    if signature.sequence != tx_data.account_sequence {
        return Err(SmartAccountError::unauthorized(format!(
            "account sequence mismatch, expected {}, got {}",
            tx_data.account_sequence, signature.sequence
        )));
    }
    Ok(())
}

/// Skip replay protection; used once it was already enforced.
pub fn no_replay_protection(_tx_data: &ExplicitTxData, _signature: &SignatureV2) -> Result<()> {
    Ok(())
}

/// Build the request for message `msg_index` signed by `account`.
///
/// The returned request has an empty `authenticator_id`; callers set it to
/// the selected authenticator before dispatching.
pub fn generate_authentication_request(
    ctx: &mut Context<'_>,
    account_keeper: &dyn AccountKeeper,
    account: &AccountAddress,
    fee_payer: &AccountAddress,
    fee_granter: Option<&AccountAddress>,
    fee: &[Coin],
    tx: &Tx,
    msg_index: usize,
    simulate: bool,
    replay_protection: ReplayProtection,
) -> Result<AuthenticationRequest> {
    let msg = tx.msgs.get(msg_index).ok_or_else(|| {
        SmartAccountError::malformed_request(format!("message index {msg_index} out of range"))
    })?;
    if msg.signers.len() != 1 {
        return Err(SmartAccountError::unauthorized(
            "only messages with one signer are supported",
        ));
    }
    if &msg.signers[0] != account {
        return Err(SmartAccountError::unauthorized(format!(
            "invalid signer for message {msg_index}: expected {account}, got {}",
            msg.signers[0]
        )));
    }

    let signers_and_signatures = tx.signers_and_signatures()?;
    let signature = signers_and_signatures
        .iter()
        .find(|(signer, _)| signer == account)
        .map(|(_, signature)| signature.clone())
        .ok_or_else(|| {
            SmartAccountError::unauthorized(format!("no signature found for account {account}"))
        })?;

    let base_account = account_keeper
        .get_account(ctx, account)?
        .ok_or_else(|| SmartAccountError::not_found(format!("account {account} not found")))?;

    let tx_data = ExplicitTxData {
        chain_id: ctx.chain_id().to_string(),
        account_number: base_account.account_number,
        account_sequence: base_account.sequence,
        timeout_height: tx.timeout_height,
        msgs: tx.msg_anys(),
        memo: tx.memo.clone(),
    };
    replay_protection(&tx_data, &signature)?;

    let direct = tx.sign_bytes(
        &tx_data.chain_id,
        tx_data.account_number,
        tx_data.account_sequence,
    )?;

    let (signers, signatures): (Vec<_>, Vec<_>) = signers_and_signatures
        .into_iter()
        .map(|(signer, signature)| (signer, signature.signature))
        .unzip();

    Ok(AuthenticationRequest {
        authenticator_id: CompositeId::new(""),
        account: account.clone(),
        fee_payer: fee_payer.clone(),
        fee_granter: fee_granter.cloned(),
        fee: fee.to_vec(),
        msg: msg.to_any(),
        msg_index: msg_index as u64,
        signature: signature.signature,
        sign_mode_tx_data: SignModeData {
            direct,
            textual: None,
        },
        tx_data,
        signature_data: SimplifiedSignatureData {
            signers,
            signatures,
        },
        simulate,
        authenticator_params: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(sequence: u64) -> SignatureV2 {
        SignatureV2 {
            pub_key: None,
            signature: vec![1, 2, 3],
            sequence,
        }
    }

    #[test]
    fn test_sequence_match() {
        let tx_data = ExplicitTxData {
            account_sequence: 4,
            ..ExplicitTxData::default()
        };
        assert!(sequence_match(&tx_data, &sig(4)).is_ok());
        assert!(sequence_match(&tx_data, &sig(3)).is_err());
        assert!(no_replay_protection(&tx_data, &sig(3)).is_ok());
    }

    #[test]
    fn test_projections_keep_shared_fields() {
        let request = AuthenticationRequest {
            authenticator_id: CompositeId::new("7.1"),
            account: AccountAddress::new(vec![1; 20]),
            fee_payer: AccountAddress::new(vec![2; 20]),
            fee_granter: None,
            fee: vec![Coin::new("uosmo", 10)],
            msg: LocalAny {
                type_url: "/test.Msg".into(),
                value: b"{}".to_vec(),
            },
            msg_index: 2,
            signature: vec![9],
            sign_mode_tx_data: SignModeData::default(),
            tx_data: ExplicitTxData::default(),
            signature_data: SimplifiedSignatureData::default(),
            simulate: false,
            authenticator_params: Some(b"{}".to_vec()),
        };
        let track = TrackRequest::from(&request);
        assert_eq!(track.authenticator_id.as_str(), "7.1");
        assert_eq!(track.msg_index, 2);
        let confirm = ConfirmExecutionRequest::from(&request);
        assert_eq!(confirm.authenticator_params, Some(b"{}".to_vec()));
    }
}
