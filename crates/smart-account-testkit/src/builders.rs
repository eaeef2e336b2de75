//! Transaction and request builders

use std::sync::Arc;

use smart_account_authenticator::{
    AuthenticationRequest, ExplicitTxData, SignModeData, SimplifiedSignatureData,
};
use smart_account_core::{
    AccountAddress, Coin, CompositeId, Fee, SignatureV2, Tx, TxExtension, TxMsg,
};

use crate::app::TEST_DENOM;
use crate::keys::TestAccount;
use crate::mocks::InMemoryAccountKeeper;

/// Fee attached by default
pub const DEFAULT_FEE_AMOUNT: u64 = 2_500;

/// Gas limit attached by default
pub const DEFAULT_GAS_LIMIT: u64 = 10_000_000;

/// Builder signing transactions with the current account sequences
#[derive(Debug, Clone)]
pub struct TxBuilder {
    chain_id: String,
    accounts: Arc<InMemoryAccountKeeper>,
    tx: Tx,
}

impl TxBuilder {
    /// Builder for `chain_id` reading account numbers from `accounts`
    pub fn new(chain_id: impl Into<String>, accounts: Arc<InMemoryAccountKeeper>) -> Self {
        Self {
            chain_id: chain_id.into(),
            accounts,
            tx: Tx {
                fee: Fee {
                    amount: vec![Coin::new(TEST_DENOM, DEFAULT_FEE_AMOUNT)],
                    gas_limit: DEFAULT_GAS_LIMIT,
                    payer: None,
                    granter: None,
                },
                ..Tx::default()
            },
        }
    }

    /// Append a message
    pub fn msg(mut self, msg: TxMsg) -> Self {
        self.tx.msgs.push(msg);
        self
    }

    /// Replace the fee
    pub fn fee(mut self, amount: Vec<Coin>, gas_limit: u64) -> Self {
        self.tx.fee.amount = amount;
        self.tx.fee.gas_limit = gas_limit;
        self
    }

    /// Set an explicit fee payer
    pub fn fee_payer(mut self, payer: AccountAddress) -> Self {
        self.tx.fee.payer = Some(payer);
        self
    }

    /// Set a fee granter
    pub fn fee_granter(mut self, granter: AccountAddress) -> Self {
        self.tx.fee.granter = Some(granter);
        self
    }

    /// Set the memo
    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.tx.memo = memo.into();
        self
    }

    /// Select one authenticator id per message
    pub fn select(mut self, selected_authenticators: Vec<u64>) -> Self {
        self.tx.extension = Some(TxExtension {
            selected_authenticators,
        });
        self
    }

    /// The transaction without signatures
    pub fn unsigned(&self) -> Tx {
        self.tx.clone()
    }

    /// Bytes `address` must sign for `tx`, using its current sequence
    pub fn sign_bytes(&self, tx: &Tx, address: &AccountAddress) -> Vec<u8> {
        let (account_number, sequence) = self
            .accounts
            .account(address)
            .map_or((0, 0), |account| (account.account_number, account.sequence));
        tx.sign_bytes(&self.chain_id, account_number, sequence)
            .expect("sign doc encodes")
    }

    /// Sign with `keys`, one signature per distinct signer in signer order
    pub fn build(&self, keys: &[&TestAccount]) -> Tx {
        let mut tx = self.tx.clone();
        tx.signatures = tx
            .signers()
            .iter()
            .map(|signer| {
                let key = keys
                    .iter()
                    .find(|key| &key.address() == signer)
                    .unwrap_or_else(|| panic!("no key supplied for signer {signer}"));
                let sequence = self.accounts.account(signer).map_or(0, |a| a.sequence);
                SignatureV2 {
                    pub_key: Some(key.public_key_bytes()),
                    signature: key.sign(&self.sign_bytes(&tx, signer)),
                    sequence,
                }
            })
            .collect();
        tx
    }
}

/// Bare request for `account` authenticating `msg`, for driving
/// authenticators directly.
pub fn request_for(
    account: &TestAccount,
    authenticator_id: CompositeId,
    msg: &TxMsg,
) -> AuthenticationRequest {
    AuthenticationRequest {
        authenticator_id,
        account: account.address(),
        fee_payer: account.address(),
        fee_granter: None,
        fee: vec![Coin::new(TEST_DENOM, DEFAULT_FEE_AMOUNT)],
        msg: msg.to_any(),
        msg_index: 0,
        signature: Vec::new(),
        sign_mode_tx_data: SignModeData::default(),
        tx_data: ExplicitTxData::default(),
        signature_data: SimplifiedSignatureData::default(),
        simulate: false,
        authenticator_params: None,
    }
}
