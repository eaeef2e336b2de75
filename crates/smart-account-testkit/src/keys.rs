//! Deterministic test accounts
//!
//! Every account is an Ed25519 key derived from a seed, so addresses and
//! signatures are stable across runs.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use serde_json::json;
use sha2::{Digest, Sha256};

use smart_account_core::{AccountAddress, TxMsg};

/// Message type url used by [`TestAccount::send_msg`]
pub const SEND_MSG_TYPE_URL: &str = "/cosmos.bank.v1beta1.MsgSend";

/// Key pair and derived address of one test account
#[derive(Debug, Clone)]
pub struct TestAccount {
    signing_key: SigningKey,
    address: AccountAddress,
}

impl TestAccount {
    /// Account whose secret key is `seed` repeated
    pub fn from_seed(seed: u8) -> Self {
        Self::from_secret(&[seed; 32])
    }

    /// Account whose secret key is the SHA-256 of `label`
    pub fn from_label(label: &str) -> Self {
        let digest: [u8; 32] = Sha256::digest(label.as_bytes()).into();
        Self::from_secret(&digest)
    }

    fn from_secret(secret: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(secret);
        let address = AccountAddress::from_public_key(signing_key.verifying_key().as_bytes());
        Self {
            signing_key,
            address,
        }
    }

    /// Derived address
    pub fn address(&self) -> AccountAddress {
        self.address.clone()
    }

    /// Verifying key
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Raw public key; the `SignatureVerification` config for this account
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.signing_key.verifying_key().to_bytes().to_vec()
    }

    /// Sign `bytes`
    pub fn sign(&self, bytes: &[u8]) -> Vec<u8> {
        self.signing_key.sign(bytes).to_bytes().to_vec()
    }

    /// A bank send from this account to itself
    pub fn send_msg(&self, amount: u64) -> TxMsg {
        let body = json!({
            "from_address": self.address.to_hex(),
            "to_address": self.address.to_hex(),
            "amount": [{"denom": crate::app::TEST_DENOM, "amount": amount.to_string()}],
        });
        TxMsg::new(SEND_MSG_TYPE_URL, &body, self.address()).expect("send msg encodes")
    }
}
