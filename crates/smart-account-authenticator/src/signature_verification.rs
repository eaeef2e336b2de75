//! Ed25519 signature verification leaf

use ed25519_dalek::{Signature, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH};
use tracing::debug;

use smart_account_core::{AccountAddress, CompositeId, Context, Gas, Result, SmartAccountError};

use crate::authenticator::Authenticator;
use crate::request::AuthenticationRequest;

/// Registry type of [`SignatureVerification`]
pub const SIGNATURE_VERIFICATION_TYPE: &str = "SignatureVerification";

/// Gas charged for one Ed25519 verification
pub const ED25519_VERIFY_COST: Gas = 590;

/// Verifies the message signature against a configured public key.
///
/// Configuration is the raw 32-byte public key.
#[derive(Debug, Clone, Default)]
pub struct SignatureVerification {
    public_key: Option<VerifyingKey>,
}

impl SignatureVerification {
    /// Unconfigured prototype
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_public_key(config: &[u8]) -> Result<VerifyingKey> {
        let bytes: [u8; PUBLIC_KEY_LENGTH] = config.try_into().map_err(|_| {
            SmartAccountError::malformed_request(format!(
                "invalid ed25519 public key size, expected {PUBLIC_KEY_LENGTH}, got {}",
                config.len()
            ))
        })?;
        VerifyingKey::from_bytes(&bytes)
            .map_err(|e| SmartAccountError::malformed_request(format!("invalid public key: {e}")))
    }
}

impl Authenticator for SignatureVerification {
    fn type_name(&self) -> &str {
        SIGNATURE_VERIFICATION_TYPE
    }

    fn static_gas(&self) -> Gas {
        0
    }

    fn initialize(&self, config: &[u8]) -> Result<Box<dyn Authenticator>> {
        Ok(Box::new(Self {
            public_key: Some(Self::parse_public_key(config)?),
        }))
    }

    fn authenticate(&self, ctx: &mut Context<'_>, request: &AuthenticationRequest) -> Result<()> {
        ctx.consume_gas(ED25519_VERIFY_COST, "ed25519 signature verification")?;
        if request.simulate {
            return Ok(());
        }

        let public_key = self.public_key.as_ref().ok_or_else(|| {
            SmartAccountError::authentication_failed("public key not set on authenticator")
        })?;
        let verified = Signature::from_slice(&request.signature)
            .map(|signature| {
                public_key
                    .verify(&request.sign_mode_tx_data.direct, &signature)
                    .is_ok()
            })
            .unwrap_or(false);
        if !verified {
            debug!(account = %request.account, msg_index = request.msg_index, "Signature rejected");
            return Err(SmartAccountError::authentication_failed(format!(
                "signature verification failed; please verify account number ({}), sequence ({}) and chain-id ({})",
                request.tx_data.account_number,
                request.tx_data.account_sequence,
                request.tx_data.chain_id
            )));
        }
        Ok(())
    }

    fn track(&self, _ctx: &mut Context<'_>, _request: &AuthenticationRequest) -> Result<()> {
        Ok(())
    }

    fn confirm_execution(
        &self,
        _ctx: &mut Context<'_>,
        _request: &AuthenticationRequest,
    ) -> Result<()> {
        Ok(())
    }

    fn on_authenticator_added(
        &self,
        _ctx: &mut Context<'_>,
        _account: &AccountAddress,
        config: &[u8],
        _authenticator_id: &CompositeId,
    ) -> Result<()> {
        Self::parse_public_key(config)
            .map(|_| ())
            .map_err(|e| SmartAccountError::admission_rejected(e.to_string()))
    }

    fn on_authenticator_removed(
        &self,
        _ctx: &mut Context<'_>,
        _account: &AccountAddress,
        _config: &[u8],
        _authenticator_id: &CompositeId,
    ) -> Result<()> {
        Ok(())
    }
}
