//! Administrative message handlers
//!
//! The sender of `MsgAddAuthenticator` / `MsgRemoveAuthenticator` is the
//! account being modified; the host has already verified its signature.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use smart_account_core::encoding::base64_bytes;
use smart_account_core::{AccountAddress, Context, Result, SmartAccountError};

use crate::keeper::SmartAccountKeeper;

/// Install an authenticator on the sender's account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgAddAuthenticator {
    /// Account installing the authenticator
    pub sender: AccountAddress,
    /// Registered type name
    pub authenticator_type: String,
    /// Configuration bytes
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

/// Result of [`MsgAddAuthenticator`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgAddAuthenticatorResponse {
    /// Id assigned to the new entry
    pub id: u64,
}

/// Remove one of the sender's authenticators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRemoveAuthenticator {
    /// Account owning the authenticator
    pub sender: AccountAddress,
    /// Id of the entry to remove
    pub id: u64,
}

/// Result of [`MsgRemoveAuthenticator`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRemoveAuthenticatorResponse {
    /// Always true when returned
    pub success: bool,
}

/// Enable or disable the authenticator pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSetActiveState {
    /// Governor (to activate) or circuit breaker controller (to deactivate)
    pub sender: AccountAddress,
    /// Requested state
    pub active: bool,
}

/// Result of [`MsgSetActiveState`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSetActiveStateResponse {}

/// Stateless checks performed before a message is handled
pub trait ValidateBasic {
    /// Reject structurally invalid messages
    fn validate_basic(&self) -> Result<()>;
}

fn require_sender(sender: &AccountAddress) -> Result<()> {
    if sender.is_empty() {
        return Err(SmartAccountError::malformed_request("sender address is empty"));
    }
    Ok(())
}

impl ValidateBasic for MsgAddAuthenticator {
    fn validate_basic(&self) -> Result<()> {
        require_sender(&self.sender)?;
        if self.authenticator_type.is_empty() {
            return Err(SmartAccountError::malformed_request("authenticator type is empty"));
        }
        Ok(())
    }
}

impl ValidateBasic for MsgRemoveAuthenticator {
    fn validate_basic(&self) -> Result<()> {
        require_sender(&self.sender)
    }
}

impl ValidateBasic for MsgSetActiveState {
    fn validate_basic(&self) -> Result<()> {
        require_sender(&self.sender)
    }
}

/// Handler for administrative messages
#[derive(Debug, Clone, Copy)]
pub struct MsgServer<'k> {
    keeper: &'k SmartAccountKeeper,
}

impl<'k> MsgServer<'k> {
    /// Server backed by `keeper`
    pub fn new(keeper: &'k SmartAccountKeeper) -> Self {
        Self { keeper }
    }

    /// Handle [`MsgAddAuthenticator`]; refused while the module is inactive
    pub fn add_authenticator(
        &self,
        ctx: &mut Context<'_>,
        msg: &MsgAddAuthenticator,
    ) -> Result<MsgAddAuthenticatorResponse> {
        msg.validate_basic()?;
        if !self.keeper.is_smart_account_active(ctx)? {
            return Err(SmartAccountError::unauthorized(
                "smartaccount module is not active",
            ));
        }
        let id = self.keeper.add_authenticator(
            ctx,
            &msg.sender,
            &msg.authenticator_type,
            &msg.data,
        )?;
        Ok(MsgAddAuthenticatorResponse { id })
    }

    /// Handle [`MsgRemoveAuthenticator`]
    pub fn remove_authenticator(
        &self,
        ctx: &mut Context<'_>,
        msg: &MsgRemoveAuthenticator,
    ) -> Result<MsgRemoveAuthenticatorResponse> {
        msg.validate_basic()?;
        self.keeper.remove_authenticator(ctx, &msg.sender, msg.id)?;
        Ok(MsgRemoveAuthenticatorResponse { success: true })
    }

    /// Handle [`MsgSetActiveState`].
    ///
    /// Activation is reserved to the governor; deactivation to the circuit
    /// breaker controllers.
    pub fn set_active_state(
        &self,
        ctx: &mut Context<'_>,
        msg: &MsgSetActiveState,
    ) -> Result<MsgSetActiveStateResponse> {
        msg.validate_basic()?;
        if msg.active {
            if self.keeper.governor() != Some(&msg.sender) {
                warn!(sender = %msg.sender, "Rejected activation from non-governor");
                return Err(SmartAccountError::unauthorized(format!(
                    "{} is not the governor and cannot activate the smartaccount module",
                    msg.sender
                )));
            }
        } else {
            let params = self.keeper.get_params(ctx)?;
            if !params.is_circuit_breaker_controller(&msg.sender) {
                warn!(sender = %msg.sender, "Rejected deactivation from non-controller");
                return Err(SmartAccountError::unauthorized(format!(
                    "{} is not a circuit breaker controller",
                    msg.sender
                )));
            }
        }
        self.keeper.set_active_state(ctx, msg.active)?;
        info!(sender = %msg.sender, active = msg.active, "Set smartaccount active state");
        Ok(MsgSetActiveStateResponse {})
    }
}
