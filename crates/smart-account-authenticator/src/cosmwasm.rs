//! External-policy bridge to a sandboxed contract runtime
//!
//! Every phase is serialized into a [`SudoMsg`] envelope and handed to the
//! configured contract. The contract's verdict, including its error, is
//! returned unchanged.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use smart_account_core::encoding::base64_option;
use smart_account_core::{
    AccountAddress, CompositeId, Context, ContractRuntime, Gas, Result, SmartAccountError,
};

use crate::authenticator::Authenticator;
use crate::request::{AuthenticationRequest, ConfirmExecutionRequest, TrackRequest};

/// Registry type of [`CosmwasmAuthenticator`]
pub const COSMWASM_AUTHENTICATOR_TYPE: &str = "CosmwasmAuthenticatorV1";

/// Stored configuration: contract address plus optional JSON parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosmwasmAuthenticatorInitData {
    /// Hex address of the policy contract
    pub contract: String,
    /// Contract-specific parameters; must be JSON when present
    #[serde(default, with = "base64_option")]
    pub params: Option<Vec<u8>>,
}

impl CosmwasmAuthenticatorInitData {
    /// Serialize as authenticator configuration
    pub fn to_config(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Payload of the added/removed hooks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnAuthenticatorAddedRequest {
    /// Account installing the authenticator
    pub account: AccountAddress,
    /// Configured parameters
    #[serde(default, with = "base64_option")]
    pub authenticator_params: Option<Vec<u8>>,
    /// Composite id of the authenticator
    pub authenticator_id: CompositeId,
}

/// Payload of the removal hook
pub type OnAuthenticatorRemovedRequest = OnAuthenticatorAddedRequest;

/// Envelope passed to the contract's sudo entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SudoMsg {
    /// Admission hook
    OnAuthenticatorAdded(OnAuthenticatorAddedRequest),
    /// Removal hook
    OnAuthenticatorRemoved(OnAuthenticatorRemovedRequest),
    /// Authentication
    Authenticate(AuthenticationRequest),
    /// Tracking
    Track(TrackRequest),
    /// Post-execution confirmation
    ConfirmExecution(ConfirmExecutionRequest),
}

/// Authenticator delegating every phase to a policy contract
pub struct CosmwasmAuthenticator {
    runtime: Arc<dyn ContractRuntime>,
    contract: Option<AccountAddress>,
    params: Option<Vec<u8>>,
}

impl CosmwasmAuthenticator {
    /// Prototype bound to `runtime`
    pub fn new(runtime: Arc<dyn ContractRuntime>) -> Self {
        Self {
            runtime,
            contract: None,
            params: None,
        }
    }

    /// Configured contract, if initialized
    pub fn contract(&self) -> Option<&AccountAddress> {
        self.contract.as_ref()
    }

    /// Configured parameters, if any
    pub fn params(&self) -> Option<&[u8]> {
        self.params.as_deref()
    }

    fn parse_init_data(config: &[u8]) -> Result<(AccountAddress, Option<Vec<u8>>)> {
        let init: CosmwasmAuthenticatorInitData = serde_json::from_slice(config).map_err(|e| {
            SmartAccountError::malformed_request(format!("invalid cosmwasm authenticator config: {e}"))
        })?;
        let contract: AccountAddress = init.contract.parse()?;
        if let Some(params) = &init.params {
            serde_json::from_slice::<serde_json::Value>(params).map_err(|e| {
                SmartAccountError::malformed_request(format!(
                    "invalid json representation of params: {e}"
                ))
            })?;
        }
        Ok((contract, init.params))
    }

    fn configured_contract(&self) -> Result<&AccountAddress> {
        self.contract
            .as_ref()
            .ok_or_else(|| SmartAccountError::internal("cosmwasm authenticator is not initialized"))
    }

    fn sudo(&self, ctx: &mut Context<'_>, contract: &AccountAddress, msg: &SudoMsg) -> Result<()> {
        let payload = serde_json::to_vec(msg)?;
        debug!(%contract, bytes = payload.len(), "Dispatching sudo to policy contract");
        self.runtime.sudo(ctx, contract, &payload)?;
        Ok(())
    }
}

impl Authenticator for CosmwasmAuthenticator {
    fn type_name(&self) -> &str {
        COSMWASM_AUTHENTICATOR_TYPE
    }

    fn static_gas(&self) -> Gas {
        0
    }

    fn initialize(&self, config: &[u8]) -> Result<Box<dyn Authenticator>> {
        let (contract, params) = Self::parse_init_data(config)?;
        Ok(Box::new(Self {
            runtime: Arc::clone(&self.runtime),
            contract: Some(contract),
            params,
        }))
    }

    fn authenticate(&self, ctx: &mut Context<'_>, request: &AuthenticationRequest) -> Result<()> {
        let contract = self.configured_contract()?;
        let mut request = request.clone();
        request.authenticator_params = self.params.clone();
        self.sudo(ctx, contract, &SudoMsg::Authenticate(request))
    }

    fn track(&self, ctx: &mut Context<'_>, request: &AuthenticationRequest) -> Result<()> {
        let contract = self.configured_contract()?;
        let mut track = TrackRequest::from(request);
        track.authenticator_params = self.params.clone();
        self.sudo(ctx, contract, &SudoMsg::Track(track))
    }

    fn confirm_execution(
        &self,
        ctx: &mut Context<'_>,
        request: &AuthenticationRequest,
    ) -> Result<()> {
        let contract = self.configured_contract()?;
        let mut confirm = ConfirmExecutionRequest::from(request);
        confirm.authenticator_params = self.params.clone();
        self.sudo(ctx, contract, &SudoMsg::ConfirmExecution(confirm))
    }

    fn on_authenticator_added(
        &self,
        ctx: &mut Context<'_>,
        account: &AccountAddress,
        config: &[u8],
        authenticator_id: &CompositeId,
    ) -> Result<()> {
        let (contract, params) = Self::parse_init_data(config)?;
        if !self.runtime.has_contract(ctx, &contract)? {
            return Err(SmartAccountError::admission_rejected(format!(
                "contract {contract} does not exist"
            )));
        }
        let msg = SudoMsg::OnAuthenticatorAdded(OnAuthenticatorAddedRequest {
            account: account.clone(),
            authenticator_params: params,
            authenticator_id: authenticator_id.clone(),
        });
        self.sudo(ctx, &contract, &msg)
    }

    fn on_authenticator_removed(
        &self,
        ctx: &mut Context<'_>,
        account: &AccountAddress,
        config: &[u8],
        authenticator_id: &CompositeId,
    ) -> Result<()> {
        let (contract, params) = Self::parse_init_data(config)?;
        let msg = SudoMsg::OnAuthenticatorRemoved(OnAuthenticatorRemovedRequest {
            account: account.clone(),
            authenticator_params: params,
            authenticator_id: authenticator_id.clone(),
        });
        self.sudo(ctx, &contract, &msg)
    }
}
