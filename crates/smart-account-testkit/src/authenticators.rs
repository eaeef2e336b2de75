//! Authenticators with scripted behaviour
//!
//! - [`TestingAuthenticator`]: fixed approve/confirm outcome and gas cost
//! - [`SpyAuthenticator`]: records the latest call of every phase into state
//! - [`StatefulAuthenticator`]: bumps a per-account counter in every phase

use serde::{Deserialize, Serialize};

use smart_account_authenticator::{AuthenticationRequest, Authenticator};
use smart_account_core::encoding::base64_bytes;
use smart_account_core::{
    AccountAddress, CompositeId, Context, Gas, LocalAny, Result, SmartAccountError,
};

/// Fixed outcome of a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approval {
    /// The phase succeeds
    Always,
    /// The phase fails
    Never,
}

/// Authenticator whose every outcome is fixed at construction.
///
/// Each configuration registers under its own descriptive type name, so
/// several variants can live in one registry.
#[derive(Debug, Clone)]
pub struct TestingAuthenticator {
    approve: Approval,
    gas_consumption: Gas,
    confirm: Approval,
    block_addition: bool,
    block_removal: bool,
    type_name: String,
}

impl TestingAuthenticator {
    /// Authenticator with the given outcomes and static gas
    pub fn new(approve: Approval, gas_consumption: Gas, confirm: Approval) -> Self {
        let mut authenticator = Self {
            approve,
            gas_consumption,
            confirm,
            block_addition: false,
            block_removal: false,
            type_name: String::new(),
        };
        authenticator.type_name = authenticator.describe();
        authenticator
    }

    /// Approves and confirms everything
    pub fn approving(gas_consumption: Gas) -> Self {
        Self::new(Approval::Always, gas_consumption, Approval::Always)
    }

    /// Rejects authentication, confirms execution
    pub fn rejecting(gas_consumption: Gas) -> Self {
        Self::new(Approval::Never, gas_consumption, Approval::Always)
    }

    /// Vetoes every attempt to add it
    pub fn blocking_addition(mut self) -> Self {
        self.block_addition = true;
        self.type_name = self.describe();
        self
    }

    /// Vetoes every attempt to remove it
    pub fn blocking_removal(mut self) -> Self {
        self.block_removal = true;
        self.type_name = self.describe();
        self
    }

    fn describe(&self) -> String {
        let approve = match self.approve {
            Approval::Always => "Approve",
            Approval::Never => "Reject",
        };
        let confirm = match self.confirm {
            Approval::Always => "Confirm",
            Approval::Never => "Block",
        };
        let mut name = format!("TestingAuthenticator{approve}{confirm}{}", self.gas_consumption);
        if self.block_addition {
            name.push_str("BlockAdd");
        }
        if self.block_removal {
            name.push_str("BlockRemove");
        }
        name
    }
}

impl Authenticator for TestingAuthenticator {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn static_gas(&self) -> Gas {
        self.gas_consumption
    }

    fn initialize(&self, _config: &[u8]) -> Result<Box<dyn Authenticator>> {
        Ok(Box::new(self.clone()))
    }

    fn authenticate(&self, _ctx: &mut Context<'_>, _request: &AuthenticationRequest) -> Result<()> {
        match self.approve {
            Approval::Always => Ok(()),
            Approval::Never => Err(SmartAccountError::authentication_failed(
                "TestingAuthenticator authentication error",
            )),
        }
    }

    fn track(&self, _ctx: &mut Context<'_>, _request: &AuthenticationRequest) -> Result<()> {
        Ok(())
    }

    fn confirm_execution(
        &self,
        _ctx: &mut Context<'_>,
        _request: &AuthenticationRequest,
    ) -> Result<()> {
        match self.confirm {
            Approval::Always => Ok(()),
            Approval::Never => Err(SmartAccountError::confirmation_rejected(
                "execution blocked by authenticator",
            )),
        }
    }

    fn on_authenticator_added(
        &self,
        _ctx: &mut Context<'_>,
        _account: &AccountAddress,
        _config: &[u8],
        _authenticator_id: &CompositeId,
    ) -> Result<()> {
        if self.block_addition {
            return Err(SmartAccountError::admission_rejected(
                "authenticator could not be added",
            ));
        }
        Ok(())
    }

    fn on_authenticator_removed(
        &self,
        _ctx: &mut Context<'_>,
        _account: &AccountAddress,
        _config: &[u8],
        _authenticator_id: &CompositeId,
    ) -> Result<()> {
        if self.block_removal {
            return Err(SmartAccountError::admission_rejected(
                "authenticator could not be removed",
            ));
        }
        Ok(())
    }
}

/// Registry type of [`SpyAuthenticator`]
pub const SPY_AUTHENTICATOR_TYPE: &str = "Spy";

/// Phases in which a spy fails after recording the call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailureFlags {
    /// Fail `authenticate`
    pub authenticate: bool,
    /// Fail `track`
    pub track: bool,
    /// Fail `confirm_execution`
    pub confirm_execution: bool,
    /// Fail `on_authenticator_added`
    pub on_authenticator_added: bool,
    /// Fail `on_authenticator_removed`
    pub on_authenticator_removed: bool,
}

/// Spy configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpyAuthenticatorData {
    /// Name the calls are recorded under
    pub name: String,
    /// Phases that fail
    #[serde(default)]
    pub failure: FailureFlags,
}

impl SpyAuthenticatorData {
    /// Spy that never fails
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure: FailureFlags::default(),
        }
    }

    /// Spy failing in the flagged phases
    pub fn failing(name: impl Into<String>, failure: FailureFlags) -> Self {
        Self {
            name: name.into(),
            failure,
        }
    }

    /// JSON configuration bytes
    pub fn to_config(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("spy data serializes")
    }
}

/// Recorded `on_authenticator_added` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpyAddRequest {
    /// Account adding the authenticator
    pub account: AccountAddress,
    /// Configuration passed to the hook
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    /// Composite id passed to the hook
    pub authenticator_id: CompositeId,
}

/// Recorded `on_authenticator_removed` call
pub type SpyRemoveRequest = SpyAddRequest;

/// Recorded `track` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpyTrackRequest {
    /// Composite id of the spy
    pub authenticator_id: CompositeId,
    /// Account being tracked
    pub account: AccountAddress,
    /// Tracked message
    pub msg: LocalAny,
    /// Index of the message in its transaction
    pub msg_index: u64,
}

/// Latest call of each phase seen by one spy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestCalls {
    /// Last admission call
    pub on_authenticator_added: Option<SpyAddRequest>,
    /// Last authentication request
    pub authenticate: Option<AuthenticationRequest>,
    /// Last track call
    pub track: Option<SpyTrackRequest>,
    /// Last confirmation request
    pub confirm_execution: Option<AuthenticationRequest>,
    /// Last removal call
    pub on_authenticator_removed: Option<SpyRemoveRequest>,
}

/// Authenticator that writes every call it receives into state.
///
/// Calls are stored under the spy's name, so writes made in a discarded
/// overlay are visible as missing records.
#[derive(Debug, Clone, Default)]
pub struct SpyAuthenticator {
    data: Option<SpyAuthenticatorData>,
}

impl SpyAuthenticator {
    /// Unconfigured prototype
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str) -> Vec<u8> {
        format!("spy|{name}").into_bytes()
    }

    /// Calls recorded for the spy called `name`
    pub fn latest_calls(ctx: &mut Context<'_>, name: &str) -> Result<LatestCalls> {
        match ctx.get(&Self::key(name))? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(LatestCalls::default()),
        }
    }

    fn record(ctx: &mut Context<'_>, name: &str, update: impl FnOnce(&mut LatestCalls)) -> Result<()> {
        let mut calls = Self::latest_calls(ctx, name)?;
        update(&mut calls);
        ctx.set(&Self::key(name), &serde_json::to_vec(&calls)?)
    }

    fn data(&self) -> Result<&SpyAuthenticatorData> {
        self.data
            .as_ref()
            .ok_or_else(|| SmartAccountError::internal("spy authenticator is not initialized"))
    }

    fn parse(config: &[u8]) -> Result<SpyAuthenticatorData> {
        serde_json::from_slice(config).map_err(|e| {
            SmartAccountError::malformed_request(format!("invalid spy config: {e}"))
        })
    }
}

impl Authenticator for SpyAuthenticator {
    fn type_name(&self) -> &str {
        SPY_AUTHENTICATOR_TYPE
    }

    fn static_gas(&self) -> Gas {
        0
    }

    fn initialize(&self, config: &[u8]) -> Result<Box<dyn Authenticator>> {
        Ok(Box::new(Self {
            data: Some(Self::parse(config)?),
        }))
    }

    fn authenticate(&self, ctx: &mut Context<'_>, request: &AuthenticationRequest) -> Result<()> {
        let data = self.data()?;
        Self::record(ctx, &data.name, |calls| {
            calls.authenticate = Some(request.clone());
        })?;
        if data.failure.authenticate {
            return Err(SmartAccountError::authentication_failed(format!(
                "spy {} failed to authenticate",
                data.name
            )));
        }
        Ok(())
    }

    fn track(&self, ctx: &mut Context<'_>, request: &AuthenticationRequest) -> Result<()> {
        let data = self.data()?;
        Self::record(ctx, &data.name, |calls| {
            calls.track = Some(SpyTrackRequest {
                authenticator_id: request.authenticator_id.clone(),
                account: request.account.clone(),
                msg: request.msg.clone(),
                msg_index: request.msg_index,
            });
        })?;
        if data.failure.track {
            return Err(SmartAccountError::internal(format!(
                "spy {} failed to track",
                data.name
            )));
        }
        Ok(())
    }

    fn confirm_execution(
        &self,
        ctx: &mut Context<'_>,
        request: &AuthenticationRequest,
    ) -> Result<()> {
        let data = self.data()?;
        Self::record(ctx, &data.name, |calls| {
            calls.confirm_execution = Some(request.clone());
        })?;
        if data.failure.confirm_execution {
            return Err(SmartAccountError::confirmation_rejected(format!(
                "spy {} failed to confirm execution",
                data.name
            )));
        }
        Ok(())
    }

    fn on_authenticator_added(
        &self,
        ctx: &mut Context<'_>,
        account: &AccountAddress,
        config: &[u8],
        authenticator_id: &CompositeId,
    ) -> Result<()> {
        let data = Self::parse(config)?;
        Self::record(ctx, &data.name, |calls| {
            calls.on_authenticator_added = Some(SpyAddRequest {
                account: account.clone(),
                data: config.to_vec(),
                authenticator_id: authenticator_id.clone(),
            });
        })?;
        if data.failure.on_authenticator_added {
            return Err(SmartAccountError::admission_rejected(format!(
                "spy {} refused to be added",
                data.name
            )));
        }
        Ok(())
    }

    fn on_authenticator_removed(
        &self,
        ctx: &mut Context<'_>,
        account: &AccountAddress,
        config: &[u8],
        authenticator_id: &CompositeId,
    ) -> Result<()> {
        let data = Self::parse(config)?;
        Self::record(ctx, &data.name, |calls| {
            calls.on_authenticator_removed = Some(SpyRemoveRequest {
                account: account.clone(),
                data: config.to_vec(),
                authenticator_id: authenticator_id.clone(),
            });
        })?;
        if data.failure.on_authenticator_removed {
            return Err(SmartAccountError::admission_rejected(format!(
                "spy {} refused to be removed",
                data.name
            )));
        }
        Ok(())
    }
}

/// Registry type of [`StatefulAuthenticator`]
pub const STATEFUL_AUTHENTICATOR_TYPE: &str = "Stateful";

/// Increments a per-account counter in `authenticate`, `track` and
/// `confirm_execution`. Only the latter two should ever persist.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatefulAuthenticator;

impl StatefulAuthenticator {
    fn key(account: &AccountAddress) -> Vec<u8> {
        let mut key = b"stateful|".to_vec();
        key.extend_from_slice(account.as_bytes());
        key
    }

    /// Current counter of `account`
    pub fn value(ctx: &mut Context<'_>, account: &AccountAddress) -> Result<u64> {
        match ctx.get(&Self::key(account))? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    SmartAccountError::serialization("stateful counter is not 8 bytes")
                })?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }

    fn increment(ctx: &mut Context<'_>, account: &AccountAddress) -> Result<()> {
        let next = Self::value(ctx, account)? + 1;
        ctx.set(&Self::key(account), &next.to_be_bytes())
    }
}

impl Authenticator for StatefulAuthenticator {
    fn type_name(&self) -> &str {
        STATEFUL_AUTHENTICATOR_TYPE
    }

    fn static_gas(&self) -> Gas {
        0
    }

    fn initialize(&self, _config: &[u8]) -> Result<Box<dyn Authenticator>> {
        Ok(Box::new(*self))
    }

    fn authenticate(&self, ctx: &mut Context<'_>, request: &AuthenticationRequest) -> Result<()> {
        Self::increment(ctx, &request.account)
    }

    fn track(&self, ctx: &mut Context<'_>, request: &AuthenticationRequest) -> Result<()> {
        Self::increment(ctx, &request.account)
    }

    fn confirm_execution(
        &self,
        ctx: &mut Context<'_>,
        request: &AuthenticationRequest,
    ) -> Result<()> {
        Self::increment(ctx, &request.account)
    }

    fn on_authenticator_added(
        &self,
        _ctx: &mut Context<'_>,
        _account: &AccountAddress,
        _config: &[u8],
        _authenticator_id: &CompositeId,
    ) -> Result<()> {
        Ok(())
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
