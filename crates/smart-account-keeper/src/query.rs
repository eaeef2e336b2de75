//! Read-only queries

use serde::{Deserialize, Serialize};

use smart_account_core::{AccountAddress, Context, Result};

use crate::keeper::SmartAccountKeeper;
use crate::params::Params;
use crate::types::AccountAuthenticator;

/// Authenticators of one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAuthenticatorsRequest {
    /// Account to list
    pub account: AccountAddress,
}

/// Result of [`GetAuthenticatorsRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAuthenticatorsResponse {
    /// Entries in id order
    pub account_authenticators: Vec<AccountAuthenticator>,
}

/// One authenticator of one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAuthenticatorRequest {
    /// Owning account
    pub account: AccountAddress,
    /// Entry id
    pub authenticator_id: u64,
}

/// Result of [`GetAuthenticatorRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAuthenticatorResponse {
    /// The entry
    pub account_authenticator: AccountAuthenticator,
}

/// Query handler
#[derive(Debug, Clone, Copy)]
pub struct Querier<'k> {
    keeper: &'k SmartAccountKeeper,
}

impl<'k> Querier<'k> {
    /// Querier backed by `keeper`
    pub fn new(keeper: &'k SmartAccountKeeper) -> Self {
        Self { keeper }
    }

    /// Current module params
    pub fn params(&self, ctx: &mut Context<'_>) -> Result<Params> {
        self.keeper.get_params(ctx)
    }

    /// All authenticators of an account; empty when it has none
    pub fn get_authenticators(
        &self,
        ctx: &mut Context<'_>,
        request: &GetAuthenticatorsRequest,
    ) -> Result<GetAuthenticatorsResponse> {
        let account_authenticators = self
            .keeper
            .get_authenticators_for_account(ctx, &request.account)?;
        Ok(GetAuthenticatorsResponse {
            account_authenticators,
        })
    }

    /// One authenticator; `NotFound` when absent
    pub fn get_authenticator(
        &self,
        ctx: &mut Context<'_>,
        request: &GetAuthenticatorRequest,
    ) -> Result<GetAuthenticatorResponse> {
        let account_authenticator = self.keeper.get_selected_authenticator_data(
            ctx,
            &request.account,
            request.authenticator_id,
        )?;
        Ok(GetAuthenticatorResponse {
            account_authenticator,
        })
    }
}
