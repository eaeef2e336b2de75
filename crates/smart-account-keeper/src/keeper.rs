//! Per-account authenticator store
//!
//! Entries are `(id, type, config)` records keyed by account and id. Ids are
//! handed out from one global counter that starts at 1 and only moves forward.
//! Every stored entry is re-initialized through the registry on use; the
//! prototypes held by the registry are never mutated.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, error, info};

use smart_account_authenticator::{Authenticator, AuthenticatorManager, InitializedAuthenticator};
use smart_account_core::{AccountAddress, CompositeId, Context, Result, SmartAccountError};

use crate::keys;
use crate::params::Params;
use crate::types::{AccountAuthenticator, AuthenticatorData};

/// First id handed out by a fresh store
pub const FIRST_AUTHENTICATOR_ID: u64 = 1;

/// Counter bumped when a stored entry names a type the registry lost
pub const MISSING_REGISTERED_AUTHENTICATOR_COUNTER: &str =
    "smart_account_missing_registered_authenticator_total";

/// Store of authenticators, params and the global id counter
pub struct SmartAccountKeeper {
    manager: Arc<AuthenticatorManager>,
    governor: Option<AccountAddress>,
}

impl SmartAccountKeeper {
    /// Keeper resolving types through `manager`
    pub fn new(manager: Arc<AuthenticatorManager>) -> Self {
        Self {
            manager,
            governor: None,
        }
    }

    /// Set the identity allowed to activate the module
    pub fn with_governor(mut self, governor: AccountAddress) -> Self {
        self.governor = Some(governor);
        self
    }

    /// The registry used to resolve stored types
    pub fn authenticator_manager(&self) -> &Arc<AuthenticatorManager> {
        &self.manager
    }

    /// Identity allowed to activate the module
    pub fn governor(&self) -> Option<&AccountAddress> {
        self.governor.as_ref()
    }

    /// Stored params, or the defaults when none were written
    pub fn get_params(&self, ctx: &mut Context<'_>) -> Result<Params> {
        match ctx.get(keys::params_key())? {
            Some(bytes) => bincode::deserialize(&bytes).map_err(|e| {
                SmartAccountError::serialization(format!("failed to unmarshal params: {e}"))
            }),
            None => Ok(Params::default()),
        }
    }

    /// Validate and persist params
    pub fn set_params(&self, ctx: &mut Context<'_>, params: &Params) -> Result<()> {
        params.validate()?;
        let bytes = bincode::serialize(params).map_err(|e| {
            SmartAccountError::serialization(format!("failed to marshal params: {e}"))
        })?;
        ctx.set(keys::params_key(), &bytes)
    }

    /// Whether the authenticator pipeline is enabled
    pub fn is_smart_account_active(&self, ctx: &mut Context<'_>) -> Result<bool> {
        Ok(self.get_params(ctx)?.is_smart_account_active)
    }

    /// Flip the active flag, keeping every other param
    pub fn set_active_state(&self, ctx: &mut Context<'_>, active: bool) -> Result<()> {
        let mut params = self.get_params(ctx)?;
        params.is_smart_account_active = active;
        self.set_params(ctx, &params)
    }

    /// Current counter value without initializing it
    pub fn next_authenticator_id(&self, ctx: &mut Context<'_>) -> Result<u64> {
        match ctx.get(keys::next_authenticator_id_key())? {
            Some(bytes) => decode_id(&bytes),
            None => Ok(FIRST_AUTHENTICATOR_ID),
        }
    }

    /// Next id to assign, writing 1 on first use
    pub fn initialize_or_get_next_authenticator_id(&self, ctx: &mut Context<'_>) -> Result<u64> {
        match ctx.get(keys::next_authenticator_id_key())? {
            Some(bytes) => decode_id(&bytes),
            None => {
                self.set_next_authenticator_id(ctx, FIRST_AUTHENTICATOR_ID)?;
                Ok(FIRST_AUTHENTICATOR_ID)
            }
        }
    }

    /// Overwrite the counter
    pub fn set_next_authenticator_id(&self, ctx: &mut Context<'_>, id: u64) -> Result<()> {
        ctx.set(keys::next_authenticator_id_key(), &id.to_be_bytes())
    }

    /// Every entry of `account` in id order
    pub fn get_authenticators_for_account(
        &self,
        ctx: &mut Context<'_>,
        account: &AccountAddress,
    ) -> Result<Vec<AccountAuthenticator>> {
        let prefix = keys::account_prefix(account)?;
        ctx.prefix_scan(&prefix)?
            .iter()
            .map(|(_, value)| AccountAuthenticator::decode(value))
            .collect()
    }

    /// One stored entry
    pub fn get_selected_authenticator_data(
        &self,
        ctx: &mut Context<'_>,
        account: &AccountAddress,
        id: u64,
    ) -> Result<AccountAuthenticator> {
        let key = keys::account_authenticator_key(account, id)?;
        let bytes = ctx.get(&key)?.ok_or_else(|| {
            SmartAccountError::not_found(format!(
                "authenticator {id} not found for account {account}"
            ))
        })?;
        AccountAuthenticator::decode(&bytes)
    }

    /// A fresh instance of one stored entry
    pub fn get_initialized_authenticator_for_account(
        &self,
        ctx: &mut Context<'_>,
        account: &AccountAddress,
        id: u64,
    ) -> Result<InitializedAuthenticator> {
        let stored = self.get_selected_authenticator_data(ctx, account, id)?;
        if !self
            .manager
            .is_authenticator_type_registered(&stored.authenticator_type)
        {
            counter!(MISSING_REGISTERED_AUTHENTICATOR_COUNTER).increment(1);
            error!(
                authenticator_type = %stored.authenticator_type,
                id,
                "Account authenticator type is not registered"
            );
        }
        stored.as_initialized_authenticator(&self.manager)
    }

    /// Install an authenticator on `account`, returning its id.
    ///
    /// The admission hook runs against `ctx` and may veto; on veto nothing is
    /// stored and the counter does not advance.
    pub fn add_authenticator(
        &self,
        ctx: &mut Context<'_>,
        account: &AccountAddress,
        authenticator_type: &str,
        config: &[u8],
    ) -> Result<u64> {
        let prototype = self.prototype(authenticator_type)?;
        let id = self.initialize_or_get_next_authenticator_id(ctx)?;

        prototype
            .on_authenticator_added(ctx, account, config, &CompositeId::root(id))
            .map_err(|e| {
                e.with_context(format!(
                    "`OnAuthenticatorAdded` failed on authenticator type {authenticator_type}"
                ))
            })?;

        let next = id
            .checked_add(1)
            .ok_or_else(|| SmartAccountError::internal("authenticator id space exhausted"))?;
        self.set_next_authenticator_id(ctx, next)?;
        self.store_authenticator(
            ctx,
            account,
            &AccountAuthenticator::new(id, authenticator_type, config),
        )?;

        info!(%account, id, %authenticator_type, "Added authenticator");
        Ok(id)
    }

    /// Restore an entry under a fixed id.
    ///
    /// Used by genesis import: the admission hook still validates the entry,
    /// but against a throwaway overlay whose writes are dropped. The counter
    /// is left to the caller.
    pub fn add_authenticator_with_id(
        &self,
        ctx: &mut Context<'_>,
        account: &AccountAddress,
        authenticator_type: &str,
        config: &[u8],
        id: u64,
    ) -> Result<()> {
        let prototype = self.prototype(authenticator_type)?;
        {
            let mut scratch = ctx.cache_context();
            prototype
                .on_authenticator_added(&mut scratch.context(), account, config, &CompositeId::root(id))
                .map_err(|e| {
                    e.with_context(format!(
                        "`OnAuthenticatorAdded` failed on authenticator type {authenticator_type}"
                    ))
                })?;
        }
        self.store_authenticator(
            ctx,
            account,
            &AccountAuthenticator::new(id, authenticator_type, config),
        )?;
        debug!(%account, id, %authenticator_type, "Restored authenticator");
        Ok(())
    }

    /// Remove an entry; the removal hook may veto, leaving it in place
    pub fn remove_authenticator(
        &self,
        ctx: &mut Context<'_>,
        account: &AccountAddress,
        id: u64,
    ) -> Result<()> {
        let key = keys::account_authenticator_key(account, id)?;
        let bytes = ctx.get(&key)?.ok_or_else(|| {
            SmartAccountError::not_found(format!(
                "authenticator with id {id} does not exist for account {account}"
            ))
        })?;
        let existing = AccountAuthenticator::decode(&bytes)?;
        let prototype = self.prototype(&existing.authenticator_type)?;

        prototype
            .on_authenticator_removed(ctx, account, &existing.config, &CompositeId::root(id))
            .map_err(|e| {
                e.with_context(format!(
                    "`OnAuthenticatorRemoved` failed on authenticator type {}",
                    existing.authenticator_type
                ))
            })?;

        ctx.delete(&key)?;
        info!(%account, id, authenticator_type = %existing.authenticator_type, "Removed authenticator");
        Ok(())
    }

    /// Every stored entry grouped by account, accounts in key order
    pub fn all_authenticator_data(&self, ctx: &mut Context<'_>) -> Result<Vec<AuthenticatorData>> {
        let mut grouped: Vec<AuthenticatorData> = Vec::new();
        for (key, value) in ctx.prefix_scan(keys::authenticator_prefix())? {
            let (address, _) = keys::parse_account_authenticator_key(&key)?;
            let entry = AccountAuthenticator::decode(&value)?;
            match grouped.last_mut() {
                Some(last) if last.address == address => last.authenticators.push(entry),
                _ => grouped.push(AuthenticatorData {
                    address,
                    authenticators: vec![entry],
                }),
            }
        }
        Ok(grouped)
    }

    fn prototype(&self, authenticator_type: &str) -> Result<Arc<dyn Authenticator>> {
        self.manager
            .get_authenticator_by_type(authenticator_type)
            .ok_or_else(|| SmartAccountError::type_not_registered(authenticator_type))
    }

    fn store_authenticator(
        &self,
        ctx: &mut Context<'_>,
        account: &AccountAddress,
        entry: &AccountAuthenticator,
    ) -> Result<()> {
        let key = keys::account_authenticator_key(account, entry.id)?;
        ctx.set(&key, &entry.encode()?)
    }
}

impl std::fmt::Debug for SmartAccountKeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartAccountKeeper")
            .field("manager", &self.manager)
            .field("governor", &self.governor)
            .finish()
    }
}

fn decode_id(bytes: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = bytes.try_into().map_err(|_| {
        SmartAccountError::storage(format!(
            "next authenticator id has {} bytes, expected 8",
            bytes.len()
        ))
    })?;
    Ok(u64::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use smart_account_core::{BlockEnv, GasMeter, MemoryStore};

    fn keeper() -> SmartAccountKeeper {
        SmartAccountKeeper::new(Arc::new(AuthenticatorManager::new()))
    }

    #[test]
    fn test_counter_starts_at_one() {
        let keeper = keeper();
        let mut store = MemoryStore::new();
        let mut meter = GasMeter::infinite();
        let env = BlockEnv::default();
        let mut ctx = Context::new(&mut store, &mut meter, &env);

        assert_eq!(keeper.next_authenticator_id(&mut ctx).unwrap(), 1);
        assert!(!ctx.has(keys::next_authenticator_id_key()).unwrap());
        assert_eq!(keeper.initialize_or_get_next_authenticator_id(&mut ctx).unwrap(), 1);
        assert!(ctx.has(keys::next_authenticator_id_key()).unwrap());

        keeper.set_next_authenticator_id(&mut ctx, 42).unwrap();
        assert_eq!(keeper.initialize_or_get_next_authenticator_id(&mut ctx).unwrap(), 42);
    }

    #[test]
    fn test_params_default_then_persist() {
        let keeper = keeper();
        let mut store = MemoryStore::new();
        let mut meter = GasMeter::infinite();
        let env = BlockEnv::default();
        let mut ctx = Context::new(&mut store, &mut meter, &env);

        assert!(keeper.is_smart_account_active(&mut ctx).unwrap());
        keeper.set_active_state(&mut ctx, false).unwrap();
        assert!(!keeper.is_smart_account_active(&mut ctx).unwrap());
        assert_eq!(keeper.get_params(&mut ctx).unwrap().maximum_unauthenticated_gas, 120_000);

        let invalid = Params {
            maximum_unauthenticated_gas: 0,
            ..Params::default()
        };
        assert!(keeper.set_params(&mut ctx, &invalid).is_err());
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let keeper = keeper();
        let mut store = MemoryStore::new();
        let mut meter = GasMeter::infinite();
        let env = BlockEnv::default();
        let mut ctx = Context::new(&mut store, &mut meter, &env);
        let account = AccountAddress::new(vec![1; 20]);

        assert_matches!(
            keeper.add_authenticator(&mut ctx, &account, "Missing", b""),
            Err(SmartAccountError::TypeNotRegistered { .. })
        );
        assert_matches!(
            keeper.remove_authenticator(&mut ctx, &account, 1),
            Err(SmartAccountError::NotFound { .. })
        );
        assert_matches!(
            keeper.get_selected_authenticator_data(&mut ctx, &account, 1),
            Err(SmartAccountError::NotFound { .. })
        );
    }
}
