//! The authenticator contract
//!
//! Every policy, leaf or combinator, implements [`Authenticator`]. Registered
//! prototypes are never mutated: each use produces a fresh instance through
//! [`Authenticator::initialize`] from the stored configuration bytes.

use std::fmt;

use smart_account_core::{AccountAddress, CompositeId, Context, Gas, Result};

use crate::request::AuthenticationRequest;

/// Pluggable authentication policy.
///
/// Phase order for a message is `authenticate` (inside a discarded overlay),
/// `track` (after every message authenticated) and `confirm_execution`
/// (after the messages ran). `on_authenticator_added` and
/// `on_authenticator_removed` run when an account installs or removes the
/// authenticator and may veto the change.
pub trait Authenticator: Send + Sync {
    /// Registry key for this authenticator kind
    fn type_name(&self) -> &str;

    /// Gas charged before `authenticate` runs
    fn static_gas(&self) -> Gas;

    /// Build a fresh instance from stored configuration
    fn initialize(&self, config: &[u8]) -> Result<Box<dyn Authenticator>>;

    /// Build a fresh instance at nesting level `depth` of a combinator tree.
    ///
    /// Leaves ignore the depth.
    fn initialize_nested(&self, config: &[u8], depth: usize) -> Result<Box<dyn Authenticator>> {
        let _ = depth;
        self.initialize(config)
    }

    /// Decide whether the request is authorized. Must not persist state.
    fn authenticate(&self, ctx: &mut Context<'_>, request: &AuthenticationRequest) -> Result<()>;

    /// Bookkeeping after every message in the transaction authenticated
    fn track(&self, ctx: &mut Context<'_>, request: &AuthenticationRequest) -> Result<()>;

    /// Post-execution gate
    fn confirm_execution(
        &self,
        ctx: &mut Context<'_>,
        request: &AuthenticationRequest,
    ) -> Result<()>;

    /// Admission hook run when an account adds this authenticator
    fn on_authenticator_added(
        &self,
        ctx: &mut Context<'_>,
        account: &AccountAddress,
        config: &[u8],
        authenticator_id: &CompositeId,
    ) -> Result<()>;

    /// Removal hook run when an account removes this authenticator
    fn on_authenticator_removed(
        &self,
        ctx: &mut Context<'_>,
        account: &AccountAddress,
        config: &[u8],
        authenticator_id: &CompositeId,
    ) -> Result<()>;
}

impl fmt::Debug for dyn Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("type", &self.type_name())
            .field("static_gas", &self.static_gas())
            .finish()
    }
}

/// A stored authenticator hydrated for use
#[derive(Debug)]
pub struct InitializedAuthenticator {
    /// Stored authenticator id
    pub id: u64,
    /// Fresh instance built from the stored config
    pub authenticator: Box<dyn Authenticator>,
}

impl InitializedAuthenticator {
    /// Root composite id for this authenticator
    pub fn composite_id(&self) -> CompositeId {
        CompositeId::root(self.id)
    }
}
