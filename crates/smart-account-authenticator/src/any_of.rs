//! AnyOf combinator: succeeds when at least one child does

use std::sync::{Arc, Weak};

use tracing::debug;

use smart_account_core::{AccountAddress, CompositeId, Context, Gas, Result, SmartAccountError};

use crate::authenticator::Authenticator;
use crate::composite::{self, SignatureAssignment};
use crate::manager::AuthenticatorManager;
use crate::request::AuthenticationRequest;

/// Registry type of [`AnyOf`] with a shared signature
pub const ANY_OF_TYPE: &str = "AnyOf";
/// Registry type of [`AnyOf`] with partitioned signatures
pub const PARTITIONED_ANY_OF_TYPE: &str = "PartitionedAnyOf";

/// Disjunction of child authenticators.
///
/// `authenticate` stops at the first child that succeeds. `track` runs every
/// child. `confirm_execution` gives each child its own overlay and commits
/// only the first one that succeeds.
pub struct AnyOf {
    manager: Weak<AuthenticatorManager>,
    sub_authenticators: Vec<Box<dyn Authenticator>>,
    signature_assignment: SignatureAssignment,
}

impl AnyOf {
    /// Prototype sharing the request signature with every child
    pub fn new(manager: &Arc<AuthenticatorManager>) -> Self {
        Self::with_assignment(manager, SignatureAssignment::Single)
    }

    /// Prototype splitting the signature between children
    pub fn partitioned(manager: &Arc<AuthenticatorManager>) -> Self {
        Self::with_assignment(manager, SignatureAssignment::Partitioned)
    }

    fn with_assignment(
        manager: &Arc<AuthenticatorManager>,
        signature_assignment: SignatureAssignment,
    ) -> Self {
        Self {
            manager: Arc::downgrade(manager),
            sub_authenticators: Vec::new(),
            signature_assignment,
        }
    }

    /// Initialized children
    pub fn sub_authenticators(&self) -> &[Box<dyn Authenticator>] {
        &self.sub_authenticators
    }

    fn ensure_children(&self) -> Result<()> {
        if self.sub_authenticators.is_empty() {
            return Err(SmartAccountError::internal("no sub-authenticators provided"));
        }
        Ok(())
    }
}

impl Authenticator for AnyOf {
    fn type_name(&self) -> &str {
        match self.signature_assignment {
            SignatureAssignment::Single => ANY_OF_TYPE,
            SignatureAssignment::Partitioned => PARTITIONED_ANY_OF_TYPE,
        }
    }

    fn static_gas(&self) -> Gas {
        composite::total_static_gas(&self.sub_authenticators)
    }

    fn initialize(&self, config: &[u8]) -> Result<Box<dyn Authenticator>> {
        self.initialize_nested(config, 1)
    }

    fn initialize_nested(&self, config: &[u8], depth: usize) -> Result<Box<dyn Authenticator>> {
        let sub_authenticators = composite::initialize_children(&self.manager, config, depth)?;
        Ok(Box::new(Self {
            manager: self.manager.clone(),
            sub_authenticators,
            signature_assignment: self.signature_assignment,
        }))
    }

    fn authenticate(&self, ctx: &mut Context<'_>, request: &AuthenticationRequest) -> Result<()> {
        self.ensure_children()?;
        let signatures = composite::partition_signatures(
            self.signature_assignment,
            request,
            self.sub_authenticators.len(),
        )?;

        let mut failures = Vec::with_capacity(self.sub_authenticators.len());
        for (index, child) in self.sub_authenticators.iter().enumerate() {
            let child_request = composite::child_request(request, index, signatures.as_deref());
            match child.authenticate(ctx, &child_request) {
                Ok(()) => {
                    debug!(authenticator_id = %child_request.authenticator_id, "AnyOf branch authenticated");
                    return Ok(());
                }
                Err(err) if err.is_out_of_gas() => return Err(err),
                Err(err) => failures.push(err.to_string()),
            }
        }
        Err(SmartAccountError::authentication_failed(format!(
            "all sub-authenticators failed to authenticate: {}",
            failures.join("; ")
        )))
    }

    fn track(&self, ctx: &mut Context<'_>, request: &AuthenticationRequest) -> Result<()> {
        self.ensure_children()?;
        let signatures = composite::partition_signatures(
            self.signature_assignment,
            request,
            self.sub_authenticators.len(),
        )?;
        for (index, child) in self.sub_authenticators.iter().enumerate() {
            let child_request = composite::child_request(request, index, signatures.as_deref());
            child.track(ctx, &child_request)?;
        }
        Ok(())
    }

    fn confirm_execution(
        &self,
        ctx: &mut Context<'_>,
        request: &AuthenticationRequest,
    ) -> Result<()> {
        self.ensure_children()?;
        let signatures = composite::partition_signatures(
            self.signature_assignment,
            request,
            self.sub_authenticators.len(),
        )?;

        let mut failures = Vec::with_capacity(self.sub_authenticators.len());
        for (index, child) in self.sub_authenticators.iter().enumerate() {
            let child_request = composite::child_request(request, index, signatures.as_deref());
            let mut branch = ctx.cache_context();
            let outcome = child.confirm_execution(&mut branch.context(), &child_request);
            match outcome {
                Ok(()) => {
                    branch.commit();
                    return Ok(());
                }
                Err(err) if err.is_out_of_gas() => return Err(err),
                Err(err) => failures.push(err.to_string()),
            }
        }
        Err(SmartAccountError::confirmation_rejected(format!(
            "all sub-authenticators failed to confirm execution: {}",
            failures.join("; ")
        )))
    }

    fn on_authenticator_added(
        &self,
        ctx: &mut Context<'_>,
        account: &AccountAddress,
        config: &[u8],
        authenticator_id: &CompositeId,
    ) -> Result<()> {
        self.initialize(config)?;
        composite::on_sub_authenticators_added(ctx, &self.manager, account, config, authenticator_id)
    }

    fn on_authenticator_removed(
        &self,
        ctx: &mut Context<'_>,
        account: &AccountAddress,
        config: &[u8],
        authenticator_id: &CompositeId,
    ) -> Result<()> {
        composite::on_sub_authenticators_removed(
            ctx,
            &self.manager,
            account,
            config,
            authenticator_id,
        )
    }
}
