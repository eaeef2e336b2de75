//! AllOf combinator: every child must succeed

use std::sync::{Arc, Weak};

use smart_account_core::{AccountAddress, CompositeId, Context, Gas, Result, SmartAccountError};

use crate::authenticator::Authenticator;
use crate::composite::{self, SignatureAssignment};
use crate::manager::AuthenticatorManager;
use crate::request::AuthenticationRequest;

/// Registry type of [`AllOf`] with a shared signature
pub const ALL_OF_TYPE: &str = "AllOf";
/// Registry type of [`AllOf`] with partitioned signatures
pub const PARTITIONED_ALL_OF_TYPE: &str = "PartitionedAllOf";

/// Conjunction of child authenticators.
///
/// Each phase aborts on the first failing child. Children run directly
/// against the caller's context; branch isolation is only introduced by
/// [`crate::AnyOf`].
pub struct AllOf {
    manager: Weak<AuthenticatorManager>,
    sub_authenticators: Vec<Box<dyn Authenticator>>,
    signature_assignment: SignatureAssignment,
}

impl AllOf {
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

    fn for_each_child(
        &self,
        request: &AuthenticationRequest,
        mut phase: impl FnMut(&dyn Authenticator, &AuthenticationRequest) -> Result<()>,
    ) -> Result<()> {
        if self.sub_authenticators.is_empty() {
            return Err(SmartAccountError::internal("no sub-authenticators provided"));
        }
        let signatures = composite::partition_signatures(
            self.signature_assignment,
            request,
            self.sub_authenticators.len(),
        )?;
        for (index, child) in self.sub_authenticators.iter().enumerate() {
            let child_request = composite::child_request(request, index, signatures.as_deref());
            phase(child.as_ref(), &child_request)?;
        }
        Ok(())
    }
}

impl Authenticator for AllOf {
    fn type_name(&self) -> &str {
        match self.signature_assignment {
            SignatureAssignment::Single => ALL_OF_TYPE,
            SignatureAssignment::Partitioned => PARTITIONED_ALL_OF_TYPE,
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
        self.for_each_child(request, |child, child_request| {
            child.authenticate(ctx, child_request)
        })
    }

    fn track(&self, ctx: &mut Context<'_>, request: &AuthenticationRequest) -> Result<()> {
        self.for_each_child(request, |child, child_request| {
            child.track(ctx, child_request)
        })
    }

    fn confirm_execution(
        &self,
        ctx: &mut Context<'_>,
        request: &AuthenticationRequest,
    ) -> Result<()> {
        self.for_each_child(request, |child, child_request| {
            child.confirm_execution(ctx, child_request)
        })
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
