//! Shared machinery for AnyOf / AllOf
//!
//! Combinator configuration is a JSON array of `{type, config}` entries, one
//! per child, with `config` base64-encoded. Child `k` of a node with id `P`
//! always sees id `P.k`, in every phase.

use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use smart_account_core::encoding::base64_vec;
use smart_account_core::{AccountAddress, CompositeId, Context, Gas, Result, SmartAccountError};

use crate::authenticator::Authenticator;
use crate::manager::AuthenticatorManager;
use crate::request::AuthenticationRequest;

/// How a combinator hands signatures to its children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAssignment {
    /// Every child sees the request's signature unchanged
    Single,
    /// The signature is a JSON array split one element per child
    Partitioned,
}

/// Configuration of one combinator child
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubAuthenticatorInitData {
    /// Registered type of the child
    #[serde(rename = "type")]
    pub authenticator_type: String,
    /// Child configuration bytes
    #[serde(with = "smart_account_core::encoding::base64_bytes")]
    pub config: Vec<u8>,
}

impl SubAuthenticatorInitData {
    /// Child entry for `authenticator_type` with raw `config`
    pub fn new(authenticator_type: impl Into<String>, config: impl Into<Vec<u8>>) -> Self {
        Self {
            authenticator_type: authenticator_type.into(),
            config: config.into(),
        }
    }
}

/// Encode combinator configuration from its children.
pub fn encode_sub_authenticators(children: &[SubAuthenticatorInitData]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(children)?)
}

/// Encode a partitioned signature: a JSON array with one entry per child.
pub fn encode_partitioned_signatures(signatures: &[Vec<u8>]) -> Result<Vec<u8>> {
    #[derive(Serialize)]
    struct Partitions<'a>(#[serde(with = "base64_vec")] &'a [Vec<u8>]);
    Ok(serde_json::to_vec(&Partitions(signatures))?)
}

pub(crate) fn parse_sub_authenticators(config: &[u8]) -> Result<Vec<SubAuthenticatorInitData>> {
    let children: Vec<SubAuthenticatorInitData> = serde_json::from_slice(config).map_err(|e| {
        SmartAccountError::malformed_request(format!("invalid sub-authenticator config: {e}"))
    })?;
    if children.len() < 2 {
        return Err(SmartAccountError::malformed_request(format!(
            "at least two sub-authenticators are required, got {}",
            children.len()
        )));
    }
    Ok(children)
}

pub(crate) fn upgrade(manager: &Weak<AuthenticatorManager>) -> Result<Arc<AuthenticatorManager>> {
    manager
        .upgrade()
        .ok_or_else(|| SmartAccountError::internal("authenticator manager is no longer available"))
}

fn prototype(manager: &AuthenticatorManager, type_name: &str) -> Result<Arc<dyn Authenticator>> {
    manager
        .get_authenticator_by_type(type_name)
        .ok_or_else(|| SmartAccountError::type_not_registered(type_name))
}

/// Initialize every child of a combinator sitting at nesting level `depth`.
pub(crate) fn initialize_children(
    manager: &Weak<AuthenticatorManager>,
    config: &[u8],
    depth: usize,
) -> Result<Vec<Box<dyn Authenticator>>> {
    let manager = upgrade(manager)?;
    if depth > manager.max_composite_depth() {
        return Err(SmartAccountError::malformed_request(format!(
            "composite authenticator nesting exceeds maximum depth of {}",
            manager.max_composite_depth()
        )));
    }
    parse_sub_authenticators(config)?
        .iter()
        .map(|child| {
            prototype(&manager, &child.authenticator_type)?.initialize_nested(&child.config, depth + 1)
        })
        .collect()
}

pub(crate) fn total_static_gas(children: &[Box<dyn Authenticator>]) -> Gas {
    children
        .iter()
        .fold(0, |total: Gas, child| total.saturating_add(child.static_gas()))
}

/// Per-child signatures, or `None` when children share the request signature.
pub(crate) fn partition_signatures(
    assignment: SignatureAssignment,
    request: &AuthenticationRequest,
    child_count: usize,
) -> Result<Option<Vec<Vec<u8>>>> {
    if assignment == SignatureAssignment::Single {
        return Ok(None);
    }
    #[derive(Deserialize)]
    struct Partitions(#[serde(with = "base64_vec")] Vec<Vec<u8>>);

    let Partitions(signatures) = serde_json::from_slice(&request.signature).map_err(|e| {
        SmartAccountError::malformed_request(format!("failed to unmarshal signatures: {e}"))
    })?;
    if signatures.len() != child_count {
        return Err(SmartAccountError::malformed_request(format!(
            "number of signatures ({}) does not match number of sub-authenticators ({child_count})",
            signatures.len()
        )));
    }
    Ok(Some(signatures))
}

/// Request for child `index`: composite id extended and, when partitioned,
/// the child's own signature.
pub(crate) fn child_request(
    request: &AuthenticationRequest,
    index: usize,
    signatures: Option<&[Vec<u8>]>,
) -> AuthenticationRequest {
    let mut child = request.with_authenticator_id(request.authenticator_id.child(index));
    if let Some(signatures) = signatures {
        child.signature = signatures[index].clone();
    }
    child
}

/// Run the admission hook of every child with its composite id.
pub(crate) fn on_sub_authenticators_added(
    ctx: &mut Context<'_>,
    manager: &Weak<AuthenticatorManager>,
    account: &AccountAddress,
    config: &[u8],
    authenticator_id: &CompositeId,
) -> Result<()> {
    let manager = upgrade(manager)?;
    for (index, child) in parse_sub_authenticators(config)?.iter().enumerate() {
        let sub_id = authenticator_id.child(index);
        prototype(&manager, &child.authenticator_type)?
            .on_authenticator_added(ctx, account, &child.config, &sub_id)
            .map_err(|e| e.with_context(format!("sub-authenticator {sub_id} failed to be added")))?;
    }
    Ok(())
}

/// Run the removal hook of every child with its composite id.
pub(crate) fn on_sub_authenticators_removed(
    ctx: &mut Context<'_>,
    manager: &Weak<AuthenticatorManager>,
    account: &AccountAddress,
    config: &[u8],
    authenticator_id: &CompositeId,
) -> Result<()> {
    let manager = upgrade(manager)?;
    for (index, child) in parse_sub_authenticators(config)?.iter().enumerate() {
        let sub_id = authenticator_id.child(index);
        prototype(&manager, &child.authenticator_type)?
            .on_authenticator_removed(ctx, account, &child.config, &sub_id)
            .map_err(|e| e.with_context(format!("sub-authenticator {sub_id} failed to be removed")))?;
    }
    Ok(())
}
