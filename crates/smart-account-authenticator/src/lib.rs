//! Smart Account Authenticator - pluggable authentication policies
//!
//! This crate defines the [`Authenticator`] contract every policy implements,
//! the [`AuthenticatorManager`] registry resolving type names to prototypes,
//! and the built-in policies:
//!
//! - [`SignatureVerification`]: Ed25519 signature over the sign bytes
//! - [`MessageFilter`]: JSON pattern match on the message
//! - [`AnyOf`] / [`AllOf`]: combinators, optionally with partitioned signatures
//! - [`CosmwasmAuthenticator`]: delegates every phase to a policy contract
//!
//! Requests are produced by [`generate_authentication_request`] and carry a
//! [`smart_account_core::CompositeId`] naming the node of the policy tree
//! being consulted.

#![forbid(unsafe_code)]

pub mod all_of;
pub mod any_of;
pub mod authenticator;
pub mod composite;
pub mod cosmwasm;
pub mod manager;
pub mod message_filter;
pub mod request;
pub mod signature_verification;

pub use all_of::{AllOf, ALL_OF_TYPE, PARTITIONED_ALL_OF_TYPE};
pub use any_of::{AnyOf, ANY_OF_TYPE, PARTITIONED_ANY_OF_TYPE};
pub use authenticator::{Authenticator, InitializedAuthenticator};
pub use composite::{
    encode_partitioned_signatures, encode_sub_authenticators, SignatureAssignment,
    SubAuthenticatorInitData,
};
pub use cosmwasm::{
    CosmwasmAuthenticator, CosmwasmAuthenticatorInitData, SudoMsg, COSMWASM_AUTHENTICATOR_TYPE,
};
pub use manager::{builtin_authenticators, AuthenticatorManager, DEFAULT_MAX_COMPOSITE_DEPTH};
pub use message_filter::{MessageFilter, MESSAGE_FILTER_TYPE};
pub use request::{
    generate_authentication_request, no_replay_protection, sequence_match,
    AuthenticationRequest, ConfirmExecutionRequest, ExplicitTxData, ReplayProtection,
    SignModeData, SimplifiedSignatureData, TrackRequest,
};
pub use signature_verification::{
    SignatureVerification, ED25519_VERIFY_COST, SIGNATURE_VERIFICATION_TYPE,
};
