//! Smart Account Keeper - persisted authenticator state
//!
//! Owns everything the module writes to the store:
//!
//! - [`SmartAccountKeeper`]: per-account entries and the global id counter
//! - [`Params`]: gas ceiling, active flag and circuit breaker controllers
//! - [`MsgServer`] / [`Querier`]: administrative messages and reads
//! - [`init_genesis`] / [`export_genesis`]: full-state import and export
//! - [`SmartAccountConfig`]: TOML/JSON module configuration

#![forbid(unsafe_code)]

pub mod config;
pub mod genesis;
pub mod keeper;
pub mod keys;
pub mod msg_server;
pub mod params;
pub mod query;
pub mod types;

pub use config::{AuthenticatorSettings, SmartAccountConfig};
pub use genesis::{export_genesis, init_genesis, GenesisState};
pub use keeper::{SmartAccountKeeper, FIRST_AUTHENTICATOR_ID};
pub use msg_server::{
    MsgAddAuthenticator, MsgAddAuthenticatorResponse, MsgRemoveAuthenticator,
    MsgRemoveAuthenticatorResponse, MsgServer, MsgSetActiveState, MsgSetActiveStateResponse,
    ValidateBasic,
};
pub use params::{Params, DEFAULT_MAXIMUM_UNAUTHENTICATED_GAS};
pub use query::{
    GetAuthenticatorRequest, GetAuthenticatorResponse, GetAuthenticatorsRequest,
    GetAuthenticatorsResponse, Querier,
};
pub use types::{AccountAuthenticator, AuthenticatorData};
