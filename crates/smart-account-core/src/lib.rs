//! Smart Account Core - shared foundation
//!
//! Types every other crate in the workspace builds on:
//!
//! - [`SmartAccountError`]: the unified error type
//! - [`GasMeter`]: the consumable gas budget
//! - [`KvStore`] / [`CacheStore`]: state with discardable overlays
//! - [`Context`]: gas-metered state access for one call
//! - [`Tx`]: the transaction view read by authenticators
//! - [`effects`]: host collaborators (accounts, fees, contract runtime)

#![forbid(unsafe_code)]

/// Execution context and block environment
pub mod context;

/// Host collaborator traits
pub mod effects;

/// Serde helpers for byte fields
pub mod encoding;

/// Unified error handling
pub mod errors;

/// Gas metering
pub mod gas;

/// Addresses and composite ids
pub mod identifiers;

/// Key-value state and overlays
pub mod store;

/// Transaction view
pub mod tx;

pub use context::{BlockEnv, CacheContext, Context};
pub use effects::{AccountKeeper, BaseAccount, ContractRuntime, FeeDeductor};
pub use errors::{Result, SmartAccountError};
pub use gas::{Gas, GasMeter, KvGasConfig};
pub use identifiers::{AccountAddress, CompositeId};
pub use store::{CacheStore, KvStore, MemoryStore};
pub use tx::{Coin, Fee, LocalAny, SignatureV2, Tx, TxExtension, TxMsg};
