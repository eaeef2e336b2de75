//! Collaborator interfaces supplied by the host
//!
//! Account lookup, fee deduction and the external contract runtime live
//! outside this workspace. The pipeline only depends on these traits.

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::errors::Result;
use crate::identifiers::AccountAddress;
use crate::tx::Tx;

/// On-chain account record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseAccount {
    /// Account address
    pub address: AccountAddress,
    /// Globally assigned account number
    pub account_number: u64,
    /// Replay-protection sequence
    pub sequence: u64,
    /// Registered public key, if any
    pub pub_key: Option<Vec<u8>>,
}

/// Account/identity lookup
pub trait AccountKeeper: Send + Sync {
    /// Load an account, `None` when it does not exist
    fn get_account(
        &self,
        ctx: &mut Context<'_>,
        address: &AccountAddress,
    ) -> Result<Option<BaseAccount>>;
}

/// Fee deduction routine
pub trait FeeDeductor: Send + Sync {
    /// Deduct the transaction fee from the payer (or granter)
    fn deduct_fee(&self, ctx: &mut Context<'_>, tx: &Tx, simulate: bool) -> Result<()>;
}

/// Sandboxed contract runtime used by external-policy authenticators
pub trait ContractRuntime: Send + Sync {
    /// Whether a contract is deployed at `contract`
    fn has_contract(&self, ctx: &mut Context<'_>, contract: &AccountAddress) -> Result<bool>;

    /// Execute a privileged call with a serialized envelope
    fn sudo(
        &self,
        ctx: &mut Context<'_>,
        contract: &AccountAddress,
        msg: &[u8],
    ) -> Result<Vec<u8>>;
}
