//! Persisted authenticator records

use serde::{Deserialize, Serialize};

use smart_account_authenticator::{AuthenticatorManager, InitializedAuthenticator};
use smart_account_core::encoding::base64_bytes;
use smart_account_core::{AccountAddress, Result, SmartAccountError};

/// One authenticator installed on an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAuthenticator {
    /// Globally unique id
    pub id: u64,
    /// Registered authenticator type
    #[serde(rename = "type")]
    pub authenticator_type: String,
    /// Configuration bytes handed to `initialize`
    #[serde(with = "base64_bytes")]
    pub config: Vec<u8>,
}

impl AccountAuthenticator {
    /// Record for `authenticator_type` with `config`
    pub fn new(id: u64, authenticator_type: impl Into<String>, config: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            authenticator_type: authenticator_type.into(),
            config: config.into(),
        }
    }

    /// Hydrate a fresh instance through the registry
    pub fn as_initialized_authenticator(
        &self,
        manager: &AuthenticatorManager,
    ) -> Result<InitializedAuthenticator> {
        let prototype = manager
            .get_authenticator_by_type(&self.authenticator_type)
            .ok_or_else(|| SmartAccountError::type_not_registered(&self.authenticator_type))?;
        let authenticator = prototype.initialize(&self.config).map_err(|e| {
            e.with_context(format!(
                "authenticator {} with type {} failed to initialize",
                self.id, self.authenticator_type
            ))
        })?;
        Ok(InitializedAuthenticator {
            id: self.id,
            authenticator,
        })
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| {
            SmartAccountError::serialization(format!("failed to marshal account authenticator: {e}"))
        })
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| {
            SmartAccountError::serialization(format!(
                "failed to unmarshal account authenticator: {e}"
            ))
        })
    }
}

/// Every authenticator of one account, as exported in genesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatorData {
    /// Owning account
    pub address: AccountAddress,
    /// Installed authenticators in id order
    pub authenticators: Vec<AccountAuthenticator>,
}
