//! Genesis import and export

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use smart_account_core::{Context, Result, SmartAccountError};

use crate::keeper::{SmartAccountKeeper, FIRST_AUTHENTICATOR_ID};
use crate::params::Params;
use crate::types::AuthenticatorData;

/// Complete module state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    /// Module params
    pub params: Params,
    /// Value of the global id counter
    pub next_authenticator_id: u64,
    /// Every account's entries
    pub authenticator_data: Vec<AuthenticatorData>,
}

impl Default for GenesisState {
    fn default() -> Self {
        Self {
            params: Params::default(),
            next_authenticator_id: FIRST_AUTHENTICATOR_ID,
            authenticator_data: Vec::new(),
        }
    }
}

impl GenesisState {
    /// Params must be valid, ids unique and below the counter
    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;
        if self.next_authenticator_id < FIRST_AUTHENTICATOR_ID {
            return Err(SmartAccountError::malformed_request(
                "next_authenticator_id must be at least 1",
            ));
        }
        let mut seen = BTreeSet::new();
        for data in &self.authenticator_data {
            if data.address.is_empty() {
                return Err(SmartAccountError::malformed_request(
                    "genesis authenticator data has an empty address",
                ));
            }
            for entry in &data.authenticators {
                if entry.id >= self.next_authenticator_id {
                    return Err(SmartAccountError::malformed_request(format!(
                        "authenticator id {} is not below next_authenticator_id {}",
                        entry.id, self.next_authenticator_id
                    )));
                }
                if !seen.insert(entry.id) {
                    return Err(SmartAccountError::malformed_request(format!(
                        "duplicate authenticator id {}",
                        entry.id
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Write params, restore every entry under its original id, then set the counter.
pub fn init_genesis(
    keeper: &SmartAccountKeeper,
    ctx: &mut Context<'_>,
    genesis: &GenesisState,
) -> Result<()> {
    genesis.validate()?;
    keeper.set_params(ctx, &genesis.params)?;
    let mut restored = 0usize;
    for data in &genesis.authenticator_data {
        for entry in &data.authenticators {
            keeper.add_authenticator_with_id(
                ctx,
                &data.address,
                &entry.authenticator_type,
                &entry.config,
                entry.id,
            )?;
            restored += 1;
        }
    }
    keeper.set_next_authenticator_id(ctx, genesis.next_authenticator_id)?;
    info!(
        accounts = genesis.authenticator_data.len(),
        authenticators = restored,
        next_authenticator_id = genesis.next_authenticator_id,
        "Initialized smartaccount genesis"
    );
    Ok(())
}

/// Snapshot params, counter and every entry
pub fn export_genesis(keeper: &SmartAccountKeeper, ctx: &mut Context<'_>) -> Result<GenesisState> {
    Ok(GenesisState {
        params: keeper.get_params(ctx)?,
        next_authenticator_id: keeper.next_authenticator_id(ctx)?,
        authenticator_data: keeper.all_authenticator_data(ctx)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccountAuthenticator;
    use smart_account_core::AccountAddress;

    fn data(byte: u8, ids: &[u64]) -> AuthenticatorData {
        AuthenticatorData {
            address: AccountAddress::new(vec![byte; 20]),
            authenticators: ids
                .iter()
                .map(|id| AccountAuthenticator::new(*id, "SignatureVerification", vec![0; 32]))
                .collect(),
        }
    }

    #[test]
    fn test_validate() {
        GenesisState::default().validate().unwrap();

        let ok = GenesisState {
            next_authenticator_id: 4,
            authenticator_data: vec![data(1, &[1, 2]), data(2, &[3])],
            ..GenesisState::default()
        };
        ok.validate().unwrap();

        let duplicate = GenesisState {
            next_authenticator_id: 4,
            authenticator_data: vec![data(1, &[1]), data(2, &[1])],
            ..GenesisState::default()
        };
        assert!(duplicate.validate().is_err());

        let beyond_counter = GenesisState {
            next_authenticator_id: 2,
            authenticator_data: vec![data(1, &[2])],
            ..GenesisState::default()
        };
        assert!(beyond_counter.validate().is_err());
    }

    #[test]
    fn test_genesis_json_shape() {
        let genesis = GenesisState {
            next_authenticator_id: 2,
            authenticator_data: vec![data(1, &[1])],
            ..GenesisState::default()
        };
        let value = serde_json::to_value(&genesis).unwrap();
        assert_eq!(value["next_authenticator_id"], 2);
        assert_eq!(
            value["authenticator_data"][0]["authenticators"][0]["type"],
            "SignatureVerification"
        );
        assert_eq!(value["params"]["maximum_unauthenticated_gas"], 120_000);
    }
}
