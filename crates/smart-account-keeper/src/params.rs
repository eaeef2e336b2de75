//! Module parameters

use serde::{Deserialize, Serialize};

use smart_account_core::{AccountAddress, Gas, Result, SmartAccountError};

/// Default gas ceiling before the fee payer is authenticated
pub const DEFAULT_MAXIMUM_UNAUTHENTICATED_GAS: Gas = 120_000;

/// Governance-controlled module parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Gas ceiling in force until the fee payer is authenticated
    pub maximum_unauthenticated_gas: Gas,
    /// Whether the authenticator pipeline is enabled
    pub is_smart_account_active: bool,
    /// Accounts allowed to deactivate the pipeline
    pub circuit_breaker_controllers: Vec<AccountAddress>,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            maximum_unauthenticated_gas: DEFAULT_MAXIMUM_UNAUTHENTICATED_GAS,
            is_smart_account_active: true,
            circuit_breaker_controllers: Vec::new(),
        }
    }
}

impl Params {
    /// Reject unusable parameter sets
    pub fn validate(&self) -> Result<()> {
        if self.maximum_unauthenticated_gas == 0 {
            return Err(SmartAccountError::malformed_request(
                "maximum_unauthenticated_gas must be positive",
            ));
        }
        for (index, controller) in self.circuit_breaker_controllers.iter().enumerate() {
            if controller.is_empty() {
                return Err(SmartAccountError::malformed_request(
                    "circuit breaker controller address is empty",
                ));
            }
            if self.circuit_breaker_controllers[..index].contains(controller) {
                return Err(SmartAccountError::malformed_request(format!(
                    "duplicate circuit breaker controller {controller}"
                )));
            }
        }
        Ok(())
    }

    /// Whether `address` may trip the circuit breaker
    pub fn is_circuit_breaker_controller(&self, address: &AccountAddress) -> bool {
        self.circuit_breaker_controllers.contains(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_defaults_are_valid() {
        let params = Params::default();
        assert_eq!(params.maximum_unauthenticated_gas, 120_000);
        assert!(params.is_smart_account_active);
        params.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_zero_gas_and_duplicates() {
        let zero = Params {
            maximum_unauthenticated_gas: 0,
            ..Params::default()
        };
        assert_matches!(zero.validate(), Err(SmartAccountError::MalformedRequest { .. }));

        let controller = AccountAddress::new(vec![3; 20]);
        let duplicated = Params {
            circuit_breaker_controllers: vec![controller.clone(), controller],
            ..Params::default()
        };
        assert!(duplicated.validate().is_err());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let params: Params = serde_json::from_str(r#"{"is_smart_account_active": false}"#).unwrap();
        assert_eq!(params.maximum_unauthenticated_gas, DEFAULT_MAXIMUM_UNAUTHENTICATED_GAS);
        assert!(!params.is_smart_account_active);
    }
}
