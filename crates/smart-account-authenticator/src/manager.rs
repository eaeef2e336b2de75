//! Authenticator registry
//!
//! Maps a type name to a prototype. Written at startup and read on the
//! request path; enumeration is always in sorted type order.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use smart_account_core::ContractRuntime;

use crate::all_of::AllOf;
use crate::any_of::AnyOf;
use crate::authenticator::Authenticator;
use crate::cosmwasm::CosmwasmAuthenticator;
use crate::message_filter::MessageFilter;
use crate::signature_verification::SignatureVerification;

/// Default limit on combinator nesting
pub const DEFAULT_MAX_COMPOSITE_DEPTH: usize = 8;

/// Registry of authenticator prototypes keyed by type name
pub struct AuthenticatorManager {
    registered: RwLock<BTreeMap<String, Arc<dyn Authenticator>>>,
    max_composite_depth: usize,
}

impl AuthenticatorManager {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            registered: RwLock::new(BTreeMap::new()),
            max_composite_depth: DEFAULT_MAX_COMPOSITE_DEPTH,
        }
    }

    /// Set the combinator nesting limit
    pub fn with_max_composite_depth(mut self, depth: usize) -> Self {
        self.max_composite_depth = depth;
        self
    }

    /// Deepest combinator nesting accepted by `initialize` and admission
    pub fn max_composite_depth(&self) -> usize {
        self.max_composite_depth
    }

    /// Register every authenticator unless the registry is already populated.
    pub fn initialize_authenticators(&self, authenticators: Vec<Arc<dyn Authenticator>>) {
        let mut registered = self.registered.write();
        if !registered.is_empty() {
            return;
        }
        for authenticator in authenticators {
            registered.insert(authenticator.type_name().to_string(), authenticator);
        }
        debug!(count = registered.len(), "Initialized authenticator registry");
    }

    /// Insert or replace the prototype for its type
    pub fn register_authenticator(&self, authenticator: Arc<dyn Authenticator>) {
        let type_name = authenticator.type_name().to_string();
        debug!(authenticator_type = %type_name, "Registering authenticator");
        self.registered.write().insert(type_name, authenticator);
    }

    /// Remove a type, returning whether it was present
    pub fn unregister_authenticator(&self, type_name: &str) -> bool {
        self.registered.write().remove(type_name).is_some()
    }

    /// Clear the registry
    pub fn reset_authenticators(&self) {
        self.registered.write().clear();
    }

    /// Prototype for `type_name`
    pub fn get_authenticator_by_type(&self, type_name: &str) -> Option<Arc<dyn Authenticator>> {
        self.registered.read().get(type_name).cloned()
    }

    /// Whether `type_name` is registered
    pub fn is_authenticator_type_registered(&self, type_name: &str) -> bool {
        self.registered.read().contains_key(type_name)
    }

    /// All prototypes in sorted type order
    pub fn registered_authenticators(&self) -> Vec<Arc<dyn Authenticator>> {
        self.registered.read().values().cloned().collect()
    }

    /// Registered type names, sorted
    pub fn registered_types(&self) -> Vec<String> {
        self.registered.read().keys().cloned().collect()
    }
}

impl Default for AuthenticatorManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AuthenticatorManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatorManager")
            .field("registered", &self.registered_types())
            .field("max_composite_depth", &self.max_composite_depth)
            .finish()
    }
}

/// The built-in authenticator set.
///
/// Combinators hold a weak handle back to `manager` to resolve child types.
pub fn builtin_authenticators(
    manager: &Arc<AuthenticatorManager>,
    runtime: Arc<dyn ContractRuntime>,
) -> Vec<Arc<dyn Authenticator>> {
    vec![
        Arc::new(SignatureVerification::new()),
        Arc::new(MessageFilter::new()),
        Arc::new(AnyOf::new(manager)),
        Arc::new(AllOf::new(manager)),
        Arc::new(AnyOf::partitioned(manager)),
        Arc::new(AllOf::partitioned(manager)),
        Arc::new(CosmwasmAuthenticator::new(runtime)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use smart_account_core::{AccountAddress, CompositeId, Context, Gas, Result};

    use crate::request::AuthenticationRequest;

    struct Named(&'static str);

    impl Authenticator for Named {
        fn type_name(&self) -> &str {
            self.0
        }
        fn static_gas(&self) -> Gas {
            0
        }
        fn initialize(&self, _config: &[u8]) -> Result<Box<dyn Authenticator>> {
            Ok(Box::new(Named(self.0)))
        }
        fn authenticate(&self, _: &mut Context<'_>, _: &AuthenticationRequest) -> Result<()> {
            Ok(())
        }
        fn track(&self, _: &mut Context<'_>, _: &AuthenticationRequest) -> Result<()> {
            Ok(())
        }
        fn confirm_execution(&self, _: &mut Context<'_>, _: &AuthenticationRequest) -> Result<()> {
            Ok(())
        }
        fn on_authenticator_added(
            &self,
            _: &mut Context<'_>,
            _: &AccountAddress,
            _: &[u8],
            _: &CompositeId,
        ) -> Result<()> {
            Ok(())
        }
        fn on_authenticator_removed(
            &self,
            _: &mut Context<'_>,
            _: &AccountAddress,
            _: &[u8],
            _: &CompositeId,
        ) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_registration_is_sorted() {
        let manager = AuthenticatorManager::new();
        manager.register_authenticator(Arc::new(Named("Zeta")));
        manager.register_authenticator(Arc::new(Named("Alpha")));
        manager.register_authenticator(Arc::new(Named("Mid")));
        assert_eq!(manager.registered_types(), vec!["Alpha", "Mid", "Zeta"]);
        let types: Vec<String> = manager
            .registered_authenticators()
            .iter()
            .map(|a| a.type_name().to_string())
            .collect();
        assert_eq!(types, vec!["Alpha", "Mid", "Zeta"]);
    }

    #[test]
    fn test_register_replaces_existing_type() {
        let manager = AuthenticatorManager::new();
        manager.register_authenticator(Arc::new(Named("Alpha")));
        manager.register_authenticator(Arc::new(Named("Alpha")));
        assert_eq!(manager.registered_types().len(), 1);
    }

    #[test]
    fn test_lookup_and_unregister() {
        let manager = AuthenticatorManager::new();
        assert!(manager.get_authenticator_by_type("Alpha").is_none());
        manager.register_authenticator(Arc::new(Named("Alpha")));
        assert!(manager.is_authenticator_type_registered("Alpha"));
        assert!(manager.unregister_authenticator("Alpha"));
        assert!(!manager.unregister_authenticator("Alpha"));
        assert!(manager.get_authenticator_by_type("Alpha").is_none());
    }

    #[test]
    fn test_bulk_initialize_is_noop_when_populated() {
        let manager = AuthenticatorManager::new();
        manager.initialize_authenticators(vec![Arc::new(Named("A")), Arc::new(Named("B"))]);
        manager.initialize_authenticators(vec![Arc::new(Named("C"))]);
        assert_eq!(manager.registered_types(), vec!["A", "B"]);

        manager.reset_authenticators();
        assert!(manager.registered_types().is_empty());
        manager.initialize_authenticators(vec![Arc::new(Named("C"))]);
        assert_eq!(manager.registered_types(), vec!["C"]);
    }
}
