//! Routing between the authenticator pipeline and the legacy pipeline

use std::sync::Arc;

use metrics::counter;
use tracing::debug;

use smart_account_core::{Context, Result, Tx};
use smart_account_keeper::SmartAccountKeeper;

use crate::handler::AnteHandler;
use crate::telemetry::LEGACY_ROUTE_COUNTER;

/// Whether `tx` should bypass the authenticator pipeline.
///
/// True when the module is inactive or the transaction carries no
/// authenticator selection. A selection whose length differs from the
/// message count still routes to the authenticator pipeline, which rejects
/// it.
pub fn is_circuit_breaker_active(
    ctx: &mut Context<'_>,
    tx: &Tx,
    keeper: &SmartAccountKeeper,
) -> Result<bool> {
    if !keeper.is_smart_account_active(ctx)? {
        return Ok(true);
    }
    Ok(tx.selected_authenticators().map_or(true, <[u64]>::is_empty))
}

/// Dispatch to one of two ante chains depending on the circuit breaker
pub struct CircuitBreakerDecorator {
    keeper: Arc<SmartAccountKeeper>,
    authenticator_handler: Arc<dyn AnteHandler>,
    legacy_handler: Arc<dyn AnteHandler>,
}

impl CircuitBreakerDecorator {
    /// Route between `authenticator_handler` and `legacy_handler`
    pub fn new(
        keeper: Arc<SmartAccountKeeper>,
        authenticator_handler: Arc<dyn AnteHandler>,
        legacy_handler: Arc<dyn AnteHandler>,
    ) -> Self {
        Self {
            keeper,
            authenticator_handler,
            legacy_handler,
        }
    }
}

impl AnteHandler for CircuitBreakerDecorator {
    fn ante_handle(&self, ctx: &mut Context<'_>, tx: &Tx, simulate: bool) -> Result<()> {
        if is_circuit_breaker_active(ctx, tx, &self.keeper)? {
            debug!(msgs = tx.msgs.len(), "Routing transaction to legacy ante handler");
            counter!(LEGACY_ROUTE_COUNTER).increment(1);
            return self.legacy_handler.ante_handle(ctx, tx, simulate);
        }
        self.authenticator_handler.ante_handle(ctx, tx, simulate)
    }
}
