//! Handler chain plumbing
//!
//! Pre-execution and post-execution stages are chained explicitly: each
//! decorator holds the handler that runs after it. [`Terminator`] ends a
//! chain. Plain closures work as ante handlers.

use smart_account_core::{Context, Result, Tx};

/// Pre-execution stage
pub trait AnteHandler: Send + Sync {
    /// Run the stage, then the rest of the chain
    fn ante_handle(&self, ctx: &mut Context<'_>, tx: &Tx, simulate: bool) -> Result<()>;
}

/// Post-execution stage
pub trait PostHandler: Send + Sync {
    /// Run the stage after messages executed; `success` reports their outcome
    fn post_handle(&self, ctx: &mut Context<'_>, tx: &Tx, simulate: bool, success: bool)
        -> Result<()>;
}

impl<F> AnteHandler for F
where
    F: Fn(&mut Context<'_>, &Tx, bool) -> Result<()> + Send + Sync,
{
    fn ante_handle(&self, ctx: &mut Context<'_>, tx: &Tx, simulate: bool) -> Result<()> {
        self(ctx, tx, simulate)
    }
}

/// End of a handler chain
#[derive(Debug, Clone, Copy, Default)]
pub struct Terminator;

impl AnteHandler for Terminator {
    fn ante_handle(&self, _ctx: &mut Context<'_>, _tx: &Tx, _simulate: bool) -> Result<()> {
        Ok(())
    }
}

impl PostHandler for Terminator {
    fn post_handle(
        &self,
        _ctx: &mut Context<'_>,
        _tx: &Tx,
        _simulate: bool,
        _success: bool,
    ) -> Result<()> {
        Ok(())
    }
}
