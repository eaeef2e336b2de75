//! Post-execution confirmation

use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use tracing::debug;

use smart_account_authenticator::{generate_authentication_request, no_replay_protection};
use smart_account_core::{AccountKeeper, CompositeId, Context, Result, SmartAccountError, Tx};
use smart_account_keeper::SmartAccountKeeper;

use crate::ante::selected_authenticators;
use crate::circuit_breaker::is_circuit_breaker_active;
use crate::handler::PostHandler;
use crate::telemetry::POST_CONFIRM_DURATION_HISTOGRAM;

/// Runs `confirm_execution` for every message after the messages executed.
///
/// Confirmation writes go straight to the context handed in; discarding them
/// when a later message is vetoed is up to whoever owns that context.
/// Transactions routed to the legacy pipeline pass straight through.
pub struct PostAuthenticatorDecorator {
    keeper: Arc<SmartAccountKeeper>,
    account_keeper: Arc<dyn AccountKeeper>,
    next: Arc<dyn PostHandler>,
}

impl PostAuthenticatorDecorator {
    /// Decorator running `next` after every confirmation succeeds
    pub fn new(
        keeper: Arc<SmartAccountKeeper>,
        account_keeper: Arc<dyn AccountKeeper>,
        next: Arc<dyn PostHandler>,
    ) -> Self {
        Self {
            keeper,
            account_keeper,
            next,
        }
    }

    fn confirm(&self, ctx: &mut Context<'_>, tx: &Tx, simulate: bool) -> Result<()> {
        let selected = selected_authenticators(tx)?;
        let Some(fee_payer) = tx.fee_payer() else {
            return Err(SmartAccountError::malformed_request(
                "transaction has no signed messages",
            ));
        };

        for (msg_index, &authenticator_id) in selected.iter().enumerate() {
            let msg = &tx.msgs[msg_index];
            let [account] = msg.signers.as_slice() else {
                return Err(SmartAccountError::unauthorized(format!(
                    "message {msg_index} must have exactly one signer, got {}",
                    msg.signers.len()
                )));
            };

            let initialized = self
                .keeper
                .get_initialized_authenticator_for_account(ctx, account, authenticator_id)
                .map_err(|e| {
                    e.with_context(format!(
                        "failed to get initialized authenticator \
                         (account = {account}, authenticator id = {authenticator_id}, \
                         msg index = {msg_index}, msg type url = {})",
                        msg.type_url
                    ))
                })?;
            let authenticator = initialized.authenticator;

            let mut request = generate_authentication_request(
                ctx,
                self.account_keeper.as_ref(),
                account,
                &fee_payer,
                tx.fee_granter(),
                &tx.fee.amount,
                tx,
                msg_index,
                simulate,
                no_replay_protection,
            )?;
            request.authenticator_id = CompositeId::root(authenticator_id);

            authenticator
                .confirm_execution(ctx, &request)
                .map_err(|e| {
                    e.with_context(format!(
                        "authenticator failed to confirm execution for message {msg_index}, \
                         account {account}, authenticator id {authenticator_id}, type {}",
                        authenticator.type_name()
                    ))
                })?;
            debug!(%account, msg_index, authenticator_id, "Execution confirmed");
        }
        Ok(())
    }
}

impl PostHandler for PostAuthenticatorDecorator {
    fn post_handle(
        &self,
        ctx: &mut Context<'_>,
        tx: &Tx,
        simulate: bool,
        success: bool,
    ) -> Result<()> {
        if is_circuit_breaker_active(ctx, tx, &self.keeper)? {
            return self.next.post_handle(ctx, tx, simulate, success);
        }
        let started = Instant::now();
        self.confirm(ctx, tx, simulate)?;
        histogram!(POST_CONFIRM_DURATION_HISTOGRAM).record(started.elapsed().as_secs_f64());
        self.next.post_handle(ctx, tx, simulate, success)
    }
}
