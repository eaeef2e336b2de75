//! Pre-execution authentication
//!
//! [`AuthenticatorDecorator`] authenticates every message of a transaction
//! with the authenticator its signer selected. Until the fee payer has been
//! authenticated and charged, all work runs under a small gas ceiling taken
//! from [`Params::maximum_unauthenticated_gas`]; exceeding it is reported as
//! `ResourceExhausted` instead of `OutOfGas`.
//!
//! [`Params::maximum_unauthenticated_gas`]: smart_account_keeper::Params

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, warn};

use smart_account_authenticator::{
    generate_authentication_request, sequence_match, AuthenticationRequest, Authenticator,
};
use smart_account_core::{
    AccountAddress, AccountKeeper, CompositeId, Context, FeeDeductor, GasMeter, Result,
    SmartAccountError, Tx,
};
use smart_account_keeper::SmartAccountKeeper;

use crate::handler::AnteHandler;
use crate::telemetry::{
    AUTHENTICATE_DURATION_HISTOGRAM, RESOURCE_EXHAUSTED_COUNTER, TRACK_FAILED_COUNTER,
};

/// Gas descriptor for an authenticator's fixed cost
pub const STATIC_GAS_DESCRIPTOR: &str = "authenticator static gas";

/// Gas descriptor for the bounded-meter consumption moved onto the real meter
pub const FEE_PAYER_GAS_DESCRIPTOR: &str = "fee payer gas";

/// An authenticated message whose `track` call is deferred
struct PendingTrack {
    msg_index: usize,
    account: AccountAddress,
    authenticator_id: u64,
    authenticator: Box<dyn Authenticator>,
    request: AuthenticationRequest,
}

/// Authenticates each message with its selected authenticator, deducts the
/// fee once the fee payer is authenticated, then runs the deferred `track`
/// calls.
pub struct AuthenticatorDecorator {
    keeper: Arc<SmartAccountKeeper>,
    account_keeper: Arc<dyn AccountKeeper>,
    fee_deductor: Arc<dyn FeeDeductor>,
    next: Arc<dyn AnteHandler>,
}

impl AuthenticatorDecorator {
    /// Decorator running `next` after authentication succeeds
    pub fn new(
        keeper: Arc<SmartAccountKeeper>,
        account_keeper: Arc<dyn AccountKeeper>,
        fee_deductor: Arc<dyn FeeDeductor>,
        next: Arc<dyn AnteHandler>,
    ) -> Self {
        Self {
            keeper,
            account_keeper,
            fee_deductor,
            next,
        }
    }

    fn authenticate(&self, ctx: &mut Context<'_>, tx: &Tx, simulate: bool) -> Result<()> {
        let fee_payer = validate_fee_payer(tx)?;
        let selected = selected_authenticators(tx)?;

        let params = self.keeper.get_params(ctx)?;
        let ceiling = params.maximum_unauthenticated_gas;
        let mut payer_meter = GasMeter::new(ceiling);
        let mut fees_paid = false;
        let mut pending = Vec::with_capacity(tx.msgs.len());

        for (msg_index, &authenticator_id) in selected.iter().enumerate() {
            let outcome = if fees_paid {
                self.authenticate_message(ctx, tx, simulate, msg_index, authenticator_id, &fee_payer)
            } else {
                let mut limited = ctx.with_gas_meter(&mut payer_meter);
                self.authenticate_message(
                    &mut limited,
                    tx,
                    simulate,
                    msg_index,
                    authenticator_id,
                    &fee_payer,
                )
            };
            let authenticated = match outcome {
                Err(e) if e.is_out_of_gas() && !fees_paid => {
                    counter!(RESOURCE_EXHAUSTED_COUNTER).increment(1);
                    warn!(
                        msg_index,
                        limit = ceiling,
                        consumed = payer_meter.gas_consumed(),
                        "Unauthenticated gas ceiling exceeded before fee payer was authenticated"
                    );
                    return Err(SmartAccountError::resource_exhausted(
                        ceiling,
                        payer_meter.gas_consumed(),
                    ));
                }
                other => other?,
            };

            if !fees_paid && authenticated.account == fee_payer {
                ctx.consume_gas(payer_meter.gas_consumed(), FEE_PAYER_GAS_DESCRIPTOR)?;
                // Persists even if a later message fails authentication.
                let mut fee_cache = ctx.cache_context();
                self.fee_deductor
                    .deduct_fee(&mut fee_cache.context(), tx, simulate)?;
                fee_cache.commit();
                fees_paid = true;
                debug!(fee_payer = %fee_payer, msg_index, "Fee payer authenticated and charged");
            }

            pending.push(authenticated);
        }

        for track in &pending {
            run_track(ctx, track)?;
        }
        Ok(())
    }

    fn authenticate_message(
        &self,
        ctx: &mut Context<'_>,
        tx: &Tx,
        simulate: bool,
        msg_index: usize,
        authenticator_id: u64,
        fee_payer: &AccountAddress,
    ) -> Result<PendingTrack> {
        let msg = &tx.msgs[msg_index];
        if msg.signers.len() != 1 {
            return Err(SmartAccountError::unauthorized(format!(
                "message {msg_index} must have exactly one signer, got {}",
                msg.signers.len()
            )));
        }
        let account = msg.signers[0].clone();

        let initialized = self
            .keeper
            .get_initialized_authenticator_for_account(ctx, &account, authenticator_id)
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
            &account,
            fee_payer,
            tx.fee_granter(),
            &tx.fee.amount,
            tx,
            msg_index,
            simulate,
            sequence_match,
        )
        .map_err(|e| {
            e.with_context(format!(
                "failed to generate authentication data \
                 (account = {account}, authenticator id = {authenticator_id}, \
                 msg index = {msg_index}, msg type url = {})",
                msg.type_url
            ))
        })?;
        request.authenticator_id = CompositeId::root(authenticator_id);

        ctx.consume_gas(authenticator.static_gas(), STATIC_GAS_DESCRIPTOR)?;

        {
            let mut scratch = ctx.cache_context();
            authenticator
                .authenticate(&mut scratch.context(), &request)
                .map_err(|e| {
                    e.with_context(format!(
                        "authentication failed for message {msg_index}, \
                         authenticator id {authenticator_id}, type {}",
                        authenticator.type_name()
                    ))
                })?;
        }
        debug!(
            %account,
            msg_index,
            authenticator_id,
            authenticator_type = authenticator.type_name(),
            "Message authenticated"
        );

        Ok(PendingTrack {
            msg_index,
            account,
            authenticator_id,
            authenticator,
            request,
        })
    }
}

impl AnteHandler for AuthenticatorDecorator {
    fn ante_handle(&self, ctx: &mut Context<'_>, tx: &Tx, simulate: bool) -> Result<()> {
        let started = Instant::now();
        self.authenticate(ctx, tx, simulate)?;
        histogram!(AUTHENTICATE_DURATION_HISTOGRAM).record(started.elapsed().as_secs_f64());
        self.next.ante_handle(ctx, tx, simulate)
    }
}

/// The fee payer must be the first signer of the first message.
fn validate_fee_payer(tx: &Tx) -> Result<AccountAddress> {
    let first_signer = tx
        .msgs
        .first()
        .and_then(|msg| msg.signers.first())
        .ok_or_else(|| {
            SmartAccountError::malformed_request("transaction has no signed messages")
        })?;
    match tx.fee_payer() {
        Some(payer) if &payer == first_signer => Ok(payer),
        _ => Err(SmartAccountError::unauthorized(
            "fee payer must be the first signer",
        )),
    }
}

/// One selected id per message, or `SelectionMismatch`
pub(crate) fn selected_authenticators(tx: &Tx) -> Result<&[u64]> {
    let selected = tx.selected_authenticators().unwrap_or_default();
    if selected.len() != tx.msgs.len() {
        return Err(SmartAccountError::selection_mismatch(format!(
            "Mismatch between the number of selected authenticators and messages, \
             msg count {}, got {} selected authenticators",
            tx.msgs.len(),
            selected.len()
        )));
    }
    Ok(selected)
}

/// Run one deferred `track` in its own overlay.
///
/// Failures are logged and counted, and their writes dropped; only gas
/// exhaustion propagates.
fn run_track(ctx: &mut Context<'_>, track: &PendingTrack) -> Result<()> {
    let mut cache = ctx.cache_context();
    let outcome = track
        .authenticator
        .track(&mut cache.context(), &track.request);
    match outcome {
        Ok(()) => {
            cache.commit();
            Ok(())
        }
        Err(e) if e.is_out_of_gas() => Err(e),
        Err(e) => {
            counter!(TRACK_FAILED_COUNTER).increment(1);
            warn!(
                account = %track.account,
                msg_index = track.msg_index,
                authenticator_id = track.authenticator_id,
                authenticator_type = track.authenticator.type_name(),
                error = %e,
                "Authenticator track failed"
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use smart_account_core::{TxExtension, TxMsg};

    fn addr(byte: u8) -> AccountAddress {
        AccountAddress::new(vec![byte; 20])
    }

    fn tx(signers: &[u8], selected: Option<Vec<u64>>) -> Tx {
        Tx {
            msgs: signers
                .iter()
                .map(|s| TxMsg::new("/test.Msg", &json!({}), addr(*s)).unwrap())
                .collect(),
            extension: selected.map(|selected_authenticators| TxExtension {
                selected_authenticators,
            }),
            ..Tx::default()
        }
    }

    #[test]
    fn test_fee_payer_must_be_first_signer() {
        let mut custom = tx(&[1, 2], Some(vec![1, 2]));
        assert_eq!(validate_fee_payer(&custom).unwrap(), addr(1));

        custom.fee.payer = Some(addr(2));
        assert_matches!(
            validate_fee_payer(&custom),
            Err(SmartAccountError::Unauthorized { .. })
        );

        assert_matches!(
            validate_fee_payer(&Tx::default()),
            Err(SmartAccountError::MalformedRequest { .. })
        );
    }

    #[test]
    fn test_selection_count_must_match_messages() {
        assert_eq!(
            selected_authenticators(&tx(&[1, 2], Some(vec![4, 5]))).unwrap(),
            &[4, 5]
        );
        let err = selected_authenticators(&tx(&[1, 2], Some(vec![4]))).unwrap_err();
        assert_matches!(err, SmartAccountError::SelectionMismatch { .. });
        assert!(err.to_string().contains("msg count 2, got 1"));
        assert_matches!(
            selected_authenticators(&tx(&[1], None)),
            Err(SmartAccountError::SelectionMismatch { .. })
        );
    }
}
