//! End-to-end runs of the ante and post chains over a [`TestApp`]

use assert_matches::assert_matches;
use proptest::prelude::*;

use smart_account_authenticator::{
    encode_sub_authenticators, Authenticator, SubAuthenticatorInitData, ANY_OF_TYPE,
    SIGNATURE_VERIFICATION_TYPE,
};
use smart_account_core::{CompositeId, SmartAccountError};
use smart_account_keeper::{Params, DEFAULT_MAXIMUM_UNAUTHENTICATED_GAS};
use smart_account_testkit::builders::DEFAULT_FEE_AMOUNT;
use smart_account_testkit::*;

const FUNDS: u64 = 1_000_000;

#[test]
fn test_fee_payer_authenticated_under_ceiling_then_lifted() {
    init_test_tracing();
    let mut app = TestApp::new();
    let alice = app.create_account(1, FUNDS);
    let bob = app.create_account(2, FUNDS);

    let cheap = TestingAuthenticator::approving(10_000);
    let costly = TestingAuthenticator::approving(500_000);
    app.register(cheap.clone());
    app.register(costly.clone());

    let alice_cheap = app
        .add_authenticator(&alice.address(), cheap.type_name(), &[])
        .unwrap();
    let alice_costly = app
        .add_authenticator(&alice.address(), costly.type_name(), &[])
        .unwrap();
    let bob_costly = app
        .add_authenticator(&bob.address(), costly.type_name(), &[])
        .unwrap();

    // The fee payer cannot spend more than the ceiling before paying.
    let tx = app
        .tx_builder()
        .msg(alice.send_msg(1))
        .select(vec![alice_costly])
        .build(&[&alice]);
    let err = app.deliver_tx(&tx).unwrap_err();
    assert_matches!(
        err,
        SmartAccountError::ResourceExhausted { limit, consumed }
            if limit == DEFAULT_MAXIMUM_UNAUTHENTICATED_GAS && consumed > limit
    );
    // The failed charge is still reported in full.
    assert_matches!(err, SmartAccountError::ResourceExhausted { consumed, .. } if consumed >= 500_000);
    assert_eq!(app.balance(&alice.address()), FUNDS);

    // Once the fee payer has paid, later messages use the full budget.
    let tx = app
        .tx_builder()
        .msg(alice.send_msg(1))
        .msg(bob.send_msg(1))
        .select(vec![alice_cheap, bob_costly])
        .build(&[&alice, &bob]);
    app.deliver_tx(&tx).unwrap();
    assert_eq!(app.balance(&alice.address()), FUNDS - DEFAULT_FEE_AMOUNT);
    assert_eq!(app.balance(&bob.address()), FUNDS);
}

#[test]
fn test_lowered_ceiling_rejects_cheap_fee_payer() {
    let mut app = TestApp::new();
    let alice = app.create_account(1, FUNDS);
    let cheap = TestingAuthenticator::approving(10_000);
    app.register(cheap.clone());
    let id = app
        .add_authenticator(&alice.address(), cheap.type_name(), &[])
        .unwrap();

    let params = Params {
        maximum_unauthenticated_gas: 5_000,
        ..app.params()
    };
    app.set_params(&params);

    let tx = app
        .tx_builder()
        .msg(alice.send_msg(1))
        .select(vec![id])
        .build(&[&alice]);
    assert_matches!(
        app.deliver_tx(&tx),
        Err(SmartAccountError::ResourceExhausted { limit: 5_000, .. })
    );
}

#[test]
fn test_fee_deducted_once_for_repeated_fee_payer() {
    let mut app = TestApp::new();
    let alice = app.create_account(1, FUNDS);
    let approve = TestingAuthenticator::approving(0);
    app.register(approve.clone());
    let id = app
        .add_authenticator(&alice.address(), approve.type_name(), &[])
        .unwrap();

    let tx = app
        .tx_builder()
        .msg(alice.send_msg(1))
        .msg(alice.send_msg(2))
        .msg(alice.send_msg(3))
        .select(vec![id, id, id])
        .build(&[&alice]);
    app.deliver_tx(&tx).unwrap();
    assert_eq!(app.balance(&alice.address()), FUNDS - DEFAULT_FEE_AMOUNT);
}

#[test]
fn test_fee_payer_cannot_afford_fee() {
    let mut app = TestApp::new();
    let alice = app.create_account(1, DEFAULT_FEE_AMOUNT - 1);
    let approve = TestingAuthenticator::approving(0);
    app.register(approve.clone());
    let id = app
        .add_authenticator(&alice.address(), approve.type_name(), &[])
        .unwrap();

    let tx = app
        .tx_builder()
        .msg(alice.send_msg(1))
        .select(vec![id])
        .build(&[&alice]);
    assert!(app.deliver_tx(&tx).is_err());
    assert_eq!(app.balance(&alice.address()), DEFAULT_FEE_AMOUNT - 1);
}

#[test]
fn test_rejected_authentication_charges_nothing() {
    let mut app = TestApp::new();
    let alice = app.create_account(1, FUNDS);
    let reject = TestingAuthenticator::rejecting(0);
    app.register(reject.clone());
    let id = app
        .add_authenticator(&alice.address(), reject.type_name(), &[])
        .unwrap();

    let tx = app
        .tx_builder()
        .msg(alice.send_msg(1))
        .select(vec![id])
        .build(&[&alice]);
    let err = app.deliver_tx(&tx).unwrap_err();
    assert_matches!(err, SmartAccountError::AuthenticationFailed { .. });
    assert!(err.to_string().contains("authentication failed for message 0"));
    assert_eq!(app.balance(&alice.address()), FUNDS);
}

#[test]
fn test_fee_survives_later_authentication_failure() {
    let mut app = TestApp::new();
    let alice = app.create_account(1, FUNDS);
    let bob = app.create_account(2, FUNDS);
    let approve = TestingAuthenticator::approving(0);
    let reject = TestingAuthenticator::rejecting(0);
    app.register(approve.clone());
    app.register(reject.clone());
    let alice_id = app
        .add_authenticator(&alice.address(), approve.type_name(), &[])
        .unwrap();
    let bob_id = app
        .add_authenticator(&bob.address(), reject.type_name(), &[])
        .unwrap();

    let tx = app
        .tx_builder()
        .msg(alice.send_msg(1))
        .msg(bob.send_msg(1))
        .select(vec![alice_id, bob_id])
        .build(&[&alice, &bob]);
    let err = app.deliver_tx(&tx).unwrap_err();
    assert_matches!(err, SmartAccountError::AuthenticationFailed { .. });
    assert!(err.to_string().contains("authentication failed for message 1"));

    // Alice was authenticated and charged before bob's message failed.
    assert_eq!(app.balance(&alice.address()), FUNDS - DEFAULT_FEE_AMOUNT);
    assert_eq!(app.balance(&bob.address()), FUNDS);
}

#[test]
fn test_selection_must_cover_every_message() {
    let mut app = TestApp::new();
    let alice = app.create_account(1, FUNDS);
    let approve = TestingAuthenticator::approving(0);
    app.register(approve.clone());
    let id = app
        .add_authenticator(&alice.address(), approve.type_name(), &[])
        .unwrap();

    let tx = app
        .tx_builder()
        .msg(alice.send_msg(1))
        .msg(alice.send_msg(2))
        .select(vec![id])
        .build(&[&alice]);
    assert_matches!(
        app.deliver_tx(&tx),
        Err(SmartAccountError::SelectionMismatch { .. })
    );
}

#[test]
fn test_custom_fee_payer_rejected() {
    let mut app = TestApp::new();
    let alice = app.create_account(1, FUNDS);
    let bob = app.create_account(2, FUNDS);
    let approve = TestingAuthenticator::approving(0);
    app.register(approve.clone());
    let id = app
        .add_authenticator(&alice.address(), approve.type_name(), &[])
        .unwrap();

    let tx = app
        .tx_builder()
        .msg(alice.send_msg(1))
        .fee_payer(bob.address())
        .select(vec![id])
        .build(&[&alice]);
    assert_matches!(
        app.deliver_tx(&tx),
        Err(SmartAccountError::Unauthorized { .. })
    );
}

#[test]
fn test_unknown_authenticator_id() {
    let mut app = TestApp::new();
    let alice = app.create_account(1, FUNDS);
    let tx = app
        .tx_builder()
        .msg(alice.send_msg(1))
        .select(vec![42])
        .build(&[&alice]);
    let err = app.deliver_tx(&tx).unwrap_err();
    assert_matches!(err, SmartAccountError::NotFound { .. });
    assert!(err.to_string().contains("authenticator id = 42"));
}

#[test]
fn test_signature_verification_and_replay() {
    let mut app = TestApp::new();
    let alice = app.create_account(1, FUNDS);
    let mallory = TestAccount::from_seed(66);
    let id = app
        .add_authenticator(
            &alice.address(),
            SIGNATURE_VERIFICATION_TYPE,
            &alice.public_key_bytes(),
        )
        .unwrap();

    let builder = app.tx_builder().msg(alice.send_msg(1)).select(vec![id]);

    let mut forged = builder.build(&[&alice]);
    forged.signatures[0].signature = mallory.sign(&builder.sign_bytes(&forged, &alice.address()));
    assert_matches!(
        app.deliver_tx(&forged),
        Err(SmartAccountError::AuthenticationFailed { .. })
    );

    let tx = builder.build(&[&alice]);
    app.deliver_tx(&tx).unwrap();

    // The sequence moved on, so the same bytes cannot be replayed.
    assert_matches!(
        app.deliver_tx(&tx),
        Err(SmartAccountError::Unauthorized { .. })
    );
}

#[test]
fn test_any_of_signature_keys() {
    let mut app = TestApp::new();
    let alice = app.create_account(1, FUNDS);
    let backup = TestAccount::from_seed(9);
    let config = encode_sub_authenticators(&[
        SubAuthenticatorInitData::new(SIGNATURE_VERIFICATION_TYPE, backup.public_key_bytes()),
        SubAuthenticatorInitData::new(SIGNATURE_VERIFICATION_TYPE, alice.public_key_bytes()),
    ])
    .unwrap();
    let id = app
        .add_authenticator(&alice.address(), ANY_OF_TYPE, &config)
        .unwrap();

    // Signed by alice's own key: the second branch authenticates.
    let builder = app.tx_builder().msg(alice.send_msg(1)).select(vec![id]);
    app.deliver_tx(&builder.build(&[&alice])).unwrap();

    // Signed by the backup key: the first branch authenticates.
    let builder = app.tx_builder().msg(alice.send_msg(1)).select(vec![id]);
    let mut tx = builder.build(&[&alice]);
    tx.signatures[0].signature = backup.sign(&builder.sign_bytes(&tx, &alice.address()));
    app.deliver_tx(&tx).unwrap();
}

#[test]
fn test_authenticate_discarded_track_and_confirm_persist() {
    let mut app = TestApp::new();
    let alice = app.create_account(1, FUNDS);
    app.register(StatefulAuthenticator);
    let id = app
        .add_authenticator(&alice.address(), STATEFUL_AUTHENTICATOR_TYPE, &[])
        .unwrap();

    // Messages fail: authenticate's write is dropped, track's write is kept.
    let tx = app
        .tx_builder()
        .msg(alice.send_msg(1))
        .select(vec![id])
        .build(&[&alice]);
    let failed = app.deliver_tx_with(&tx, false, |_| {
        Err(SmartAccountError::internal("insufficient funds for send"))
    });
    assert!(failed.is_err());
    let value = app.with_context(|ctx| StatefulAuthenticator::value(ctx, &alice.address()));
    assert_eq!(value.unwrap(), 1);

    // Success adds one for track and one for confirmation.
    let tx = app
        .tx_builder()
        .msg(alice.send_msg(1))
        .select(vec![id])
        .build(&[&alice]);
    app.deliver_tx(&tx).unwrap();
    let value = app.with_context(|ctx| StatefulAuthenticator::value(ctx, &alice.address()));
    assert_eq!(value.unwrap(), 3);
}

#[test]
fn test_track_failure_does_not_fail_transaction() {
    let mut app = TestApp::new();
    let alice = app.create_account(1, FUNDS);
    app.register(SpyAuthenticator::new());
    let config = SpyAuthenticatorData::failing(
        "tracker",
        FailureFlags {
            track: true,
            ..FailureFlags::default()
        },
    )
    .to_config();
    let id = app
        .add_authenticator(&alice.address(), SPY_AUTHENTICATOR_TYPE, &config)
        .unwrap();

    let tx = app
        .tx_builder()
        .msg(alice.send_msg(1))
        .select(vec![id])
        .build(&[&alice]);
    app.deliver_tx(&tx).unwrap();

    let calls = app
        .with_context(|ctx| SpyAuthenticator::latest_calls(ctx, "tracker"))
        .unwrap();
    assert!(calls.authenticate.is_none(), "authenticate writes are discarded");
    assert!(calls.track.is_none(), "failed track writes are discarded");
    let confirmed = calls.confirm_execution.unwrap();
    assert_eq!(confirmed.authenticator_id, CompositeId::root(id));
    assert_eq!(app.balance(&alice.address()), FUNDS - DEFAULT_FEE_AMOUNT);
}

#[test]
fn test_spy_sees_message_index_and_id() {
    let mut app = TestApp::new();
    let alice = app.create_account(1, FUNDS);
    let bob = app.create_account(2, FUNDS);
    app.register(SpyAuthenticator::new());
    let alice_id = app
        .add_authenticator(
            &alice.address(),
            SPY_AUTHENTICATOR_TYPE,
            &SpyAuthenticatorData::new("alice").to_config(),
        )
        .unwrap();
    let bob_id = app
        .add_authenticator(
            &bob.address(),
            SPY_AUTHENTICATOR_TYPE,
            &SpyAuthenticatorData::new("bob").to_config(),
        )
        .unwrap();

    let tx = app
        .tx_builder()
        .msg(alice.send_msg(1))
        .msg(bob.send_msg(2))
        .select(vec![alice_id, bob_id])
        .build(&[&alice, &bob]);
    app.deliver_tx(&tx).unwrap();

    let bob_calls = app
        .with_context(|ctx| SpyAuthenticator::latest_calls(ctx, "bob"))
        .unwrap();
    let track = bob_calls.track.unwrap();
    assert_eq!(track.msg_index, 1);
    assert_eq!(track.authenticator_id, CompositeId::root(bob_id));
    assert_eq!(track.account, bob.address());

    let confirm = bob_calls.confirm_execution.unwrap();
    assert_eq!(confirm.fee_payer, alice.address());
    assert_eq!(confirm.msg, tx.msgs[1].to_any());
}

#[test]
fn test_confirmation_veto_discards_message_effects() {
    let mut app = TestApp::new();
    let alice = app.create_account(1, FUNDS);
    let blocker = TestingAuthenticator::new(Approval::Always, 0, Approval::Never);
    app.register(blocker.clone());
    let id = app
        .add_authenticator(&alice.address(), blocker.type_name(), &[])
        .unwrap();

    let tx = app
        .tx_builder()
        .msg(alice.send_msg(1))
        .select(vec![id])
        .build(&[&alice]);
    let err = app
        .deliver_tx_with(&tx, false, |ctx| ctx.set(b"executed", b"yes"))
        .unwrap_err();
    assert_matches!(err, SmartAccountError::ConfirmationRejected { .. });
    assert!(err.to_string().contains("failed to confirm execution for message 0"));

    assert!(!app.with_context(|ctx| ctx.has(b"executed")).unwrap());
    // The fee was charged by the committed ante phase.
    assert_eq!(app.balance(&alice.address()), FUNDS - DEFAULT_FEE_AMOUNT);
}

#[test]
fn test_circuit_breaker_routes_to_legacy() {
    let mut app = TestApp::new();
    let alice = app.create_account(1, FUNDS);
    let blocker = TestingAuthenticator::new(Approval::Never, 0, Approval::Never);
    app.register(blocker.clone());
    let id = app
        .add_authenticator(&alice.address(), blocker.type_name(), &[])
        .unwrap();

    // No selection: legacy chain.
    let tx = app.tx_builder().msg(alice.send_msg(1)).build(&[&alice]);
    app.deliver_tx(&tx).unwrap();
    assert_eq!(app.legacy_calls(), 1);

    // Module deactivated: legacy chain even with a selection, and the
    // post phase is skipped too.
    let keeper = app.keeper.clone();
    app.with_context(|ctx| keeper.set_active_state(ctx, false))
        .unwrap();
    let tx = app
        .tx_builder()
        .msg(alice.send_msg(1))
        .select(vec![id])
        .build(&[&alice]);
    app.deliver_tx(&tx).unwrap();
    assert_eq!(app.legacy_calls(), 2);

    // Reactivated: the rejecting authenticator is consulted again.
    app.with_context(|ctx| keeper.set_active_state(ctx, true))
        .unwrap();
    let tx = app
        .tx_builder()
        .msg(alice.send_msg(1))
        .select(vec![id])
        .build(&[&alice]);
    assert_matches!(
        app.deliver_tx(&tx),
        Err(SmartAccountError::AuthenticationFailed { .. })
    );
    assert_eq!(app.legacy_calls(), 2);
}

#[test]
fn test_removed_authenticator_no_longer_authenticates() {
    let mut app = TestApp::new();
    let alice = app.create_account(1, FUNDS);
    let id = app
        .add_authenticator(
            &alice.address(),
            SIGNATURE_VERIFICATION_TYPE,
            &alice.public_key_bytes(),
        )
        .unwrap();
    app.remove_authenticator(&alice.address(), id).unwrap();

    let tx = app
        .tx_builder()
        .msg(alice.send_msg(1))
        .select(vec![id])
        .build(&[&alice]);
    assert_matches!(
        app.deliver_tx(&tx),
        Err(SmartAccountError::NotFound { .. })
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Message `i` is signed by account `i`; account 0 pays the fee.
    #[test]
    fn prop_outcome_follows_approvals(approvals in prop::collection::vec(any::<bool>(), 1..=3)) {
        let mut app = TestApp::new();
        app.register(SpyAuthenticator::new());
        let accounts: Vec<_> = (0..approvals.len())
            .map(|i| app.create_account(i as u8 + 1, FUNDS))
            .collect();

        let mut builder = app.tx_builder();
        let mut selected = Vec::new();
        for (i, (account, &approved)) in accounts.iter().zip(&approvals).enumerate() {
            let name = format!("account-{i}");
            let data = if approved {
                SpyAuthenticatorData::new(&name)
            } else {
                SpyAuthenticatorData::failing(
                    &name,
                    FailureFlags {
                        authenticate: true,
                        ..FailureFlags::default()
                    },
                )
            };
            let id = app
                .add_authenticator(&account.address(), SPY_AUTHENTICATOR_TYPE, &data.to_config())
                .unwrap();
            selected.push(id);
            builder = builder.msg(account.send_msg(1));
        }
        let signers: Vec<_> = accounts.iter().collect();
        let tx = builder.select(selected).build(&signers);

        let all_approved = approvals.iter().all(|&approved| approved);
        prop_assert_eq!(app.deliver_tx(&tx).is_ok(), all_approved);

        // The fee payer is charged exactly when its own message authenticates.
        let expected = if approvals[0] { FUNDS - DEFAULT_FEE_AMOUNT } else { FUNDS };
        prop_assert_eq!(app.balance(&accounts[0].address()), expected);
        for account in &accounts[1..] {
            prop_assert_eq!(app.balance(&account.address()), FUNDS);
        }

        for i in 0..accounts.len() {
            let name = format!("account-{i}");
            let calls = app
                .with_context(|ctx| SpyAuthenticator::latest_calls(ctx, &name))
                .unwrap();
            prop_assert!(calls.authenticate.is_none());
            prop_assert_eq!(calls.track.is_some(), all_approved);
        }
    }
}
