//! Genesis export and import between two apps

use assert_matches::assert_matches;

use smart_account_authenticator::{
    encode_sub_authenticators, SubAuthenticatorInitData, ALL_OF_TYPE, SIGNATURE_VERIFICATION_TYPE,
};
use smart_account_core::SmartAccountError;
use smart_account_keeper::{
    export_genesis, init_genesis, AccountAuthenticator, AuthenticatorData, GenesisState, Params,
};
use smart_account_testkit::{SpyAuthenticator, SpyAuthenticatorData, TestApp, SPY_AUTHENTICATOR_TYPE};

fn export(app: &mut TestApp) -> GenesisState {
    let keeper = app.keeper.clone();
    app.with_context(|ctx| export_genesis(&keeper, ctx)).unwrap()
}

fn import(app: &mut TestApp, genesis: &GenesisState) -> smart_account_core::Result<()> {
    let keeper = app.keeper.clone();
    app.with_context(|ctx| init_genesis(&keeper, ctx, genesis))
}

#[test]
fn test_export_then_import_reproduces_state() {
    let mut source = TestApp::new();
    source.register(SpyAuthenticator::new());
    let alice = source.create_account(1, 0);
    let bob = source.create_account(2, 0);

    let combined = encode_sub_authenticators(&[
        SubAuthenticatorInitData::new(SIGNATURE_VERIFICATION_TYPE, alice.public_key_bytes()),
        SubAuthenticatorInitData::new(SIGNATURE_VERIFICATION_TYPE, bob.public_key_bytes()),
    ])
    .unwrap();
    source
        .add_authenticator(&alice.address(), SIGNATURE_VERIFICATION_TYPE, &alice.public_key_bytes())
        .unwrap();
    let removed = source
        .add_authenticator(&bob.address(), SIGNATURE_VERIFICATION_TYPE, &bob.public_key_bytes())
        .unwrap();
    source.add_authenticator(&alice.address(), ALL_OF_TYPE, &combined).unwrap();
    source
        .add_authenticator(
            &bob.address(),
            SPY_AUTHENTICATOR_TYPE,
            &SpyAuthenticatorData::new("restored").to_config(),
        )
        .unwrap();
    source.remove_authenticator(&bob.address(), removed).unwrap();
    let params = Params {
        maximum_unauthenticated_gas: 77_000,
        circuit_breaker_controllers: vec![bob.address()],
        ..Params::default()
    };
    source.set_params(&params);

    let genesis = export(&mut source);
    assert_eq!(genesis.next_authenticator_id, 5);
    assert_eq!(genesis.params, params);
    let exported_ids: Vec<u64> = genesis
        .authenticator_data
        .iter()
        .flat_map(|data| data.authenticators.iter().map(|entry| entry.id))
        .collect();
    assert_eq!(exported_ids.len(), 3);
    assert!(!exported_ids.contains(&removed));

    let json = serde_json::to_string(&genesis).unwrap();
    let decoded: GenesisState = serde_json::from_str(&json).unwrap();

    let mut target = TestApp::new();
    target.register(SpyAuthenticator::new());
    import(&mut target, &decoded).unwrap();
    assert_eq!(export(&mut target), genesis);

    // The admission hook ran, but only against a discarded overlay.
    let calls = target
        .with_context(|ctx| SpyAuthenticator::latest_calls(ctx, "restored"))
        .unwrap();
    assert!(calls.on_authenticator_added.is_none());

    let next = target
        .add_authenticator(&alice.address(), SIGNATURE_VERIFICATION_TYPE, &alice.public_key_bytes())
        .unwrap();
    assert_eq!(next, 5);
}

#[test]
fn test_import_rejects_unregistered_types() {
    let mut app = TestApp::new();
    let genesis = GenesisState {
        next_authenticator_id: 2,
        authenticator_data: vec![AuthenticatorData {
            address: smart_account_core::AccountAddress::new(vec![3; 20]),
            authenticators: vec![AccountAuthenticator::new(1, "Retired", Vec::new())],
        }],
        ..GenesisState::default()
    };
    assert_matches!(
        import(&mut app, &genesis),
        Err(SmartAccountError::TypeNotRegistered { .. })
    );
}

#[test]
fn test_import_runs_admission_checks() {
    let mut app = TestApp::new();
    let genesis = GenesisState {
        next_authenticator_id: 2,
        authenticator_data: vec![AuthenticatorData {
            address: smart_account_core::AccountAddress::new(vec![3; 20]),
            authenticators: vec![AccountAuthenticator::new(
                1,
                SIGNATURE_VERIFICATION_TYPE,
                vec![0; 5],
            )],
        }],
        ..GenesisState::default()
    };
    assert_matches!(
        import(&mut app, &genesis),
        Err(SmartAccountError::AdmissionRejected { .. })
    );
}

#[test]
fn test_import_rejects_ids_at_or_above_counter() {
    let mut app = TestApp::new();
    let genesis = GenesisState {
        next_authenticator_id: 1,
        authenticator_data: vec![AuthenticatorData {
            address: smart_account_core::AccountAddress::new(vec![3; 20]),
            authenticators: vec![AccountAuthenticator::new(
                1,
                SIGNATURE_VERIFICATION_TYPE,
                vec![0; 32],
            )],
        }],
        ..GenesisState::default()
    };
    assert_matches!(
        import(&mut app, &genesis),
        Err(SmartAccountError::MalformedRequest { .. })
    );
}
