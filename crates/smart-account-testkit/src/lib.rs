//! Smart Account Testing Infrastructure
//!
//! Shared fixtures for the workspace's integration tests: authenticators with
//! scripted outcomes, in-memory host collaborators, deterministic keys, a
//! transaction builder and [`TestApp`], which wires the full pipeline over a
//! [`MemoryStore`](smart_account_core::MemoryStore).

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//!
//! # Usage
//!
//! ```rust,no_run
//! use smart_account_testkit::*;
//!
//! let mut app = TestApp::new();
//! let alice = app.create_account(1, 1_000_000);
//! let id = app
//!     .add_authenticator(&alice.address(), "SignatureVerification", &alice.public_key_bytes())
//!     .unwrap();
//! let tx = app.tx_builder().msg(alice.send_msg(1)).select(vec![id]).build(&[&alice]);
//! app.deliver_tx(&tx).unwrap();
//! ```

pub mod app;
pub mod authenticators;
pub mod builders;
pub mod keys;
pub mod logging;
pub mod mocks;

pub use app::{TestApp, TEST_CHAIN_ID, TEST_DENOM};
pub use authenticators::{
    Approval, FailureFlags, LatestCalls, SpyAddRequest, SpyAuthenticator, SpyAuthenticatorData,
    SpyRemoveRequest, SpyTrackRequest, StatefulAuthenticator, TestingAuthenticator,
    SPY_AUTHENTICATOR_TYPE, STATEFUL_AUTHENTICATOR_TYPE,
};
pub use builders::{request_for, TxBuilder};
pub use keys::TestAccount;
pub use logging::init_test_tracing;
pub use mocks::{BankFeeDeductor, InMemoryAccountKeeper, MockContractRuntime};
