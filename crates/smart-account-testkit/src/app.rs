//! Full pipeline over an in-memory store
//!
//! [`TestApp`] plays the host: it owns the committed state and runs the ante
//! chain directly against it. The ante chain discards its own scratch writes,
//! so only the fee and `track` writes land there. The messages plus post chain
//! run in an overlay that commits only when both succeed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use smart_account_ante::{
    AnteHandler, AuthenticatorDecorator, CircuitBreakerDecorator, PostAuthenticatorDecorator,
    PostHandler, Terminator,
};
use smart_account_authenticator::{builtin_authenticators, Authenticator, AuthenticatorManager};
use smart_account_core::{
    AccountAddress, BlockEnv, Coin, Context, GasMeter, MemoryStore, Result, Tx,
};
use smart_account_keeper::{Params, SmartAccountConfig, SmartAccountKeeper};

use crate::builders::TxBuilder;
use crate::keys::TestAccount;
use crate::mocks::{BankFeeDeductor, InMemoryAccountKeeper, MockContractRuntime};

/// Chain id of every [`TestApp`]
pub const TEST_CHAIN_ID: &str = "smart-account-test-1";

/// Fee denomination
pub const TEST_DENOM: &str = "stake";

/// Host simulation wiring the registry, keeper and decorators together
pub struct TestApp {
    /// Committed state
    pub store: MemoryStore,
    /// Block environment
    pub env: BlockEnv,
    /// Authenticator registry
    pub manager: Arc<AuthenticatorManager>,
    /// Module keeper
    pub keeper: Arc<SmartAccountKeeper>,
    /// Account records
    pub accounts: Arc<InMemoryAccountKeeper>,
    /// Contract runtime behind `CosmwasmAuthenticatorV1`
    pub runtime: Arc<MockContractRuntime>,
    /// Governor allowed to activate the module
    pub governor: TestAccount,
    ante: Arc<dyn AnteHandler>,
    post: Arc<dyn PostHandler>,
    legacy_calls: Arc<AtomicUsize>,
}

impl TestApp {
    /// App with the built-in authenticators and default params
    pub fn new() -> Self {
        Self::with_config(SmartAccountConfig::default())
    }

    /// App configured from `config`; its governor is replaced by
    /// [`TestApp::governor`]
    pub fn with_config(config: SmartAccountConfig) -> Self {
        let manager = Arc::new(config.authenticator_manager());
        let runtime = Arc::new(MockContractRuntime::new());
        manager.initialize_authenticators(builtin_authenticators(&manager, runtime.clone()));

        let governor = TestAccount::from_label("governor");
        let keeper = Arc::new(SmartAccountKeeper::new(manager.clone()).with_governor(governor.address()));
        let accounts = Arc::new(InMemoryAccountKeeper::new());
        let legacy_calls = Arc::new(AtomicUsize::new(0));

        let authenticated: Arc<dyn AnteHandler> = Arc::new(AuthenticatorDecorator::new(
            keeper.clone(),
            accounts.clone(),
            Arc::new(BankFeeDeductor::new()),
            Arc::new(Terminator),
        ));
        let legacy: Arc<dyn AnteHandler> = {
            let calls = legacy_calls.clone();
            Arc::new(move |_ctx: &mut Context<'_>, _tx: &Tx, _simulate: bool| -> Result<()> {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        };
        let ante = Arc::new(CircuitBreakerDecorator::new(keeper.clone(), authenticated, legacy));
        let post = Arc::new(PostAuthenticatorDecorator::new(
            keeper.clone(),
            accounts.clone(),
            Arc::new(Terminator),
        ));

        let mut app = Self {
            store: MemoryStore::new(),
            env: BlockEnv::new(TEST_CHAIN_ID, 1),
            manager,
            keeper,
            accounts,
            runtime,
            governor,
            ante,
            post,
            legacy_calls,
        };
        let keeper = app.keeper.clone();
        app.with_context(|ctx| keeper.set_params(ctx, &config.params))
            .expect("valid params");
        app
    }

    /// Register an extra authenticator type
    pub fn register(&self, authenticator: impl Authenticator + 'static) {
        self.manager.register_authenticator(Arc::new(authenticator));
    }

    /// Run `f` against committed state with an unlimited meter
    pub fn with_context<T>(&mut self, f: impl FnOnce(&mut Context<'_>) -> T) -> T {
        let mut meter = GasMeter::infinite();
        let mut ctx = Context::new(&mut self.store, &mut meter, &self.env);
        f(&mut ctx)
    }

    /// Create an account for `seed` holding `balance` of [`TEST_DENOM`]
    pub fn create_account(&mut self, seed: u8, balance: u64) -> TestAccount {
        let account = TestAccount::from_seed(seed);
        self.accounts
            .create_account(account.address(), Some(account.public_key_bytes()));
        self.fund(&account.address(), balance);
        account
    }

    /// Credit `amount` of [`TEST_DENOM`] to `address`
    pub fn fund(&mut self, address: &AccountAddress, amount: u64) {
        self.with_context(|ctx| BankFeeDeductor::fund(ctx, address, &Coin::new(TEST_DENOM, amount)))
            .expect("funding succeeds");
    }

    /// Balance of `address` in [`TEST_DENOM`]
    pub fn balance(&mut self, address: &AccountAddress) -> u64 {
        self.with_context(|ctx| BankFeeDeductor::balance(ctx, address, TEST_DENOM))
            .expect("balance readable")
    }

    /// Current module params
    pub fn params(&mut self) -> Params {
        let keeper = self.keeper.clone();
        self.with_context(|ctx| keeper.get_params(ctx)).expect("params readable")
    }

    /// Replace the module params
    pub fn set_params(&mut self, params: &Params) {
        let keeper = self.keeper.clone();
        self.with_context(|ctx| keeper.set_params(ctx, params))
            .expect("valid params");
    }

    /// Install an authenticator directly through the keeper
    pub fn add_authenticator(
        &mut self,
        account: &AccountAddress,
        authenticator_type: &str,
        config: &[u8],
    ) -> Result<u64> {
        let keeper = self.keeper.clone();
        self.with_context(|ctx| keeper.add_authenticator(ctx, account, authenticator_type, config))
    }

    /// Remove an authenticator directly through the keeper
    pub fn remove_authenticator(&mut self, account: &AccountAddress, id: u64) -> Result<()> {
        let keeper = self.keeper.clone();
        self.with_context(|ctx| keeper.remove_authenticator(ctx, account, id))
    }

    /// Transaction builder for this chain
    pub fn tx_builder(&self) -> TxBuilder {
        TxBuilder::new(TEST_CHAIN_ID, self.accounts.clone())
    }

    /// Times the legacy ante chain ran
    pub fn legacy_calls(&self) -> usize {
        self.legacy_calls.load(Ordering::SeqCst)
    }

    /// Deliver `tx` whose messages have no effect of their own
    pub fn deliver_tx(&mut self, tx: &Tx) -> Result<()> {
        self.deliver_tx_with(tx, false, |_| Ok(()))
    }

    /// Deliver `tx`, running `execute` as its message handler.
    ///
    /// Ante writes go straight to the committed state, so a fee charged to
    /// an authenticated fee payer stays charged when a later message fails
    /// authentication. Signer sequences advance once the ante chain succeeds.
    /// Message and confirmation writes commit together only when both succeed.
    pub fn deliver_tx_with<F>(&mut self, tx: &Tx, simulate: bool, execute: F) -> Result<()>
    where
        F: FnOnce(&mut Context<'_>) -> Result<()>,
    {
        let mut meter = if tx.fee.gas_limit == 0 {
            GasMeter::infinite()
        } else {
            GasMeter::new(tx.fee.gas_limit)
        };
        let mut ctx = Context::new(&mut self.store, &mut meter, &self.env);

        self.ante.ante_handle(&mut ctx, tx, simulate)?;
        for signer in tx.signers() {
            self.accounts.increment_sequence(&signer);
        }

        let mut run_cache = ctx.cache_context();
        {
            let mut run_ctx = run_cache.context();
            execute(&mut run_ctx)?;
            self.post.post_handle(&mut run_ctx, tx, simulate, true)?;
        }
        run_cache.commit();
        Ok(())
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}
