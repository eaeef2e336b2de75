//! In-memory host collaborators
//!
//! Stand-ins for the account keeper, the bank's fee deduction and the
//! contract runtime. Account records and contract registrations live outside
//! the KV store; balances live inside it so they follow overlay semantics.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use smart_account_core::{
    AccountAddress, AccountKeeper, BaseAccount, Coin, Context, ContractRuntime, FeeDeductor,
    Result, SmartAccountError, Tx,
};

/// Account records keyed by address
#[derive(Debug, Default)]
pub struct InMemoryAccountKeeper {
    accounts: RwLock<BTreeMap<AccountAddress, BaseAccount>>,
}

impl InMemoryAccountKeeper {
    /// Empty keeper
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `address` with the next account number and sequence 0
    pub fn create_account(&self, address: AccountAddress, pub_key: Option<Vec<u8>>) -> BaseAccount {
        let mut accounts = self.accounts.write();
        let account = BaseAccount {
            address: address.clone(),
            account_number: accounts.len() as u64,
            sequence: 0,
            pub_key,
        };
        accounts.insert(address, account.clone());
        account
    }

    /// Record lookup without a context
    pub fn account(&self, address: &AccountAddress) -> Option<BaseAccount> {
        self.accounts.read().get(address).cloned()
    }

    /// Overwrite the sequence of `address`
    pub fn set_sequence(&self, address: &AccountAddress, sequence: u64) {
        if let Some(account) = self.accounts.write().get_mut(address) {
            account.sequence = sequence;
        }
    }

    /// Advance the sequence of `address` by one
    pub fn increment_sequence(&self, address: &AccountAddress) {
        if let Some(account) = self.accounts.write().get_mut(address) {
            account.sequence += 1;
        }
    }
}

impl AccountKeeper for InMemoryAccountKeeper {
    fn get_account(
        &self,
        _ctx: &mut Context<'_>,
        address: &AccountAddress,
    ) -> Result<Option<BaseAccount>> {
        Ok(self.account(address))
    }
}

/// Fee deduction over balances stored in the KV store
#[derive(Debug, Default)]
pub struct BankFeeDeductor;

impl BankFeeDeductor {
    /// Stateless deductor
    pub fn new() -> Self {
        Self
    }

    fn balance_key(address: &AccountAddress, denom: &str) -> Vec<u8> {
        format!("bank|balance|{}|{denom}", address.to_hex()).into_bytes()
    }

    /// Balance of `address` in `denom`
    pub fn balance(ctx: &mut Context<'_>, address: &AccountAddress, denom: &str) -> Result<u64> {
        match ctx.get(&Self::balance_key(address, denom))? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| SmartAccountError::serialization("balance is not 8 bytes"))?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }

    /// Credit `coin` to `address`
    pub fn fund(ctx: &mut Context<'_>, address: &AccountAddress, coin: &Coin) -> Result<()> {
        let balance = Self::balance(ctx, address, &coin.denom)?;
        let next = balance
            .checked_add(coin.amount)
            .ok_or_else(|| SmartAccountError::internal("balance overflow"))?;
        ctx.set(&Self::balance_key(address, &coin.denom), &next.to_be_bytes())
    }

    fn debit(ctx: &mut Context<'_>, address: &AccountAddress, coin: &Coin) -> Result<()> {
        let balance = Self::balance(ctx, address, &coin.denom)?;
        let next = balance.checked_sub(coin.amount).ok_or_else(|| {
            SmartAccountError::unauthorized(format!(
                "insufficient funds: {address} has {balance}{denom}, fee is {}{denom}",
                coin.amount,
                denom = coin.denom
            ))
        })?;
        ctx.set(&Self::balance_key(address, &coin.denom), &next.to_be_bytes())
    }
}

impl FeeDeductor for BankFeeDeductor {
    fn deduct_fee(&self, ctx: &mut Context<'_>, tx: &Tx, _simulate: bool) -> Result<()> {
        let payer = match tx.fee_granter() {
            Some(granter) => granter.clone(),
            None => tx
                .fee_payer()
                .ok_or_else(|| SmartAccountError::malformed_request("transaction has no fee payer"))?,
        };
        for coin in &tx.fee.amount {
            Self::debit(ctx, &payer, coin)?;
        }
        Ok(())
    }
}

/// Contract runtime recording every privileged call
#[derive(Debug, Default)]
pub struct MockContractRuntime {
    contracts: RwLock<BTreeSet<AccountAddress>>,
    rejected_phases: RwLock<BTreeSet<String>>,
    calls: Mutex<Vec<(AccountAddress, Value)>>,
}

impl MockContractRuntime {
    /// Runtime with no contracts
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a contract at `address`
    pub fn deploy(&self, address: AccountAddress) {
        self.contracts.write().insert(address);
    }

    /// Make every call of `phase` (e.g. `authenticate`) fail
    pub fn reject_phase(&self, phase: &str) {
        self.rejected_phases.write().insert(phase.to_string());
    }

    /// Let `phase` succeed again
    pub fn accept_phase(&self, phase: &str) {
        self.rejected_phases.write().remove(phase);
    }

    /// Every call so far as `(contract, envelope)`
    pub fn calls(&self) -> Vec<(AccountAddress, Value)> {
        self.calls.lock().clone()
    }

    /// Envelope tags of every call so far, in order
    pub fn phases(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|(_, envelope)| envelope_phase(envelope))
            .collect()
    }
}

fn envelope_phase(envelope: &Value) -> Option<String> {
    envelope.as_object()?.keys().next().cloned()
}

impl ContractRuntime for MockContractRuntime {
    fn has_contract(&self, _ctx: &mut Context<'_>, contract: &AccountAddress) -> Result<bool> {
        Ok(self.contracts.read().contains(contract))
    }

    fn sudo(&self, _ctx: &mut Context<'_>, contract: &AccountAddress, msg: &[u8]) -> Result<Vec<u8>> {
        let envelope: Value = serde_json::from_slice(msg)?;
        let phase = envelope_phase(&envelope).unwrap_or_default();
        self.calls.lock().push((contract.clone(), envelope));
        if !self.contracts.read().contains(contract) {
            return Err(SmartAccountError::contract(format!(
                "no such contract: {contract}"
            )));
        }
        if self.rejected_phases.read().contains(&phase) {
            return Err(SmartAccountError::contract(format!(
                "contract {contract} rejected {phase}"
            )));
        }
        Ok(Vec::new())
    }
}
