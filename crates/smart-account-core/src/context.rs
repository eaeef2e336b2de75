//! Execution context threaded through every authenticator call
//!
//! A [`Context`] borrows the state store, the active gas meter and the block
//! environment. Store access through the context is charged against the meter
//! using the [`KvGasConfig`] schedule.

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::gas::{Gas, GasMeter, KvGasConfig};
use crate::store::{CacheStore, KvStore};

/// Block-level information visible to authenticators
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEnv {
    /// Chain identifier used in sign bytes
    pub chain_id: String,
    /// Current block height
    pub height: u64,
    /// Block time in unix seconds
    pub time: u64,
}

impl BlockEnv {
    /// Environment for `chain_id` at `height`
    pub fn new(chain_id: impl Into<String>, height: u64) -> Self {
        Self {
            chain_id: chain_id.into(),
            height,
            time: 0,
        }
    }
}

/// Gas-metered view over state for one call
pub struct Context<'a> {
    store: &'a mut dyn KvStore,
    gas_meter: &'a mut GasMeter,
    env: &'a BlockEnv,
    kv_gas: KvGasConfig,
}

impl<'a> Context<'a> {
    /// Create a context charging the default KV gas schedule.
    pub fn new(store: &'a mut dyn KvStore, gas_meter: &'a mut GasMeter, env: &'a BlockEnv) -> Self {
        Self {
            store,
            gas_meter,
            env,
            kv_gas: KvGasConfig::default(),
        }
    }

    /// Replace the KV gas schedule
    pub fn with_kv_gas_config(mut self, kv_gas: KvGasConfig) -> Self {
        self.kv_gas = kv_gas;
        self
    }

    /// Block environment
    pub fn env(&self) -> &BlockEnv {
        self.env
    }

    /// Chain identifier
    pub fn chain_id(&self) -> &str {
        &self.env.chain_id
    }

    /// Current block height
    pub fn block_height(&self) -> u64 {
        self.env.height
    }

    /// The meter currently charged by this context
    pub fn gas_meter(&self) -> &GasMeter {
        &*self.gas_meter
    }

    /// Mutable access to the active meter
    pub fn gas_meter_mut(&mut self) -> &mut GasMeter {
        &mut *self.gas_meter
    }

    /// Charge gas against the active meter
    pub fn consume_gas(&mut self, amount: Gas, descriptor: &str) -> Result<()> {
        self.gas_meter.consume_gas(amount, descriptor)
    }

    /// Read a value
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.consume_gas(self.kv_gas.read_cost_flat, "ReadFlat")?;
        let value = self.store.get(key);
        let read_bytes = key.len() + value.as_ref().map_or(0, Vec::len);
        self.consume_gas(
            self.kv_gas.read_cost_per_byte.saturating_mul(read_bytes as Gas),
            "ReadPerByte",
        )?;
        Ok(value)
    }

    /// Check for a key
    pub fn has(&mut self, key: &[u8]) -> Result<bool> {
        self.consume_gas(self.kv_gas.has_cost, "Has")?;
        Ok(self.store.has(key))
    }

    /// Write a value
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.consume_gas(self.kv_gas.write_cost_flat, "WriteFlat")?;
        self.consume_gas(
            self.kv_gas
                .write_cost_per_byte
                .saturating_mul((key.len() + value.len()) as Gas),
            "WritePerByte",
        )?;
        self.store.set(key, value);
        Ok(())
    }

    /// Delete a key
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.consume_gas(self.kv_gas.delete_cost, "Delete")?;
        self.store.delete(key);
        Ok(())
    }

    /// Entries under `prefix` in key order
    pub fn prefix_scan(&mut self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let entries = self.store.prefix_scan(prefix);
        for (key, value) in &entries {
            self.consume_gas(self.kv_gas.iter_next_cost_flat, "IterNextFlat")?;
            self.consume_gas(
                self.kv_gas
                    .read_cost_per_byte
                    .saturating_mul((key.len() + value.len()) as Gas),
                "ValuePerByte",
            )?;
        }
        Ok(entries)
    }

    /// Shorter-lived context over the same store and meter
    pub fn reborrow(&mut self) -> Context<'_> {
        Context {
            store: &mut *self.store,
            gas_meter: &mut *self.gas_meter,
            env: self.env,
            kv_gas: self.kv_gas,
        }
    }

    /// Same store, charged against `gas_meter` instead of the current meter
    pub fn with_gas_meter<'b>(&'b mut self, gas_meter: &'b mut GasMeter) -> Context<'b> {
        Context {
            store: &mut *self.store,
            gas_meter,
            env: self.env,
            kv_gas: self.kv_gas,
        }
    }

    /// Begin a discardable overlay sharing this context's meter
    pub fn cache_context(&mut self) -> CacheContext<'_> {
        CacheContext {
            cache: CacheStore::new(&mut *self.store),
            gas_meter: &mut *self.gas_meter,
            env: self.env,
            kv_gas: self.kv_gas,
        }
    }
}

/// Overlay produced by [`Context::cache_context`].
///
/// Writes made through [`CacheContext::context`] reach the parent only on
/// [`CacheContext::commit`]. Gas is charged to the shared meter either way.
pub struct CacheContext<'p> {
    cache: CacheStore<'p>,
    gas_meter: &'p mut GasMeter,
    env: &'p BlockEnv,
    kv_gas: KvGasConfig,
}

impl<'p> CacheContext<'p> {
    /// Context writing into the overlay
    pub fn context(&mut self) -> Context<'_> {
        Context {
            store: &mut self.cache,
            gas_meter: &mut *self.gas_meter,
            env: self.env,
            kv_gas: self.kv_gas,
        }
    }

    /// Merge the overlay into its parent
    pub fn commit(self) {
        self.cache.write();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_reads_and_writes_charge_gas() {
        let mut store = MemoryStore::new();
        let mut meter = GasMeter::infinite();
        let env = BlockEnv::new("test-chain", 1);
        let mut ctx = Context::new(&mut store, &mut meter, &env);

        ctx.set(b"key", b"value").unwrap();
        let after_write = ctx.gas_meter().gas_consumed();
        assert_eq!(after_write, 2000 + 30 * 8);

        assert_eq!(ctx.get(b"key").unwrap(), Some(b"value".to_vec()));
        assert_eq!(ctx.gas_meter().gas_consumed(), after_write + 1000 + 3 * 8);
    }

    #[test]
    fn test_cache_context_discard_and_commit() {
        let mut store = MemoryStore::new();
        let mut meter = GasMeter::infinite();
        let env = BlockEnv::default();
        let mut ctx = Context::new(&mut store, &mut meter, &env);

        {
            let mut cache = ctx.cache_context();
            cache.context().set(b"dropped", b"1").unwrap();
        }
        assert!(!ctx.has(b"dropped").unwrap());

        let mut cache = ctx.cache_context();
        cache.context().set(b"kept", b"1").unwrap();
        cache.commit();
        assert!(ctx.has(b"kept").unwrap());
    }

    #[test]
    fn test_discarded_overlay_still_spends_gas() {
        let mut store = MemoryStore::new();
        let mut meter = GasMeter::infinite();
        let env = BlockEnv::default();
        let mut ctx = Context::new(&mut store, &mut meter, &env);
        {
            let mut cache = ctx.cache_context();
            cache.context().consume_gas(42, "branch").unwrap();
        }
        assert_eq!(ctx.gas_meter().gas_consumed(), 42);
    }

    #[test]
    fn test_with_gas_meter_charges_the_substitute() {
        let mut store = MemoryStore::new();
        let mut meter = GasMeter::infinite();
        let env = BlockEnv::default();
        let mut ctx = Context::new(&mut store, &mut meter, &env);

        let mut bounded = GasMeter::new(10);
        {
            let mut limited = ctx.with_gas_meter(&mut bounded);
            assert!(limited.consume_gas(11, "over").unwrap_err().is_out_of_gas());
        }
        assert_eq!(bounded.gas_consumed(), 11);
        assert_eq!(ctx.gas_meter().gas_consumed(), 0);
    }

    #[test]
    fn test_free_schedule() {
        let mut store = MemoryStore::new();
        let mut meter = GasMeter::new(0);
        let env = BlockEnv::default();
        let mut ctx =
            Context::new(&mut store, &mut meter, &env).with_kv_gas_config(KvGasConfig::free());
        ctx.set(b"k", b"v").unwrap();
        assert_eq!(ctx.get(b"k").unwrap(), Some(b"v".to_vec()));
    }
}
