//! Gas metering primitives
//!
//! [`GasMeter`] bounds the work a transaction may perform. Exhaustion is
//! reported as [`SmartAccountError::OutOfGas`]; callers decide whether that
//! becomes a user-facing error or is converted into something more specific.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SmartAccountError};

/// Amount of gas
pub type Gas = u64;

/// Consumable gas counter with a mutable limit.
///
/// `consumed` may end up above `limit` after a failing charge, mirroring what
/// the caller needs to report back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasMeter {
    limit: Gas,
    consumed: Gas,
}

impl GasMeter {
    /// Create a meter with zero consumption.
    pub fn new(limit: Gas) -> Self {
        Self { limit, consumed: 0 }
    }

    /// Meter that never runs out
    pub fn infinite() -> Self {
        Self::new(Gas::MAX)
    }

    /// Current limit
    pub fn limit(&self) -> Gas {
        self.limit
    }

    /// Gas consumed so far
    pub fn gas_consumed(&self) -> Gas {
        self.consumed
    }

    /// Remaining headroom before the meter is exhausted.
    pub fn gas_remaining(&self) -> Gas {
        self.limit.saturating_sub(self.consumed)
    }

    /// Returns true once consumption has passed the limit.
    pub fn is_past_limit(&self) -> bool {
        self.consumed > self.limit
    }

    /// Raise or lower the limit. Consumption is kept.
    pub fn set_limit(&mut self, limit: Gas) {
        self.limit = limit;
    }

    /// Charge `amount`, failing once consumption passes the limit.
    ///
    /// The charge is recorded even when it fails so the reported consumption
    /// includes the request that tipped the meter over.
    pub fn consume_gas(&mut self, amount: Gas, descriptor: &str) -> Result<()> {
        let Some(consumed) = self.consumed.checked_add(amount) else {
            self.consumed = Gas::MAX;
            return Err(SmartAccountError::out_of_gas(
                format!("{descriptor} (overflow)"),
                self.limit,
                self.consumed,
            ));
        };
        self.consumed = consumed;
        if self.is_past_limit() {
            return Err(SmartAccountError::out_of_gas(
                descriptor,
                self.limit,
                self.consumed,
            ));
        }
        Ok(())
    }
}

impl Default for GasMeter {
    fn default() -> Self {
        Self::infinite()
    }
}

/// Gas schedule charged for key-value store access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvGasConfig {
    /// Flat cost of an existence check
    pub has_cost: Gas,
    /// Flat cost of a delete
    pub delete_cost: Gas,
    /// Flat cost of a read
    pub read_cost_flat: Gas,
    /// Per-byte cost of the key and value read
    pub read_cost_per_byte: Gas,
    /// Flat cost of a write
    pub write_cost_flat: Gas,
    /// Per-byte cost of the key and value written
    pub write_cost_per_byte: Gas,
    /// Cost of advancing an iterator by one entry
    pub iter_next_cost_flat: Gas,
}

impl KvGasConfig {
    /// Schedule that charges nothing
    pub fn free() -> Self {
        Self {
            has_cost: 0,
            delete_cost: 0,
            read_cost_flat: 0,
            read_cost_per_byte: 0,
            write_cost_flat: 0,
            write_cost_per_byte: 0,
            iter_next_cost_flat: 0,
        }
    }
}

impl Default for KvGasConfig {
    fn default() -> Self {
        Self {
            has_cost: 1000,
            delete_cost: 1000,
            read_cost_flat: 1000,
            read_cost_per_byte: 3,
            write_cost_flat: 2000,
            write_cost_per_byte: 30,
            iter_next_cost_flat: 30,
        }
    }
}
