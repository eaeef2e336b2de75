//! Smart Account Ante - the transaction authentication pipeline
//!
//! Chains wired around message execution:
//!
//! - [`CircuitBreakerDecorator`]: routes a transaction to the authenticator
//!   pipeline or to a legacy ante chain
//! - [`AuthenticatorDecorator`]: authenticates every message, charges the fee
//!   once the fee payer is authenticated, then runs deferred `track` calls
//! - [`PostAuthenticatorDecorator`]: runs `confirm_execution` after the
//!   messages executed

#![forbid(unsafe_code)]

pub mod ante;
pub mod circuit_breaker;
pub mod handler;
pub mod post;
pub mod telemetry;

pub use ante::{AuthenticatorDecorator, FEE_PAYER_GAS_DESCRIPTOR, STATIC_GAS_DESCRIPTOR};
pub use circuit_breaker::{is_circuit_breaker_active, CircuitBreakerDecorator};
pub use handler::{AnteHandler, PostHandler, Terminator};
pub use post::PostAuthenticatorDecorator;
