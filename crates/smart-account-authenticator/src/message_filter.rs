//! Message pattern filter leaf
//!
//! The configured JSON pattern must be a structural subset of the message,
//! where the message is its JSON body plus an `"@type"` key carrying the type
//! url. Numbers must be quoted strings; a raw JSON number reached during
//! matching is an error, and admission rejects patterns containing any.

use serde_json::{Map, Value};

use smart_account_core::{AccountAddress, CompositeId, Context, Gas, LocalAny, Result, SmartAccountError};

use crate::authenticator::Authenticator;
use crate::request::AuthenticationRequest;

/// Registry type of [`MessageFilter`]
pub const MESSAGE_FILTER_TYPE: &str = "MessageFilter";

/// Key carrying the message type url in the candidate
pub const TYPE_KEY: &str = "@type";

/// Accepts messages matching a JSON pattern
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    pattern: Option<Value>,
}

impl MessageFilter {
    /// Unconfigured prototype
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_pattern(config: &[u8]) -> Result<Value> {
        serde_json::from_slice(config).map_err(|e| {
            SmartAccountError::malformed_request(format!("invalid message filter pattern: {e}"))
        })
    }
}

/// Structural form of a message used for matching
pub fn message_candidate(msg: &LocalAny) -> Result<Value> {
    let body: Value = serde_json::from_slice(&msg.value).map_err(|e| {
        SmartAccountError::malformed_request(format!("message {} is not JSON: {e}", msg.type_url))
    })?;
    let mut object = match body {
        Value::Object(object) => object,
        Value::Null => Map::new(),
        _ => {
            return Err(SmartAccountError::malformed_request(format!(
                "message {} is not a JSON object",
                msg.type_url
            )))
        }
    };
    object.insert(TYPE_KEY.to_string(), Value::String(msg.type_url.clone()));
    Ok(Value::Object(object))
}

/// Whether `data` contains everything in `pattern`.
///
/// Errors when a raw number is reached on either side.
pub fn is_superset(data: &Value, pattern: &Value) -> Result<bool> {
    if data.is_number() {
        return Err(SmartAccountError::malformed_request(
            "invalid message: numbers must be encoded as strings",
        ));
    }
    match pattern {
        Value::Object(expected) => {
            let Value::Object(actual) = data else {
                return Ok(false);
            };
            for (key, expected_value) in expected {
                match actual.get(key) {
                    Some(actual_value) if is_superset(actual_value, expected_value)? => {}
                    _ => return Ok(false),
                }
            }
            Ok(true)
        }
        Value::Array(expected) => {
            let Value::Array(actual) = data else {
                return Ok(false);
            };
            if actual.len() < expected.len() {
                return Ok(false);
            }
            for (actual_value, expected_value) in actual.iter().zip(expected) {
                if !is_superset(actual_value, expected_value)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Value::Number(_) => Err(SmartAccountError::malformed_request(
            "invalid pattern: numbers must be encoded as strings",
        )),
        Value::String(expected) => match data {
            Value::String(actual) => Ok(strings_match(actual, expected)),
            _ => Ok(false),
        },
        Value::Bool(_) | Value::Null => Ok(data == pattern),
    }
}

/// True when `value` contains a raw JSON number anywhere.
pub fn contains_raw_number(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::Array(items) => items.iter().any(contains_raw_number),
        Value::Object(entries) => entries.values().any(contains_raw_number),
        _ => false,
    }
}

fn strings_match(actual: &str, expected: &str) -> bool {
    match (normalize_decimal(actual), normalize_decimal(expected)) {
        (Some(actual), Some(expected)) => actual == expected,
        _ => actual == expected,
    }
}

/// Canonical form of a plain decimal string, `None` if it is not one.
///
/// Leading integer zeros and trailing fractional zeros are dropped and
/// negative zero becomes zero.
fn normalize_decimal(raw: &str) -> Option<String> {
    let (negative, unsigned) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, fraction),
        None => (unsigned, ""),
    };
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if integer.is_empty() || !all_digits(integer) || !all_digits(fraction) {
        return None;
    }
    if unsigned.contains('.') && fraction.is_empty() {
        return None;
    }

    let integer = integer.trim_start_matches('0');
    let integer = if integer.is_empty() { "0" } else { integer };
    let fraction = fraction.trim_end_matches('0');
    let is_zero = integer == "0" && fraction.is_empty();

    let mut normalized = String::with_capacity(raw.len());
    if negative && !is_zero {
        normalized.push('-');
    }
    normalized.push_str(integer);
    if !fraction.is_empty() {
        normalized.push('.');
        normalized.push_str(fraction);
    }
    Some(normalized)
}

impl Authenticator for MessageFilter {
    fn type_name(&self) -> &str {
        MESSAGE_FILTER_TYPE
    }

    fn static_gas(&self) -> Gas {
        0
    }

    fn initialize(&self, config: &[u8]) -> Result<Box<dyn Authenticator>> {
        Ok(Box::new(Self {
            pattern: Some(Self::parse_pattern(config)?),
        }))
    }

    fn authenticate(&self, _ctx: &mut Context<'_>, request: &AuthenticationRequest) -> Result<()> {
        let pattern = self
            .pattern
            .as_ref()
            .ok_or_else(|| SmartAccountError::internal("message filter is not initialized"))?;
        let candidate = message_candidate(&request.msg)?;
        if !is_superset(&candidate, pattern)? {
            return Err(SmartAccountError::authentication_failed(format!(
                "message {} does not match pattern {pattern}",
                request.msg.type_url
            )));
        }
        Ok(())
    }

    fn track(&self, _ctx: &mut Context<'_>, _request: &AuthenticationRequest) -> Result<()> {
        Ok(())
    }

    fn confirm_execution(
        &self,
        _ctx: &mut Context<'_>,
        _request: &AuthenticationRequest,
    ) -> Result<()> {
        Ok(())
    }

    fn on_authenticator_added(
        &self,
        _ctx: &mut Context<'_>,
        _account: &AccountAddress,
        config: &[u8],
        _authenticator_id: &CompositeId,
    ) -> Result<()> {
        let pattern = Self::parse_pattern(config)
            .map_err(|e| SmartAccountError::admission_rejected(e.to_string()))?;
        if contains_raw_number(&pattern) {
            return Err(SmartAccountError::admission_rejected(
                "invalid pattern: numbers must be encoded as strings",
            ));
        }
        Ok(())
    }

    fn on_authenticator_removed(
        &self,
        _ctx: &mut Context<'_>,
        _account: &AccountAddress,
        _config: &[u8],
        _authenticator_id: &CompositeId,
    ) -> Result<()> {
        Ok(())
    }
}
