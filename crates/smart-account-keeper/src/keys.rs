//! Store key layout
//!
//! Every key lives under the module namespace. Authenticator entries are keyed
//! by `(account, id)` with a length-prefixed account and a big-endian id, so a
//! prefix scan over one account yields its entries in id order.

use smart_account_core::{AccountAddress, Result, SmartAccountError};

/// Module namespace
pub const MODULE_NAME: &str = "smartaccount";

const PARAMS_KEY: &[u8] = b"smartaccount|params";
const NEXT_AUTHENTICATOR_ID_KEY: &[u8] = b"smartaccount|next_authenticator_id";
const AUTHENTICATOR_PREFIX: &[u8] = b"smartaccount|authenticator|";

/// Key holding module params
pub fn params_key() -> &'static [u8] {
    PARAMS_KEY
}

/// Key holding the global next-id counter
pub fn next_authenticator_id_key() -> &'static [u8] {
    NEXT_AUTHENTICATOR_ID_KEY
}

/// Prefix of every stored authenticator entry
pub fn authenticator_prefix() -> &'static [u8] {
    AUTHENTICATOR_PREFIX
}

/// Prefix of one account's entries
pub fn account_prefix(account: &AccountAddress) -> Result<Vec<u8>> {
    let bytes = account.as_bytes();
    let len = u8::try_from(bytes.len()).map_err(|_| {
        SmartAccountError::malformed_request(format!(
            "account address too long: {} bytes",
            bytes.len()
        ))
    })?;
    let mut key = Vec::with_capacity(AUTHENTICATOR_PREFIX.len() + 1 + bytes.len() + 8);
    key.extend_from_slice(AUTHENTICATOR_PREFIX);
    key.push(len);
    key.extend_from_slice(bytes);
    Ok(key)
}

/// Key of one account entry
pub fn account_authenticator_key(account: &AccountAddress, id: u64) -> Result<Vec<u8>> {
    let mut key = account_prefix(account)?;
    key.extend_from_slice(&id.to_be_bytes());
    Ok(key)
}

/// Split an entry key back into its account and id
pub fn parse_account_authenticator_key(key: &[u8]) -> Result<(AccountAddress, u64)> {
    let malformed = || {
        SmartAccountError::storage(format!(
            "malformed authenticator key {}",
            String::from_utf8_lossy(key)
        ))
    };
    let rest = key.strip_prefix(AUTHENTICATOR_PREFIX).ok_or_else(malformed)?;
    let (&len, rest) = rest.split_first().ok_or_else(malformed)?;
    let len = usize::from(len);
    if rest.len() != len + 8 {
        return Err(malformed());
    }
    let (account, id) = rest.split_at(len);
    let id: [u8; 8] = id.try_into().map_err(|_| malformed())?;
    Ok((AccountAddress::new(account), u64::from_be_bytes(id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_entry_keys_sort_by_id_within_account() {
        let account = AccountAddress::new(vec![7; 20]);
        let low = account_authenticator_key(&account, 2).unwrap();
        let high = account_authenticator_key(&account, 256).unwrap();
        assert!(low < high);
        assert!(low.starts_with(&account_prefix(&account).unwrap()));
    }

    #[test]
    fn test_account_prefix_does_not_capture_longer_address() {
        let short = AccountAddress::new(vec![1; 20]);
        let long = AccountAddress::new(vec![1; 21]);
        let key = account_authenticator_key(&long, 1).unwrap();
        assert!(!key.starts_with(&account_prefix(&short).unwrap()));
    }

    #[test]
    fn test_rejects_foreign_keys() {
        assert!(parse_account_authenticator_key(b"other|key").is_err());
        assert!(parse_account_authenticator_key(params_key()).is_err());
    }

    proptest! {
        #[test]
        fn parse_inverts_key(account in proptest::collection::vec(any::<u8>(), 1..40), id in any::<u64>()) {
            let address = AccountAddress::new(account);
            let key = account_authenticator_key(&address, id).unwrap();
            let (parsed, parsed_id) = parse_account_authenticator_key(&key).unwrap();
            prop_assert_eq!(parsed, address);
            prop_assert_eq!(parsed_id, id);
        }
    }
}
