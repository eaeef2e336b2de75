//! Unified error system for smart-account operations
//!
//! Every crate in the workspace reports failures through [`SmartAccountError`].
//! Wrapping an error with extra context keeps its variant, so callers can
//! always match on the failure category regardless of how deep it started.

use serde::{Deserialize, Serialize};

/// Unified error type for all smart-account operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum SmartAccountError {
    /// An admission or removal hook vetoed the change
    #[error("Admission rejected: {message}")]
    AdmissionRejected {
        /// Why the hook refused
        message: String,
    },

    /// The authenticator type is not known to the registry
    #[error("Type not registered: {message}")]
    TypeNotRegistered {
        /// Error message naming the missing type
        message: String,
    },

    /// Selected authenticators do not line up with the transaction messages
    #[error("Selection mismatch: {message}")]
    SelectionMismatch {
        /// Error message describing the mismatch
        message: String,
    },

    /// A message could not be authenticated
    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        /// Error message describing the failure
        message: String,
    },

    /// The unauthenticated gas ceiling was exceeded before the fee payer was authenticated
    #[error(
        "FeePayer must be authenticated first because gas consumption has exceeded the free gas \
         limit for authentication process. The gas limit has been reduced to {limit}. \
         Gas consumed: {consumed}"
    )]
    ResourceExhausted {
        /// The configured ceiling
        limit: u64,
        /// Gas consumed under the ceiling when it was exceeded
        consumed: u64,
    },

    /// A post-execution confirmation vetoed the transaction
    #[error("Confirmation rejected: {message}")]
    ConfirmationRejected {
        /// Error message describing the veto
        message: String,
    },

    /// Bad configuration bytes, bad request shape, or a wrong signature partition count
    #[error("Malformed request: {message}")]
    MalformedRequest {
        /// Error message describing the malformed input
        message: String,
    },

    /// The sender is not allowed to perform the operation
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Error message describing the permission issue
        message: String,
    },

    /// Resource not found
    #[error("Not found: {message}")]
    NotFound {
        /// Error message describing what was not found
        message: String,
    },

    /// A gas meter ran past its limit
    #[error("Out of gas in location: {descriptor}; gasWanted: {limit}, gasUsed: {consumed}")]
    OutOfGas {
        /// What was being charged when the meter ran out
        descriptor: String,
        /// Limit of the exhausted meter
        limit: u64,
        /// Gas consumed including the failing charge
        consumed: u64,
    },

    /// Error reported by an external contract runtime
    #[error("Contract error: {message}")]
    Contract {
        /// Error message returned by the runtime
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the serialization failure
        message: String,
    },

    /// Storage operation failed
    #[error("Storage error: {message}")]
    Storage {
        /// Error message describing the storage failure
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl SmartAccountError {
    /// Create an admission rejected error
    pub fn admission_rejected(message: impl Into<String>) -> Self {
        Self::AdmissionRejected {
            message: message.into(),
        }
    }

    /// Create a type not registered error for the given type name
    pub fn type_not_registered(type_name: impl AsRef<str>) -> Self {
        Self::TypeNotRegistered {
            message: format!("authenticator type {} is not registered", type_name.as_ref()),
        }
    }

    /// Create a selection mismatch error
    pub fn selection_mismatch(message: impl Into<String>) -> Self {
        Self::SelectionMismatch {
            message: message.into(),
        }
    }

    /// Create an authentication failed error
    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            message: message.into(),
        }
    }

    /// Create a resource exhausted error
    pub fn resource_exhausted(limit: u64, consumed: u64) -> Self {
        Self::ResourceExhausted { limit, consumed }
    }

    /// Create a confirmation rejected error
    pub fn confirmation_rejected(message: impl Into<String>) -> Self {
        Self::ConfirmationRejected {
            message: message.into(),
        }
    }

    /// Create a malformed request error
    pub fn malformed_request(message: impl Into<String>) -> Self {
        Self::MalformedRequest {
            message: message.into(),
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an out of gas error
    pub fn out_of_gas(descriptor: impl Into<String>, limit: u64, consumed: u64) -> Self {
        Self::OutOfGas {
            descriptor: descriptor.into(),
            limit,
            consumed,
        }
    }

    /// Create a contract runtime error
    pub fn contract(message: impl Into<String>) -> Self {
        Self::Contract {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Prefix the error message with `context`, keeping the variant.
    ///
    /// Gas errors carry structured fields instead of a message and are
    /// returned untouched.
    pub fn with_context(self, context: impl std::fmt::Display) -> Self {
        let wrap = |message: String| format!("{context}: {message}");
        match self {
            Self::AdmissionRejected { message } => Self::AdmissionRejected {
                message: wrap(message),
            },
            Self::TypeNotRegistered { message } => Self::TypeNotRegistered {
                message: wrap(message),
            },
            Self::SelectionMismatch { message } => Self::SelectionMismatch {
                message: wrap(message),
            },
            Self::AuthenticationFailed { message } => Self::AuthenticationFailed {
                message: wrap(message),
            },
            Self::ConfirmationRejected { message } => Self::ConfirmationRejected {
                message: wrap(message),
            },
            Self::MalformedRequest { message } => Self::MalformedRequest {
                message: wrap(message),
            },
            Self::Unauthorized { message } => Self::Unauthorized {
                message: wrap(message),
            },
            Self::NotFound { message } => Self::NotFound {
                message: wrap(message),
            },
            Self::Contract { message } => Self::Contract {
                message: wrap(message),
            },
            Self::Serialization { message } => Self::Serialization {
                message: wrap(message),
            },
            Self::Storage { message } => Self::Storage {
                message: wrap(message),
            },
            Self::Internal { message } => Self::Internal {
                message: wrap(message),
            },
            gas @ (Self::ResourceExhausted { .. } | Self::OutOfGas { .. }) => gas,
        }
    }

    /// Whether this error came from an exhausted gas meter
    pub fn is_out_of_gas(&self) -> bool {
        matches!(self, Self::OutOfGas { .. })
    }
}

/// Standard Result type for smart-account operations
pub type Result<T> = std::result::Result<T, SmartAccountError>;

impl From<serde_json::Error> for SmartAccountError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<std::io::Error> for SmartAccountError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            _ => Self::storage(err.to_string()),
        }
    }
}
