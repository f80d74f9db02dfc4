//! Error types for skyaudit

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failure against the cloud provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Role missing, trust not configured, or API call not permitted
    AccessDenied,
    /// No such account or resource
    NotFound,
    /// Rate limited by the provider
    Throttled,
    /// The caller's account is not a member of an organization
    NotInOrganization,
    /// The cross-account role does not exist in the target account
    RoleNotFound,
    /// An API call exceeded its timeout
    Timeout,
    /// Anything else
    Unknown,
}

impl FailureKind {
    /// All kinds, in reporting order
    pub const ALL: [FailureKind; 7] = [
        FailureKind::AccessDenied,
        FailureKind::NotFound,
        FailureKind::Throttled,
        FailureKind::NotInOrganization,
        FailureKind::RoleNotFound,
        FailureKind::Timeout,
        FailureKind::Unknown,
    ];

    /// Whether a caller may retry the failed operation
    pub fn is_transient(&self) -> bool {
        matches!(self, FailureKind::Throttled)
    }

    /// Operator-facing remediation hint for this failure kind
    pub fn hint(&self) -> &'static str {
        match self {
            FailureKind::AccessDenied => {
                "Check that the cross-account role trusts the calling account and grants read-only access"
            }
            FailureKind::NotFound => "Verify the account id and that the account still exists",
            FailureKind::Throttled => {
                "The provider is rate limiting requests; lower --max-workers or retry later"
            }
            FailureKind::NotInOrganization => {
                "The calling account is not part of an organization; run without --organization or set org_admin_account_id"
            }
            FailureKind::RoleNotFound => {
                "Check the configured cross_account_role name exists in the target account"
            }
            FailureKind::Timeout => {
                "An API call exceeded api_timeout_secs; raise the timeout or check regional connectivity"
            }
            FailureKind::Unknown => "Re-run with --verbose for details",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::AccessDenied => write!(f, "access_denied"),
            FailureKind::NotFound => write!(f, "not_found"),
            FailureKind::Throttled => write!(f, "throttled"),
            FailureKind::NotInOrganization => write!(f, "not_in_organization"),
            FailureKind::RoleNotFound => write!(f, "role_not_found"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for FailureKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "access_denied" | "accessdenied" => Ok(FailureKind::AccessDenied),
            "not_found" | "notfound" => Ok(FailureKind::NotFound),
            "throttled" | "throttling" => Ok(FailureKind::Throttled),
            "not_in_organization" => Ok(FailureKind::NotInOrganization),
            "role_not_found" => Ok(FailureKind::RoleNotFound),
            "timeout" => Ok(FailureKind::Timeout),
            "unknown" => Ok(FailureKind::Unknown),
            _ => Err(format!("Unknown failure kind: {}", s)),
        }
    }
}

/// Main error type for skyaudit operations
#[derive(Error, Debug)]
pub enum AuditError {
    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error with context
    #[error("Parse error in {context}: {message}")]
    Parse { context: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Classified failure from the cloud provider
    #[error("{kind} for account {}: {message}", .account_id.as_deref().unwrap_or("-"))]
    Cloud {
        kind: FailureKind,
        account_id: Option<String>,
        region: Option<String>,
        message: String,
    },

    /// The worker pool could not be created
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl AuditError {
    /// Create a classified cloud failure not yet tied to an account
    pub fn cloud(kind: FailureKind, message: impl Into<String>) -> Self {
        AuditError::Cloud {
            kind,
            account_id: None,
            region: None,
            message: message.into(),
        }
    }

    /// Tag a cloud failure with the account it pertains to
    pub fn for_account(self, account: &str) -> Self {
        match self {
            AuditError::Cloud {
                kind,
                region,
                message,
                ..
            } => AuditError::Cloud {
                kind,
                account_id: Some(account.to_string()),
                region,
                message,
            },
            other => other,
        }
    }

    /// Tag a cloud failure with the region it pertains to
    pub fn in_region(self, region: &str) -> Self {
        match self {
            AuditError::Cloud {
                kind,
                account_id,
                message,
                ..
            } => AuditError::Cloud {
                kind,
                account_id,
                region: Some(region.to_string()),
                message,
            },
            other => other,
        }
    }

    /// Failure classification; non-cloud errors are `Unknown`
    pub fn kind(&self) -> FailureKind {
        match self {
            AuditError::Cloud { kind, .. } => *kind,
            _ => FailureKind::Unknown,
        }
    }

    /// Message without the classification prefix
    pub fn detail(&self) -> String {
        match self {
            AuditError::Cloud { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        AuditError::Serialization(err.to_string())
    }
}

/// Result type alias for skyaudit operations
pub type Result<T> = std::result::Result<T, AuditError>;
