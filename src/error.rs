use std::fmt;

use thiserror::Error;

/// Errors surfaced by resolution, enumeration and mutation.
///
/// Backend faults are translated into this type at a single boundary
/// (`backend::fault::translate`); nothing above the backend looks at
/// native error codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("{target} was not found")]
    NotFound { target: String },

    #[error("{target} already exists")]
    AlreadyExists { target: String },

    #[error("'{member}' is already a member of group '{group}'")]
    MemberExists { group: String, member: String },

    #[error("'{member}' is not a member of group '{group}'")]
    MemberNotFound { group: String, member: String },

    #[error("Access denied: {detail}")]
    AccessDenied { detail: String },

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("The name '{name}' is already in use")]
    NameInUse { name: String },

    #[error("Directory backend unavailable: {detail}")]
    BackendUnavailable { detail: String },

    #[error("Directory backend error {code:#010x}: {detail}")]
    Backend { code: u32, detail: String },
}

/// Coarse error taxonomy used for batch policy and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    AccessDenied,
    InvalidName,
    NameInUse,
    BackendUnavailable,
    Backend,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::AccessDenied => "access_denied",
            ErrorKind::InvalidName => "invalid_name",
            ErrorKind::NameInUse => "name_in_use",
            ErrorKind::BackendUnavailable => "backend_unavailable",
            ErrorKind::Backend => "backend",
        };
        write!(f, "{s}")
    }
}

impl AccountError {
    pub fn not_found(target: impl Into<String>) -> Self {
        Self::NotFound {
            target: target.into(),
        }
    }

    pub fn already_exists(target: impl Into<String>) -> Self {
        Self::AlreadyExists {
            target: target.into(),
        }
    }

    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::MemberNotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } | Self::MemberExists { .. } => ErrorKind::AlreadyExists,
            Self::AccessDenied { .. } => ErrorKind::AccessDenied,
            Self::InvalidName { .. } => ErrorKind::InvalidName,
            Self::NameInUse { .. } => ErrorKind::NameInUse,
            Self::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            Self::Backend { .. } => ErrorKind::Backend,
        }
    }

    /// Fatal errors abort the whole top-level operation, including the rest
    /// of a batch: retrying other items under the same credentials or the
    /// same dead backend cannot succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::AccessDenied | ErrorKind::BackendUnavailable
        )
    }
}

/// Result type for account operations
pub type AccountResult<T> = Result<T, AccountError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_collapses_membership_variants() {
        let exists = AccountError::MemberExists {
            group: "Engineering".into(),
            member: "alice".into(),
        };
        assert_eq!(exists.kind(), ErrorKind::AlreadyExists);

        let missing = AccountError::MemberNotFound {
            group: "Engineering".into(),
            member: "bob".into(),
        };
        assert_eq!(missing.kind(), ErrorKind::NotFound);
        assert!(!missing.is_fatal());
    }

    #[test]
    fn test_only_access_and_availability_are_fatal() {
        assert!(
            AccountError::AccessDenied {
                detail: "save".into()
            }
            .is_fatal()
        );
        assert!(
            AccountError::BackendUnavailable {
                detail: "rpc".into()
            }
            .is_fatal()
        );
        assert!(!AccountError::not_found("user 'bob'").is_fatal());
        assert!(!AccountError::invalid_name("a/b", "illegal").is_fatal());
        assert!(
            !AccountError::Backend {
                code: 31,
                detail: "general failure".into()
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            AccountError::not_found("user 'bob'").to_string(),
            "user 'bob' was not found"
        );
        assert_eq!(
            AccountError::Backend {
                code: 0x1f,
                detail: "general failure".into()
            }
            .to_string(),
            "Directory backend error 0x0000001f: general failure"
        );
    }
}
