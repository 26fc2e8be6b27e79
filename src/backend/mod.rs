//! Directory backend seam.
//!
//! A [`DirectoryBackend`] opens [`DirectoryContext`]s bound to either the
//! machine account database or a domain directory. Every backend call
//! returns a raw [`BackendFault`] on failure; callers translate it through
//! [`fault::translate`] right next to the call.

mod context;
pub mod fault;
pub mod memory;

use std::fmt;

pub use context::ResolutionContext;
pub use fault::{BackendFault, FaultSite};
pub use memory::MemoryDirectory;

use crate::{
    models::{ObjectKind, Principal, PrincipalDetails},
    sid::SecurityIdentifier,
};

/// Which store a context is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContextScope {
    Machine,
    /// `None` binds to the machine's primary domain.
    Domain { name: Option<String> },
}

impl ContextScope {
    pub fn kind(&self) -> ScopeKind {
        match self {
            Self::Machine => ScopeKind::Machine,
            Self::Domain { .. } => ScopeKind::Domain,
        }
    }
}

impl fmt::Display for ContextScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Machine => write!(f, "machine"),
            Self::Domain { name: Some(name) } => write!(f, "domain '{name}'"),
            Self::Domain { name: None } => write!(f, "domain"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Machine,
    Domain,
}

/// A principal as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRecord {
    pub sid: SecurityIdentifier,
    pub name: String,
    /// Backend object class (`user`, `group`, `computer`, ...).
    pub object_class: String,
    pub details: PrincipalDetails,
}

impl BackendRecord {
    pub fn kind(&self) -> ObjectKind {
        ObjectKind::from_object_class(&self.object_class)
    }

    /// Project the record into an unclassified principal.
    pub fn into_principal(self) -> Principal {
        let kind = self.kind();
        let principal = Principal::resolved(Some(self.name), self.sid, kind);
        match self.details {
            PrincipalDetails::None => principal,
            details => principal.with_details(details),
        }
    }
}

/// Input for creating a principal. The backend assigns the SID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub name: String,
    pub kind: ObjectKind,
    pub details: PrincipalDetails,
}

/// Raw search filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub kind: Option<ObjectKind>,
    /// Case-insensitive name prefix.
    pub name_prefix: Option<String>,
}

impl SearchFilter {
    pub fn kind(kind: ObjectKind) -> Self {
        Self {
            kind: Some(kind),
            name_prefix: None,
        }
    }

    pub fn matches(&self, record: &BackendRecord) -> bool {
        if let Some(kind) = self.kind
            && record.kind() != kind
        {
            return false;
        }
        match &self.name_prefix {
            Some(prefix) => record
                .name
                .to_lowercase()
                .starts_with(&prefix.to_lowercase()),
            None => true,
        }
    }
}

/// Opens contexts against the identity stores of this host.
pub trait DirectoryBackend: Send + Sync {
    fn open_context(&self, scope: &ContextScope) -> Result<Box<dyn DirectoryContext>, BackendFault>;
}

/// An open connection to one identity store.
///
/// Dropping the context releases the underlying connection.
pub trait DirectoryContext: Send {
    fn scope(&self) -> &ContextScope;

    /// Find a principal by SID. `Ok(None)` when the store has no such SID.
    fn find_by_sid(&self, sid: &SecurityIdentifier) -> Result<Option<BackendRecord>, BackendFault>;

    /// Find a principal by exact (case-insensitive) name.
    fn find_by_name(&self, name: &str) -> Result<Option<BackendRecord>, BackendFault>;

    fn search(&self, filter: &SearchFilter) -> Result<Vec<BackendRecord>, BackendFault>;

    /// Open a cursor over the direct members of a group.
    fn open_member_cursor(
        &self,
        group: &SecurityIdentifier,
    ) -> Result<Box<dyn MemberCursor + '_>, BackendFault>;

    fn is_member(
        &self,
        group: &SecurityIdentifier,
        member: &SecurityIdentifier,
    ) -> Result<bool, BackendFault>;

    /// Add a member and persist the group.
    fn add_member(
        &self,
        group: &SecurityIdentifier,
        member: &SecurityIdentifier,
    ) -> Result<(), BackendFault>;

    /// Remove a member and persist the group.
    fn remove_member(
        &self,
        group: &SecurityIdentifier,
        member: &SecurityIdentifier,
    ) -> Result<(), BackendFault>;

    fn create(&self, record: NewRecord) -> Result<BackendRecord, BackendFault>;

    /// Replace the kind-specific attributes of a principal.
    fn update(
        &self,
        sid: &SecurityIdentifier,
        details: PrincipalDetails,
    ) -> Result<BackendRecord, BackendFault>;

    fn rename(&self, sid: &SecurityIdentifier, new_name: &str)
    -> Result<BackendRecord, BackendFault>;

    fn delete(&self, sid: &SecurityIdentifier) -> Result<(), BackendFault>;
}

/// Explicitly stepped cursor over group members.
///
/// `advance` moves to the next slot even when it fails, so a caller may
/// skip the faulted slot and advance again.
pub trait MemberCursor {
    /// Move to the next member. `Ok(false)` when exhausted.
    fn advance(&mut self) -> Result<bool, BackendFault>;

    /// Translate the member at the current position.
    fn current(&self) -> Result<BackendRecord, BackendFault>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GroupAttributes, UserAttributes};

    fn record(name: &str, class: &str) -> BackendRecord {
        BackendRecord {
            sid: "S-1-5-21-1-2-3-1001".parse().unwrap(),
            name: name.into(),
            object_class: class.into(),
            details: PrincipalDetails::None,
        }
    }

    #[test]
    fn test_filter_matches_kind_and_prefix() {
        let filter = SearchFilter {
            kind: Some(ObjectKind::User),
            name_prefix: Some("AL".into()),
        };
        assert!(filter.matches(&record("alice", "user")));
        assert!(!filter.matches(&record("alice", "group")));
        assert!(!filter.matches(&record("bob", "user")));
        assert!(SearchFilter::default().matches(&record("PC01$", "computer")));
    }

    #[test]
    fn test_into_principal_keeps_details() {
        let mut user = record("alice", "User");
        user.details = PrincipalDetails::User(UserAttributes {
            description: Some("Build engineer".into()),
            ..Default::default()
        });
        let principal = user.into_principal();
        assert_eq!(principal.kind(), ObjectKind::User);
        assert_eq!(principal.description(), Some("Build engineer"));

        let computer = record("PC01$", "computer").into_principal();
        assert_eq!(computer.kind(), ObjectKind::Other);

        let group = record("Engineering", "group").into_principal();
        assert_eq!(group.group(), Some(&GroupAttributes::default()));
    }

    #[test]
    fn test_scope_display() {
        assert_eq!(ContextScope::Machine.to_string(), "machine");
        assert_eq!(
            ContextScope::Domain {
                name: Some("CORP".into())
            }
            .to_string(),
            "domain 'CORP'"
        );
        assert_eq!(ContextScope::Domain { name: None }.kind(), ScopeKind::Domain);
    }
}
