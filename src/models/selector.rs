use std::fmt;

use super::Principal;
use crate::sid::{SecurityIdentifier, try_parse_identifier};

/// What the caller wants resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Sid(SecurityIdentifier),
    /// Exact account name, optionally `DOMAIN\name` qualified.
    Name(String),
    /// A principal from an earlier call. Its SID wins over its name.
    Principal(Principal),
}

/// How a selector will be looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKey<'a> {
    Sid(&'a SecurityIdentifier),
    Name(&'a str),
}

impl Selector {
    /// Classify raw caller input as a SID or a name.
    ///
    /// This is the command layer's decision, made before resolution; the
    /// resolver itself never reinterprets a name as a SID.
    pub fn parse(text: &str, allow_well_known_aliases: bool) -> Self {
        match try_parse_identifier(text, allow_well_known_aliases) {
            Some(sid) => Self::Sid(sid),
            None => Self::Name(text.to_string()),
        }
    }

    /// The key used for lookup. A principal carrying both a SID and a name
    /// is looked up by SID.
    pub fn lookup_key(&self) -> Option<LookupKey<'_>> {
        match self {
            Self::Sid(sid) => Some(LookupKey::Sid(sid)),
            Self::Name(name) if name.is_empty() => None,
            Self::Name(name) => Some(LookupKey::Name(name)),
            Self::Principal(principal) => match (principal.sid(), principal.name()) {
                (Some(sid), _) => Some(LookupKey::Sid(sid)),
                (None, Some(name)) => Some(LookupKey::Name(name)),
                (None, None) => None,
            },
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sid(sid) => write!(f, "{sid}"),
            Self::Name(name) => write!(f, "{name}"),
            Self::Principal(principal) => write!(f, "{principal}"),
        }
    }
}

impl From<SecurityIdentifier> for Selector {
    fn from(sid: SecurityIdentifier) -> Self {
        Self::Sid(sid)
    }
}

impl From<Principal> for Selector {
    fn from(principal: Principal) -> Self {
        Self::Principal(principal)
    }
}

impl From<&Principal> for Selector {
    fn from(principal: &Principal) -> Self {
        Self::Principal(principal.clone())
    }
}

impl From<&str> for Selector {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

/// Split `DOMAIN\name` into its parts. Unqualified names have no domain.
pub fn split_qualified_name(name: &str) -> (Option<&str>, &str) {
    match name.split_once('\\') {
        Some((domain, account)) => (Some(domain), account),
        None => (None, name),
    }
}
