use std::fmt;

use thiserror::Error;

use crate::error::AccountError;

/// Raw fault reported by a directory backend.
///
/// Carries the native status code. Only [`translate`] interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({code:#010x})")]
pub struct BackendFault {
    pub code: u32,
    pub message: String,
}

impl BackendFault {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Native status codes recognised by [`translate`].
pub mod codes {
    pub const ERROR_BAD_NETPATH: u32 = 53;
    pub const ERROR_ACCESS_DENIED: u32 = 5;
    pub const E_ACCESSDENIED: u32 = 0x8007_0005;

    pub const ERROR_USER_EXISTS: u32 = 1316;
    pub const ERROR_NO_SUCH_USER: u32 = 1317;
    pub const ERROR_GROUP_EXISTS: u32 = 1318;
    pub const ERROR_NO_SUCH_GROUP: u32 = 1319;
    pub const ERROR_INVALID_ACCOUNT_NAME: u32 = 1315;
    pub const ERROR_NONE_MAPPED: u32 = 1332;
    pub const ERROR_NO_SUCH_DOMAIN: u32 = 1355;
    pub const ERROR_NO_SUCH_ALIAS: u32 = 1376;
    pub const ERROR_MEMBER_NOT_IN_ALIAS: u32 = 1377;
    pub const ERROR_MEMBER_IN_ALIAS: u32 = 1378;
    pub const ERROR_ALIAS_EXISTS: u32 = 1379;
    pub const ERROR_NO_SUCH_MEMBER: u32 = 1387;
    pub const RPC_S_SERVER_UNAVAILABLE: u32 = 1722;
    pub const ERROR_DOMAIN_CONTROLLER_NOT_FOUND: u32 = 1908;

    pub const NERR_BAD_USERNAME: u32 = 2202;
    pub const NERR_GROUP_NOT_FOUND: u32 = 2220;
    pub const NERR_USER_NOT_FOUND: u32 = 2221;
    pub const NERR_GROUP_EXISTS: u32 = 2223;
    pub const NERR_USER_EXISTS: u32 = 2224;

    /// LDAP "server is not operational" surfaced as an HRESULT.
    pub const E_LDAP_SERVER_DOWN: u32 = 0x8007_203A;
}

/// Where a fault was raised. Some codes mean different things at
/// different call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultSite<'a> {
    Lookup { target: &'a str },
    OpenContext { scope: &'a str },
    EnumerateAdvance { group: &'a str },
    EnumerateTranslate { group: &'a str },
    AddMember { group: &'a str, member: &'a str },
    RemoveMember { group: &'a str, member: &'a str },
    Create { name: &'a str },
    Rename { new_name: &'a str },
    Update { target: &'a str },
    Delete { target: &'a str },
}

impl FaultSite<'_> {
    /// The object the failing call was about.
    fn subject(&self) -> &str {
        match *self {
            Self::Lookup { target } | Self::Update { target } | Self::Delete { target } => target,
            Self::OpenContext { scope } => scope,
            Self::EnumerateAdvance { group } | Self::EnumerateTranslate { group } => group,
            Self::AddMember { member, .. } | Self::RemoveMember { member, .. } => member,
            Self::Create { name } => name,
            Self::Rename { new_name } => new_name,
        }
    }

    fn membership(&self) -> Option<(&str, &str)> {
        match *self {
            Self::AddMember { group, member } | Self::RemoveMember { group, member } => {
                Some((group, member))
            }
            _ => None,
        }
    }
}

impl fmt::Display for FaultSite<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lookup { target } => write!(f, "looking up '{target}'"),
            Self::OpenContext { scope } => write!(f, "opening {scope} context"),
            Self::EnumerateAdvance { group } => write!(f, "reading members of '{group}'"),
            Self::EnumerateTranslate { group } => {
                write!(f, "translating a member of '{group}'")
            }
            Self::AddMember { group, member } => write!(f, "adding '{member}' to '{group}'"),
            Self::RemoveMember { group, member } => {
                write!(f, "removing '{member}' from '{group}'")
            }
            Self::Create { name } => write!(f, "creating '{name}'"),
            Self::Rename { new_name } => write!(f, "renaming to '{new_name}'"),
            Self::Update { target } => write!(f, "updating '{target}'"),
            Self::Delete { target } => write!(f, "deleting '{target}'"),
        }
    }
}

/// Translate a backend fault into the crate's error taxonomy.
///
/// This is the only place numeric backend codes are inspected.
pub fn translate(fault: BackendFault, site: FaultSite<'_>) -> AccountError {
    use codes::*;

    let subject = site.subject().to_string();
    match fault.code {
        ERROR_ACCESS_DENIED | E_ACCESSDENIED => AccountError::AccessDenied {
            detail: format!("{site}: {}", fault.message),
        },

        // No domain store at all: the scope simply holds nothing.
        ERROR_NO_SUCH_DOMAIN if matches!(site, FaultSite::OpenContext { .. }) => {
            AccountError::not_found(subject)
        }

        RPC_S_SERVER_UNAVAILABLE
        | ERROR_NO_SUCH_DOMAIN
        | ERROR_DOMAIN_CONTROLLER_NOT_FOUND
        | ERROR_BAD_NETPATH
        | E_LDAP_SERVER_DOWN => AccountError::BackendUnavailable {
            detail: format!("{site}: {}", fault.message),
        },

        ERROR_MEMBER_IN_ALIAS => match site.membership() {
            Some((group, member)) => AccountError::MemberExists {
                group: group.to_string(),
                member: member.to_string(),
            },
            None => AccountError::already_exists(subject),
        },

        ERROR_MEMBER_NOT_IN_ALIAS => match site.membership() {
            Some((group, member)) => AccountError::MemberNotFound {
                group: group.to_string(),
                member: member.to_string(),
            },
            None => AccountError::not_found(subject),
        },

        ERROR_ALIAS_EXISTS | ERROR_USER_EXISTS | ERROR_GROUP_EXISTS | NERR_USER_EXISTS
        | NERR_GROUP_EXISTS => match site {
            FaultSite::Rename { new_name } => AccountError::NameInUse {
                name: new_name.to_string(),
            },
            _ => AccountError::already_exists(subject),
        },

        ERROR_INVALID_ACCOUNT_NAME | NERR_BAD_USERNAME => {
            AccountError::invalid_name(subject, fault.message)
        }

        ERROR_NONE_MAPPED | ERROR_NO_SUCH_MEMBER | ERROR_NO_SUCH_USER | ERROR_NO_SUCH_GROUP
        | ERROR_NO_SUCH_ALIAS | NERR_USER_NOT_FOUND | NERR_GROUP_NOT_FOUND => {
            AccountError::not_found(subject)
        }

        code => AccountError::Backend {
            code,
            detail: format!("{site}: {}", fault.message),
        },
    }
}
