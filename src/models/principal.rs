use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sid::SecurityIdentifier;

/// Concrete kind of directory object behind a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    User,
    Group,
    /// Any object class that is not explicitly recognised (computers,
    /// foreign security principals, ...).
    Other,
}

impl ObjectKind {
    /// Map a backend object class to a kind.
    pub fn from_object_class(class: &str) -> Self {
        if class.eq_ignore_ascii_case("user") {
            Self::User
        } else if class.eq_ignore_ascii_case("group") {
            Self::Group
        } else {
            Self::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which backend authoritatively owns a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalSource {
    /// Local machine account database.
    Local,
    /// On-premises Active Directory domain.
    ActiveDirectory,
    /// Consumer Microsoft account connected to this machine.
    MicrosoftAccount,
    /// Azure AD (Entra ID) account.
    #[serde(rename = "azure_ad")]
    AzureAd,
    /// The classifier ran but could not place the account.
    Unknown,
    /// Classification was not attempted or not possible on this host.
    #[default]
    Unresolved,
}

impl PrincipalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::ActiveDirectory => "active_directory",
            Self::MicrosoftAccount => "microsoft_account",
            Self::AzureAd => "azure_ad",
            Self::Unknown => "unknown",
            Self::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for PrincipalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Password metadata for a user account. Never carries the password itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordInfo {
    pub last_set: Option<DateTime<Utc>>,
    /// Earliest time the user may change the password.
    pub changeable_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub required: bool,
    pub user_may_change: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAttributes {
    pub enabled: bool,
    pub full_name: Option<String>,
    pub description: Option<String>,
    /// `None` means the account never expires.
    pub account_expires: Option<DateTime<Utc>>,
    pub last_logon: Option<DateTime<Utc>>,
    #[serde(default)]
    pub password: PasswordInfo,
}

impl Default for UserAttributes {
    fn default() -> Self {
        Self {
            enabled: true,
            full_name: None,
            description: None,
            account_expires: None,
            last_logon: None,
            password: PasswordInfo::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAttributes {
    pub description: Option<String>,
}

/// Kind-specific attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PrincipalDetails {
    User(UserAttributes),
    Group(GroupAttributes),
    #[default]
    None,
}

/// A single user, group or other security principal.
///
/// A principal always carries a name, a SID, or both. Once a SID is attached
/// it cannot be replaced; the only way to get a principal with a different
/// SID is to resolve a new one. Two principals denote the same account when
/// their SIDs are equal (see [`Principal::same_identity`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PrincipalFields")]
pub struct Principal {
    name: Option<String>,
    sid: Option<SecurityIdentifier>,
    kind: ObjectKind,
    source: PrincipalSource,
    details: PrincipalDetails,
}

/// Wire form of [`Principal`], checked before it becomes one.
#[derive(Deserialize)]
struct PrincipalFields {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    sid: Option<SecurityIdentifier>,
    kind: ObjectKind,
    source: PrincipalSource,
    #[serde(default)]
    details: PrincipalDetails,
}

impl TryFrom<PrincipalFields> for Principal {
    type Error = &'static str;

    fn try_from(fields: PrincipalFields) -> Result<Self, Self::Error> {
        let name = fields.name.filter(|n| !n.is_empty());
        if name.is_none() && fields.sid.is_none() {
            return Err("a principal needs a name or a sid");
        }
        Ok(Self {
            name,
            sid: fields.sid,
            kind: fields.kind,
            source: fields.source,
            details: fields.details,
        })
    }
}

impl Principal {
    /// A resolved principal.
    pub fn resolved(name: Option<String>, sid: SecurityIdentifier, kind: ObjectKind) -> Self {
        let details = match kind {
            ObjectKind::User => PrincipalDetails::User(UserAttributes::default()),
            ObjectKind::Group => PrincipalDetails::Group(GroupAttributes::default()),
            ObjectKind::Other => PrincipalDetails::None,
        };
        Self {
            name: name.filter(|n| !n.is_empty()),
            sid: Some(sid),
            kind,
            source: PrincipalSource::Unresolved,
            details,
        }
    }

    /// An unresolved reference by name. Returns `None` for an empty name.
    pub fn from_name(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: Some(name),
            sid: None,
            kind: ObjectKind::Other,
            source: PrincipalSource::Unresolved,
            details: PrincipalDetails::None,
        })
    }

    /// An unresolved reference by SID.
    pub fn from_sid(sid: SecurityIdentifier) -> Self {
        Self {
            name: None,
            sid: Some(sid),
            kind: ObjectKind::Other,
            source: PrincipalSource::Unresolved,
            details: PrincipalDetails::None,
        }
    }

    pub fn with_source(mut self, source: PrincipalSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_details(mut self, details: PrincipalDetails) -> Self {
        self.details = details;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn sid(&self) -> Option<&SecurityIdentifier> {
        self.sid.as_ref()
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn source(&self) -> PrincipalSource {
        self.source
    }

    pub fn details(&self) -> &PrincipalDetails {
        &self.details
    }

    pub fn user(&self) -> Option<&UserAttributes> {
        match &self.details {
            PrincipalDetails::User(user) => Some(user),
            _ => None,
        }
    }

    pub fn group(&self) -> Option<&GroupAttributes> {
        match &self.details {
            PrincipalDetails::Group(group) => Some(group),
            _ => None,
        }
    }

    pub fn is_group(&self) -> bool {
        self.kind == ObjectKind::Group
    }

    /// Description of either kind, if any.
    pub fn description(&self) -> Option<&str> {
        match &self.details {
            PrincipalDetails::User(user) => user.description.as_deref(),
            PrincipalDetails::Group(group) => group.description.as_deref(),
            PrincipalDetails::None => None,
        }
    }

    /// Whether both principals carry the same SID.
    ///
    /// Principals without a SID never share an identity.
    pub fn same_identity(&self, other: &Principal) -> bool {
        matches!((&self.sid, &other.sid), (Some(a), Some(b)) if a == b)
    }

    /// Best human-readable label: the name, else the SID string.
    pub fn display_label(&self) -> String {
        match (&self.name, &self.sid) {
            (Some(name), _) => name.clone(),
            (None, Some(sid)) => sid.to_string(),
            (None, None) => String::from("<anonymous>"),
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_label())
    }
}
