//! Security identifiers.
//!
//! A [`SecurityIdentifier`] is the value form of a Windows SID: a revision,
//! a 48-bit identifier authority and up to 15 sub-authorities. It converts
//! to and from the `S-1-...` string form and the self-relative binary form
//! that native account APIs consume.
//!
//! [`try_parse_identifier`] is the gate the command layer uses to decide
//! whether user input names an account or identifies one by SID.

mod aliases;

use std::{fmt, str::FromStr};

pub use aliases::{WELL_KNOWN_ALIASES, lookup_alias};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Only revision 1 SIDs exist in practice; native parsers reject anything else.
pub const SID_REVISION: u8 = 1;

/// Upper bound on sub-authorities (`SID_MAX_SUB_AUTHORITIES`).
pub const MAX_SUB_AUTHORITIES: usize = 15;

/// Identifier authority of the NT authority (`S-1-5`).
pub const NT_AUTHORITY: u64 = 5;

/// Identifier authority used for Microsoft accounts (`S-1-11`).
pub const MICROSOFT_ACCOUNT_AUTHORITY: u64 = 11;

/// Identifier authority used for Azure AD accounts (`S-1-12`).
pub const AZURE_AD_AUTHORITY: u64 = 12;

const MAX_AUTHORITY: u64 = (1 << 48) - 1;
const PREFIX: &str = "S-1-";

/// Error returned when a SID string or buffer is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SidParseError {
    #[error("SID must start with '{PREFIX}'")]
    MissingPrefix,

    #[error("invalid identifier authority '{0}'")]
    InvalidAuthority(String),

    #[error("invalid sub-authority '{0}'")]
    InvalidSubAuthority(String),

    #[error("SID has {0} sub-authorities, maximum is {MAX_SUB_AUTHORITIES}")]
    TooManySubAuthorities(usize),

    #[error("binary SID is truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("unsupported SID revision {0}")]
    UnsupportedRevision(u8),
}

/// A parsed security identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SecurityIdentifier {
    authority: u64,
    sub_authorities: Vec<u32>,
}

impl SecurityIdentifier {
    /// Build a SID from its authority and sub-authorities.
    pub fn new(authority: u64, sub_authorities: Vec<u32>) -> Result<Self, SidParseError> {
        if authority > MAX_AUTHORITY {
            return Err(SidParseError::InvalidAuthority(authority.to_string()));
        }
        if sub_authorities.len() > MAX_SUB_AUTHORITIES {
            return Err(SidParseError::TooManySubAuthorities(sub_authorities.len()));
        }
        Ok(Self {
            authority,
            sub_authorities,
        })
    }

    pub fn identifier_authority(&self) -> u64 {
        self.authority
    }

    pub fn sub_authorities(&self) -> &[u32] {
        &self.sub_authorities
    }

    /// The relative identifier: the last sub-authority.
    pub fn rid(&self) -> Option<u32> {
        self.sub_authorities.last().copied()
    }

    /// The SID with its RID removed, i.e. the issuing domain's SID.
    ///
    /// Returns `None` for SIDs without sub-authorities.
    pub fn domain(&self) -> Option<SecurityIdentifier> {
        let (_, rest) = self.sub_authorities.split_last()?;
        Some(Self {
            authority: self.authority,
            sub_authorities: rest.to_vec(),
        })
    }

    /// Whether this SID lives under `domain` with exactly one extra RID.
    pub fn is_in_domain(&self, domain: &SecurityIdentifier) -> bool {
        self.domain().as_ref() == Some(domain)
    }

    /// Length of the binary form in bytes.
    pub fn binary_len(&self) -> usize {
        8 + 4 * self.sub_authorities.len()
    }

    /// Encode to the self-relative binary layout used by native APIs.
    ///
    /// Layout: revision (u8), sub-authority count (u8), authority as a
    /// 48-bit big-endian value, then each sub-authority as little-endian u32.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.binary_len());
        out.push(SID_REVISION);
        out.push(self.sub_authorities.len() as u8);
        out.extend_from_slice(&self.authority.to_be_bytes()[2..]);
        for sub in &self.sub_authorities {
            out.extend_from_slice(&sub.to_le_bytes());
        }
        out
    }

    /// Decode the self-relative binary layout.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SidParseError> {
        if bytes.len() < 8 {
            return Err(SidParseError::Truncated {
                expected: 8,
                actual: bytes.len(),
            });
        }
        if bytes[0] != SID_REVISION {
            return Err(SidParseError::UnsupportedRevision(bytes[0]));
        }
        let count = bytes[1] as usize;
        if count > MAX_SUB_AUTHORITIES {
            return Err(SidParseError::TooManySubAuthorities(count));
        }
        let expected = 8 + 4 * count;
        if bytes.len() < expected {
            return Err(SidParseError::Truncated {
                expected,
                actual: bytes.len(),
            });
        }

        let mut authority_bytes = [0u8; 8];
        authority_bytes[2..].copy_from_slice(&bytes[2..8]);
        let authority = u64::from_be_bytes(authority_bytes);

        let sub_authorities = bytes[8..expected]
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Ok(Self {
            authority,
            sub_authorities,
        })
    }
}

impl FromStr for SecurityIdentifier {
    type Err = SidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix(PREFIX).ok_or(SidParseError::MissingPrefix)?;
        let mut parts = rest.split('-');

        let authority = match parts.next() {
            Some(hex) if hex.starts_with("0x") || hex.starts_with("0X") => {
                u64::from_str_radix(&hex[2..], 16)
                    .map_err(|_| SidParseError::InvalidAuthority(hex.to_string()))?
            }
            Some(dec) if !dec.is_empty() && dec.bytes().all(|b| b.is_ascii_digit()) => dec
                .parse()
                .map_err(|_| SidParseError::InvalidAuthority(dec.to_string()))?,
            Some(other) => return Err(SidParseError::InvalidAuthority(other.to_string())),
            None => return Err(SidParseError::InvalidAuthority(String::new())),
        };

        let sub_authorities = parts
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(SidParseError::InvalidSubAuthority(part.to_string()));
                }
                part.parse::<u32>()
                    .map_err(|_| SidParseError::InvalidSubAuthority(part.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(authority, sub_authorities)
    }
}

impl fmt::Display for SecurityIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // MS-DTYP 2.4.2.1: authorities that do not fit in 32 bits print as hex.
        write!(f, "S-{SID_REVISION}-")?;
        if self.authority >> 32 == 0 {
            write!(f, "{}", self.authority)?;
        } else {
            write!(f, "0x{:012X}", self.authority)?;
        }
        for sub in &self.sub_authorities {
            write!(f, "-{sub}")?;
        }
        Ok(())
    }
}

impl Serialize for SecurityIdentifier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SecurityIdentifier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Decide whether `text` is a security identifier.
///
/// Only text that starts with `S-` followed by a digit is considered; this is
/// stricter than "looks numeric" so that account names are never mistaken
/// for SIDs. With `allow_well_known_aliases`, two-letter SDDL aliases such as
/// `BA` are also accepted. They are off by default because they collide with
/// short group names.
///
/// Never fails: anything that does not parse yields `None`.
pub fn try_parse_identifier(text: &str, allow_well_known_aliases: bool) -> Option<SecurityIdentifier> {
    if allow_well_known_aliases && let Some(sid) = lookup_alias(text) {
        return Some(sid);
    }

    let bytes = text.as_bytes();
    if bytes.len() < 3 || !text.starts_with("S-") || !bytes[2].is_ascii_digit() {
        return None;
    }

    text.parse().ok()
}
