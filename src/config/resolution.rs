use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::models::Selector;

/// How principals are resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct ResolutionConfig {
    /// Fall back to the domain context when a member is not found on the
    /// machine. On a host without a domain the fallback finds nothing.
    #[serde(default = "default_true")]
    pub domain_fallback: bool,

    /// Domain to bind the domain context to. Defaults to the machine's
    /// primary domain.
    #[serde(default)]
    pub domain: Option<String>,

    /// Accept two-letter well-known aliases (e.g. `BA`) as identifiers when
    /// parsing caller input with [`ResolutionConfig::selector`].
    #[serde(default)]
    pub allow_well_known_aliases: bool,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            domain_fallback: true,
            domain: None,
            allow_well_known_aliases: false,
        }
    }
}

impl ResolutionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(domain) = &self.domain
            && domain.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "resolution.domain cannot be empty; omit it to use the primary domain".into(),
            ));
        }
        Ok(())
    }

    /// Interpret caller input as a SID or a name under this policy.
    pub fn selector(&self, text: &str) -> Selector {
        Selector::parse(text, self.allow_well_known_aliases)
    }
}

/// Account-type classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct ClassificationConfig {
    /// Classify resolved principals. When off, every result is
    /// "not determined".
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Oldest OS major version with the native account-type facility.
    #[serde(default = "default_min_os_major_version")]
    pub min_os_major_version: u32,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_os_major_version: default_min_os_major_version(),
        }
    }
}

impl ClassificationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_os_major_version == 0 {
            return Err(ConfigError::Validation(
                "classification.min_os_major_version must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_min_os_major_version() -> u32 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sid::SecurityIdentifier;

    #[test]
    fn test_selector_follows_alias_policy() {
        let mut config = ResolutionConfig::default();
        assert_eq!(config.selector("BA"), Selector::Name("BA".into()));

        config.allow_well_known_aliases = true;
        let administrators: SecurityIdentifier = "S-1-5-32-544".parse().unwrap();
        assert_eq!(config.selector("BA"), Selector::Sid(administrators));
    }

    #[test]
    fn test_selector_always_accepts_sid_text() {
        let config = ResolutionConfig::default();
        assert!(matches!(
            config.selector("S-1-5-21-1-2-3-1001"),
            Selector::Sid(_)
        ));
        assert_eq!(config.selector("alice"), Selector::Name("alice".into()));
    }
}
