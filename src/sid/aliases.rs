//! SDDL well-known SID aliases.
//!
//! Only machine-independent aliases are listed. Domain-relative aliases
//! (`DA`, `DU`, `EA`, ...) need the domain SID and are resolved by the
//! directory, not here.

use super::SecurityIdentifier;

/// `(alias, SID string)` pairs accepted when aliases are enabled.
pub const WELL_KNOWN_ALIASES: &[(&str, &str)] = &[
    ("AC", "S-1-15-2-1"),
    ("AN", "S-1-5-7"),
    ("AO", "S-1-5-32-548"),
    ("AU", "S-1-5-11"),
    ("BA", "S-1-5-32-544"),
    ("BG", "S-1-5-32-546"),
    ("BO", "S-1-5-32-551"),
    ("BU", "S-1-5-32-545"),
    ("CG", "S-1-3-1"),
    ("CO", "S-1-3-0"),
    ("CY", "S-1-5-32-569"),
    ("ER", "S-1-5-32-573"),
    ("HA", "S-1-5-32-578"),
    ("HI", "S-1-16-12288"),
    ("IS", "S-1-5-32-568"),
    ("IU", "S-1-5-4"),
    ("LS", "S-1-5-19"),
    ("LU", "S-1-5-32-559"),
    ("LW", "S-1-16-4096"),
    ("ME", "S-1-16-8192"),
    ("MU", "S-1-5-32-558"),
    ("NO", "S-1-5-32-556"),
    ("NS", "S-1-5-20"),
    ("NU", "S-1-5-2"),
    ("OW", "S-1-3-4"),
    ("PO", "S-1-5-32-550"),
    ("PS", "S-1-5-10"),
    ("PU", "S-1-5-32-547"),
    ("RC", "S-1-5-12"),
    ("RD", "S-1-5-32-555"),
    ("RE", "S-1-5-32-552"),
    ("RM", "S-1-5-32-580"),
    ("RU", "S-1-5-32-554"),
    ("SI", "S-1-16-16384"),
    ("SO", "S-1-5-32-549"),
    ("SU", "S-1-5-6"),
    ("SY", "S-1-5-18"),
    ("WD", "S-1-1-0"),
];

/// Look up a two-letter alias, case-insensitively.
pub fn lookup_alias(alias: &str) -> Option<SecurityIdentifier> {
    if alias.len() != 2 {
        return None;
    }
    WELL_KNOWN_ALIASES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(alias))
        .and_then(|(_, sid)| sid.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_alias_parses() {
        for (alias, sid) in WELL_KNOWN_ALIASES {
            let parsed = lookup_alias(alias).unwrap_or_else(|| panic!("alias {alias} failed"));
            assert_eq!(parsed.to_string(), *sid);
        }
    }

    #[test]
    fn test_unknown_alias() {
        assert!(lookup_alias("ZZ").is_none());
        assert!(lookup_alias("BAA").is_none());
        assert!(lookup_alias("").is_none());
    }
}
