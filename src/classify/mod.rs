//! Account-type classification.
//!
//! Asks the host's native facility which store owns an account. Hosts
//! older than the facility get [`Classification::NotDetermined`]; any
//! failure of the facility itself degrades to
//! [`PrincipalSource::Unknown`] and never surfaces as an error.

mod native;

use std::sync::Arc;

pub use native::NativeFacility;
use tracing::debug;

use crate::{
    config::ClassificationConfig,
    models::{Principal, PrincipalSource},
    sid::{MICROSOFT_ACCOUNT_AUTHORITY, SecurityIdentifier},
};

/// Account-type codes returned by the native facility.
pub mod account_type {
    pub const UNKNOWN: u32 = 0;
    pub const LOCAL_USER: u32 = 1;
    pub const PRIMARY_DOMAIN_USER: u32 = 2;
    pub const EXTERNAL_DOMAIN_USER: u32 = 3;
    pub const LOCAL_CONNECTED_USER: u32 = 4;
    pub const AAD_USER: u32 = 5;
    pub const INTERNET_USER: u32 = 6;
    /// Reserved for Microsoft accounts; not returned by current builds.
    pub const MSA_USER: u32 = 7;
}

/// The native account-type lookup.
pub trait AccountTypeFacility: Send + Sync {
    /// Host OS major version.
    fn os_major_version(&self) -> u32;

    /// Look up the account type of a SID in binary form.
    ///
    /// `Err` carries the native status code.
    fn lookup_account_type(&self, sid: &[u8]) -> Result<u32, i32>;
}

/// Outcome of classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Determined(PrincipalSource),
    /// The facility is not available on this host. This is not an error.
    NotDetermined,
}

impl Classification {
    pub fn is_determined(&self) -> bool {
        matches!(self, Self::Determined(_))
    }

    /// The source to record on a principal.
    pub fn source(&self) -> PrincipalSource {
        match self {
            Self::Determined(source) => *source,
            Self::NotDetermined => PrincipalSource::Unresolved,
        }
    }
}

/// Stateless classifier over an [`AccountTypeFacility`].
#[derive(Clone)]
pub struct AccountTypeClassifier {
    facility: Arc<dyn AccountTypeFacility>,
    enabled: bool,
    min_os_major_version: u32,
}

impl AccountTypeClassifier {
    pub fn new(facility: Arc<dyn AccountTypeFacility>, config: &ClassificationConfig) -> Self {
        Self {
            facility,
            enabled: config.enabled,
            min_os_major_version: config.min_os_major_version,
        }
    }

    /// Classifier backed by the host's native facility.
    pub fn native(config: &ClassificationConfig) -> Self {
        Self::new(Arc::new(NativeFacility), config)
    }

    pub fn classify(&self, sid: &SecurityIdentifier) -> Classification {
        if !self.enabled {
            return Classification::NotDetermined;
        }

        let version = self.facility.os_major_version();
        if version < self.min_os_major_version {
            debug!(
                os_major_version = version,
                required = self.min_os_major_version,
                "Account type facility unavailable on this host"
            );
            return Classification::NotDetermined;
        }

        let source = match self.facility.lookup_account_type(&sid.to_bytes()) {
            Ok(code) => source_for(code, sid),
            Err(status) => {
                debug!(sid = %sid, status, "Account type lookup failed");
                PrincipalSource::Unknown
            }
        };
        Classification::Determined(source)
    }

    /// Annotate a principal with its classification. Principals without a
    /// SID are returned unchanged.
    pub fn annotate(&self, principal: Principal) -> Principal {
        match principal.sid() {
            Some(sid) => {
                let source = self.classify(sid).source();
                principal.with_source(source)
            }
            None => principal,
        }
    }
}

impl std::fmt::Debug for AccountTypeClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountTypeClassifier")
            .field("enabled", &self.enabled)
            .field("min_os_major_version", &self.min_os_major_version)
            .finish_non_exhaustive()
    }
}

fn source_for(code: u32, sid: &SecurityIdentifier) -> PrincipalSource {
    use account_type::*;

    match code {
        LOCAL_USER => PrincipalSource::Local,
        PRIMARY_DOMAIN_USER | EXTERNAL_DOMAIN_USER => PrincipalSource::ActiveDirectory,
        LOCAL_CONNECTED_USER | MSA_USER => PrincipalSource::MicrosoftAccount,
        AAD_USER => PrincipalSource::AzureAd,
        INTERNET_USER => internet_user_source(sid),
        _ => PrincipalSource::Unknown,
    }
}

/// Internet users are either consumer Microsoft accounts or something we
/// cannot place. Microsoft accounts are issued under their own identifier
/// authority. Best effort only.
fn internet_user_source(sid: &SecurityIdentifier) -> PrincipalSource {
    if sid.identifier_authority() == MICROSOFT_ACCOUNT_AUTHORITY {
        PrincipalSource::MicrosoftAccount
    } else {
        PrincipalSource::Unknown
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use super::*;

    /// Facility answering from a fixed table.
    pub struct ScriptedFacility {
        pub version: u32,
        pub types: HashMap<SecurityIdentifier, Result<u32, i32>>,
    }

    impl ScriptedFacility {
        pub fn new(version: u32) -> Self {
            Self {
                version,
                types: HashMap::new(),
            }
        }

        pub fn with(mut self, sid: &SecurityIdentifier, code: u32) -> Self {
            self.types.insert(sid.clone(), Ok(code));
            self
        }

        pub fn failing(mut self, sid: &SecurityIdentifier, status: i32) -> Self {
            self.types.insert(sid.clone(), Err(status));
            self
        }
    }

    impl AccountTypeFacility for ScriptedFacility {
        fn os_major_version(&self) -> u32 {
            self.version
        }

        fn lookup_account_type(&self, sid: &[u8]) -> Result<u32, i32> {
            let sid = SecurityIdentifier::from_bytes(sid).map_err(|_| -1)?;
            self.types
                .get(&sid)
                .cloned()
                .unwrap_or(Ok(account_type::UNKNOWN))
        }
    }

    pub fn classifier(facility: ScriptedFacility) -> AccountTypeClassifier {
        AccountTypeClassifier::new(Arc::new(facility), &ClassificationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{testing::*, *};
    use crate::models::ObjectKind;

    fn sid(text: &str) -> SecurityIdentifier {
        text.parse().unwrap()
    }

    #[rstest]
    #[case(account_type::LOCAL_USER, PrincipalSource::Local)]
    #[case(account_type::PRIMARY_DOMAIN_USER, PrincipalSource::ActiveDirectory)]
    #[case(account_type::EXTERNAL_DOMAIN_USER, PrincipalSource::ActiveDirectory)]
    #[case(account_type::LOCAL_CONNECTED_USER, PrincipalSource::MicrosoftAccount)]
    #[case(account_type::MSA_USER, PrincipalSource::MicrosoftAccount)]
    #[case(account_type::AAD_USER, PrincipalSource::AzureAd)]
    #[case(account_type::INTERNET_USER, PrincipalSource::Unknown)]
    #[case(account_type::UNKNOWN, PrincipalSource::Unknown)]
    #[case(42, PrincipalSource::Unknown)]
    fn test_account_type_mapping(#[case] code: u32, #[case] expected: PrincipalSource) {
        let alice = sid("S-1-5-21-1000-2000-3000-1001");
        let classifier = classifier(ScriptedFacility::new(10).with(&alice, code));
        assert_eq!(
            classifier.classify(&alice),
            Classification::Determined(expected)
        );
    }

    #[test]
    fn test_internet_user_under_microsoft_account_authority() {
        let msa = sid("S-1-11-96-3623454863-58364-18864-2661722203-1597581903-1234");
        let classifier =
            classifier(ScriptedFacility::new(10).with(&msa, account_type::INTERNET_USER));
        assert_eq!(
            classifier.classify(&msa).source(),
            PrincipalSource::MicrosoftAccount
        );
    }

    #[rstest]
    #[case(6)]
    #[case(7)]
    #[case(0)]
    fn test_old_hosts_are_never_determined(#[case] version: u32) {
        let alice = sid("S-1-5-21-1000-2000-3000-1001");
        let classifier =
            classifier(ScriptedFacility::new(version).with(&alice, account_type::LOCAL_USER));
        let result = classifier.classify(&alice);
        assert_eq!(result, Classification::NotDetermined);
        assert!(!result.is_determined());
        assert_eq!(result.source(), PrincipalSource::Unresolved);
    }

    #[test]
    fn test_facility_error_is_unknown() {
        let alice = sid("S-1-5-21-1000-2000-3000-1001");
        let classifier = classifier(ScriptedFacility::new(10).failing(&alice, -1073741811));
        assert_eq!(
            classifier.classify(&alice),
            Classification::Determined(PrincipalSource::Unknown)
        );
    }

    #[test]
    fn test_disabled_classifier() {
        let alice = sid("S-1-5-21-1000-2000-3000-1001");
        let config = ClassificationConfig {
            enabled: false,
            ..Default::default()
        };
        let facility = ScriptedFacility::new(10).with(&alice, account_type::LOCAL_USER);
        let classifier = AccountTypeClassifier::new(Arc::new(facility), &config);
        assert_eq!(classifier.classify(&alice), Classification::NotDetermined);
    }

    #[test]
    fn test_annotate() {
        let alice = sid("S-1-5-21-1000-2000-3000-1001");
        let classifier =
            classifier(ScriptedFacility::new(11).with(&alice, account_type::LOCAL_USER));

        let principal = Principal::resolved(Some("alice".into()), alice, ObjectKind::User);
        assert_eq!(
            classifier.annotate(principal).source(),
            PrincipalSource::Local
        );

        let by_name = Principal::from_name("bob").unwrap();
        assert_eq!(
            classifier.annotate(by_name).source(),
            PrincipalSource::Unresolved
        );
    }

    #[test]
    fn test_native_facility_is_safe_to_call() {
        let classifier = AccountTypeClassifier::native(&ClassificationConfig::default());
        let system = sid("S-1-5-18");
        // Either the host supports it or the answer is "not determined";
        // it never panics.
        let _ = classifier.classify(&system);
    }
}
