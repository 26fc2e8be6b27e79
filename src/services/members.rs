use std::iter::FusedIterator;

use tracing::{debug, warn};

use super::PrincipalScope;
use crate::{
    backend::{
        MemberCursor,
        fault::{FaultSite, translate},
    },
    classify::AccountTypeClassifier,
    error::{AccountError, AccountResult, ErrorKind},
    models::{Principal, Selector},
};

/// Lazy, finite sequence over the direct members of a group.
///
/// The underlying cursor is stepped one member at a time. A member whose
/// slot cannot be read, or whose SID no longer translates to an account, is
/// skipped and enumeration continues. A fatal error (access denied, backend
/// unavailable) is yielded once and ends the sequence. The sequence cannot
/// be restarted.
pub struct MemberEnumerator<'a> {
    cursor: Box<dyn MemberCursor + 'a>,
    classifier: &'a AccountTypeClassifier,
    group: String,
    skipped: usize,
    done: bool,
}

impl<'a> MemberEnumerator<'a> {
    /// Locate `group` and open a member cursor in the context that owns it.
    pub fn open(scope: &'a dyn PrincipalScope, group: &Principal) -> AccountResult<Self> {
        let resolved = scope.resolve_group(&Selector::from(group))?;
        let label = resolved.principal.display_label();
        let group_sid = resolved
            .principal
            .sid()
            .ok_or_else(|| AccountError::not_found(format!("group '{label}'")))?;

        let cursor = resolved
            .context
            .open_member_cursor(group_sid)
            .map_err(|f| translate(f, FaultSite::Lookup { target: &label }))?;

        debug!(group = %label, scope = %resolved.context.scope(), "Enumerating group members");
        Ok(Self {
            cursor,
            classifier: scope.classifier(),
            group: label,
            skipped: 0,
            done: false,
        })
    }

    /// Members skipped so far because of per-member faults.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Record a skipped member. Returns the error to yield when the fault
    /// is fatal; otherwise the caller keeps enumerating.
    fn skip(&mut self, err: AccountError) -> Option<AccountError> {
        if err.is_fatal() {
            warn!(group = %self.group, error = %err, "Member enumeration aborted");
            self.done = true;
            return Some(err);
        }

        self.skipped += 1;
        None
    }
}

impl Iterator for MemberEnumerator<'_> {
    type Item = AccountResult<Principal>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.cursor.advance() {
                Ok(false) => {
                    debug!(group = %self.group, skipped = self.skipped, "Member enumeration finished");
                    self.done = true;
                }
                Ok(true) => match self.cursor.current() {
                    Ok(record) => {
                        let principal = self.classifier.annotate(record.into_principal());
                        return Some(Ok(principal));
                    }
                    Err(fault) => {
                        let err = translate(
                            fault,
                            FaultSite::EnumerateTranslate { group: &self.group },
                        );
                        if err.kind() == ErrorKind::NotFound {
                            debug!(group = %self.group, error = %err, "Skipping member that no longer resolves");
                        } else if !err.is_fatal() {
                            warn!(group = %self.group, error = %err, "Skipping member that could not be translated");
                        }
                        if let Some(err) = self.skip(err) {
                            return Some(Err(err));
                        }
                    }
                },
                Err(fault) => {
                    let err = translate(fault, FaultSite::EnumerateAdvance { group: &self.group });
                    if !err.is_fatal() {
                        warn!(group = %self.group, error = %err, "Skipping unreadable member slot");
                    }
                    if let Some(err) = self.skip(err) {
                        return Some(Err(err));
                    }
                }
            }
        }
        None
    }
}

impl FusedIterator for MemberEnumerator<'_> {}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        backend::{BackendRecord, MemoryDirectory, ScopeKind, fault::codes},
        classify::{
            account_type,
            testing::{ScriptedFacility, classifier},
        },
        config::AccountsConfig,
        models::{ObjectKind, PrincipalDetails, PrincipalSource},
        services::PrincipalResolver,
        sid::SecurityIdentifier,
    };

    fn sid(text: &str) -> SecurityIdentifier {
        text.parse().unwrap()
    }

    fn resolver(directory: &MemoryDirectory, facility: ScriptedFacility) -> PrincipalResolver {
        PrincipalResolver::new(
            Arc::new(directory.clone()),
            classifier(facility),
            &AccountsConfig::default(),
        )
        .unwrap()
    }

    fn group_principal(resolver: &PrincipalResolver, name: &str) -> Principal {
        resolver
            .resolve_group(&Selector::from(name))
            .unwrap()
            .principal
    }

    #[test]
    fn test_stale_member_is_skipped() {
        let directory = MemoryDirectory::new();
        let alice = directory.add_user(ScopeKind::Machine, "alice");
        let bob = directory.add_user(ScopeKind::Machine, "bob");
        let group = directory.add_group(ScopeKind::Machine, "Engineering");
        directory.add_member_sid(&group, alice.clone());
        directory.add_member_sid(&group, sid("S-1-5-21-9-9-9-4242"));
        directory.add_member_sid(&group, bob.clone());

        let resolver = resolver(&directory, ScriptedFacility::new(10));
        let engineering = group_principal(&resolver, "Engineering");
        let mut members = resolver.members(&engineering).unwrap();
        let names: Vec<String> = members
            .by_ref()
            .map(|m| m.unwrap().name().unwrap().to_string())
            .collect();

        assert_eq!(names, vec!["alice", "bob"]);
        assert_eq!(members.skipped(), 1);
        assert!(members.next().is_none());
    }

    #[test]
    fn test_unreadable_slot_is_skipped() {
        let directory = MemoryDirectory::new();
        let alice = directory.add_user(ScopeKind::Machine, "alice");
        let bob = directory.add_user(ScopeKind::Machine, "bob");
        let group = directory.add_group(ScopeKind::Machine, "Engineering");
        directory.add_member_sid(&group, alice);
        directory.add_member_sid(&group, bob);
        directory.fail_member_slot(&group, 0, 31);

        let resolver = resolver(&directory, ScriptedFacility::new(10));
        let engineering = group_principal(&resolver, "Engineering");
        let members: Vec<_> = resolver
            .members(&engineering)
            .unwrap()
            .collect::<AccountResult<_>>()
            .unwrap();

        assert_eq!(members.len(), 1);
        assert_eq!(members[0].name(), Some("bob"));
    }

    #[test]
    fn test_access_denied_ends_enumeration() {
        let directory = MemoryDirectory::new();
        let alice = directory.add_user(ScopeKind::Machine, "alice");
        let bob = directory.add_user(ScopeKind::Machine, "bob");
        let group = directory.add_group(ScopeKind::Machine, "Engineering");
        directory.add_member_sid(&group, alice.clone());
        directory.add_member_sid(&group, bob);
        directory.fail_translation(&alice, codes::ERROR_ACCESS_DENIED);

        let resolver = resolver(&directory, ScriptedFacility::new(10));
        let engineering = group_principal(&resolver, "Engineering");
        let mut members = resolver.members(&engineering).unwrap();

        let err = members.next().unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
        assert!(members.next().is_none());
        assert!(members.next().is_none());
    }

    #[test]
    fn test_object_kinds_and_classification() {
        let directory = MemoryDirectory::new();
        let alice = directory.add_user(ScopeKind::Machine, "alice");
        let admins = directory.add_group(ScopeKind::Machine, "Admins");
        let computer = sid("S-1-5-21-4000-5000-6000-2001");
        directory.add_record(
            ScopeKind::Domain,
            BackendRecord {
                sid: computer.clone(),
                name: "PC01$".into(),
                object_class: "computer".into(),
                details: PrincipalDetails::None,
            },
        );
        let group = directory.add_group(ScopeKind::Machine, "Engineering");
        directory.add_member_sid(&group, alice.clone());
        directory.add_member_sid(&group, admins);
        directory.add_member_sid(&group, computer);

        let facility = ScriptedFacility::new(10).with(&alice, account_type::LOCAL_USER);
        let resolver = resolver(&directory, facility);
        let engineering = group_principal(&resolver, "Engineering");
        let members: Vec<Principal> = resolver
            .members(&engineering)
            .unwrap()
            .map(Result::unwrap)
            .collect();

        let kinds: Vec<ObjectKind> = members.iter().map(Principal::kind).collect();
        assert_eq!(
            kinds,
            vec![ObjectKind::User, ObjectKind::Group, ObjectKind::Other]
        );
        assert_eq!(members[0].source(), PrincipalSource::Local);
        assert_eq!(members[1].source(), PrincipalSource::Unknown);
    }

    #[test]
    fn test_long_run_of_stale_members_does_not_hide_later_ones() {
        let directory = MemoryDirectory::new();
        let group = directory.add_group(ScopeKind::Machine, "Ghosts");
        for rid in 0..300 {
            directory.add_member_sid(&group, sid(&format!("S-1-5-21-9-9-9-{}", 5000 + rid)));
        }
        let bob = directory.add_user(ScopeKind::Machine, "bob");
        directory.add_member_sid(&group, bob.clone());

        let resolver = resolver(&directory, ScriptedFacility::new(10));
        let ghosts = group_principal(&resolver, "Ghosts");
        let mut members = resolver.members(&ghosts).unwrap();

        let found = members.next().unwrap().unwrap();
        assert_eq!(found.sid(), Some(&bob));
        assert!(members.next().is_none());
        assert_eq!(members.skipped(), 300);
    }

    #[test]
    fn test_empty_group_and_non_group() {
        let directory = MemoryDirectory::new();
        directory.add_group(ScopeKind::Machine, "Empty");
        let alice = directory.add_user(ScopeKind::Machine, "alice");

        let resolver = resolver(&directory, ScriptedFacility::new(10));
        let empty = group_principal(&resolver, "Empty");
        assert_eq!(resolver.members(&empty).unwrap().count(), 0);

        let user = Principal::from_sid(alice);
        let err = resolver.members(&user).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
