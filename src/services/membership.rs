use tracing::info;

use super::{BatchReport, PrincipalScope, Resolved, run_batch};
use crate::{
    backend::fault::{FaultSite, translate},
    error::{AccountError, AccountResult, ErrorKind},
    models::{Direction, MembershipEdit, Principal, Selector},
};

/// Adds principals to, and removes them from, groups.
pub struct MembershipMutator<'a> {
    scope: &'a dyn PrincipalScope,
}

impl<'a> MembershipMutator<'a> {
    pub fn new(scope: &'a dyn PrincipalScope) -> Self {
        Self { scope }
    }

    /// Add `member` to, or remove it from, `group` and persist the change.
    ///
    /// The member is resolved on the machine first and then in the domain.
    /// Returns the resolved member.
    ///
    /// - unresolvable member: `NotFound`, nothing is attempted
    /// - adding an existing member: `MemberExists`
    /// - removing a non-member: `MemberNotFound`
    /// - access denied while persisting: `AccessDenied` (fatal)
    pub fn mutate(
        &self,
        group: &Principal,
        member: &Selector,
        direction: Direction,
    ) -> AccountResult<Principal> {
        let group = self.scope.resolve_group(&Selector::from(group))?;
        self.mutate_resolved(&group, member, direction)
    }

    pub fn apply(&self, edit: &MembershipEdit<'_>) -> AccountResult<Principal> {
        self.mutate(edit.group, &edit.member, edit.direction)
    }

    /// Apply the same edit for several members.
    ///
    /// Fails outright only when the group itself cannot be resolved; member
    /// errors are reported per item.
    pub fn mutate_batch<I>(
        &self,
        group: &Principal,
        members: I,
        direction: Direction,
    ) -> AccountResult<BatchReport<Principal>>
    where
        I: IntoIterator<Item = Selector>,
    {
        let group = self.scope.resolve_group(&Selector::from(group))?;
        Ok(run_batch(members, |member| {
            self.mutate_resolved(&group, member, direction)
        }))
    }

    fn mutate_resolved(
        &self,
        group: &Resolved<'_>,
        member: &Selector,
        direction: Direction,
    ) -> AccountResult<Principal> {
        let group_label = group.principal.display_label();
        let group_sid = group
            .principal
            .sid()
            .ok_or_else(|| AccountError::not_found(format!("group '{group_label}'")))?;

        let member = match self.scope.resolve_member(member) {
            Ok(resolved) => resolved.principal,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AccountError::not_found(format!("member '{member}'")));
            }
            Err(e) => return Err(e),
        };
        let member_label = member.display_label();
        let member_sid = member
            .sid()
            .ok_or_else(|| AccountError::not_found(format!("member '{member_label}'")))?;

        let context = group.context;
        let is_member = context
            .is_member(group_sid, member_sid)
            .map_err(|f| translate(f, FaultSite::Lookup { target: &group_label }))?;

        match direction {
            Direction::Add if is_member => {
                return Err(AccountError::MemberExists {
                    group: group_label,
                    member: member_label,
                });
            }
            Direction::Add => context.add_member(group_sid, member_sid).map_err(|f| {
                translate(
                    f,
                    FaultSite::AddMember {
                        group: &group_label,
                        member: &member_label,
                    },
                )
            })?,
            Direction::Remove if !is_member => {
                return Err(AccountError::MemberNotFound {
                    group: group_label,
                    member: member_label,
                });
            }
            Direction::Remove => context.remove_member(group_sid, member_sid).map_err(|f| {
                translate(
                    f,
                    FaultSite::RemoveMember {
                        group: &group_label,
                        member: &member_label,
                    },
                )
            })?,
        }

        info!(
            group = %group_label,
            member = %member_label,
            sid = %member_sid,
            direction = %direction,
            "Group membership changed"
        );
        Ok(member)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        backend::{MemoryDirectory, ScopeKind, fault::codes},
        classify::testing::{ScriptedFacility, classifier},
        config::AccountsConfig,
        services::PrincipalResolver,
        sid::SecurityIdentifier,
    };

    struct Fixture {
        directory: MemoryDirectory,
        group: SecurityIdentifier,
        alice: SecurityIdentifier,
    }

    fn fixture() -> Fixture {
        let directory = MemoryDirectory::new();
        let alice = directory.add_user(ScopeKind::Machine, "alice");
        directory.add_user(ScopeKind::Domain, "carol");
        let group = directory.add_group(ScopeKind::Machine, "Engineering");
        directory.add_member_sid(&group, alice.clone());
        Fixture {
            directory,
            group,
            alice,
        }
    }

    fn resolver(directory: &MemoryDirectory) -> PrincipalResolver {
        PrincipalResolver::new(
            Arc::new(directory.clone()),
            classifier(ScriptedFacility::new(10)),
            &AccountsConfig::default(),
        )
        .unwrap()
    }

    fn group(fx: &Fixture) -> Principal {
        Principal::from_sid(fx.group.clone())
    }

    #[test]
    fn test_add_existing_member() {
        let fx = fixture();
        let resolver = resolver(&fx.directory);
        let err = resolver
            .membership()
            .mutate(&group(&fx), &Selector::from("alice"), Direction::Add)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(fx.directory.members_of(&fx.group), vec![fx.alice.clone()]);
    }

    #[test]
    fn test_remove_non_member() {
        let fx = fixture();
        let resolver = resolver(&fx.directory);
        let err = resolver
            .membership()
            .mutate(&group(&fx), &Selector::from("carol"), Direction::Remove)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(matches!(err, AccountError::MemberNotFound { .. }));
        assert_eq!(fx.directory.members_of(&fx.group), vec![fx.alice.clone()]);
    }

    #[test]
    fn test_add_domain_member_and_remove() {
        let fx = fixture();
        let resolver = resolver(&fx.directory);
        let mutator = resolver.membership();

        let carol = mutator
            .mutate(&group(&fx), &Selector::from("carol"), Direction::Add)
            .unwrap();
        assert_eq!(carol.name(), Some("carol"));
        assert_eq!(fx.directory.members_of(&fx.group).len(), 2);

        let engineering = group(&fx);
        let edit = MembershipEdit::remove(&engineering, &carol);
        mutator.apply(&edit).unwrap();
        assert_eq!(fx.directory.members_of(&fx.group), vec![fx.alice.clone()]);
    }

    #[test]
    fn test_unknown_member_is_not_attempted() {
        let fx = fixture();
        // Any save would fail; resolution must fail first.
        fx.directory.fail_saves(Some(codes::ERROR_ACCESS_DENIED));
        let resolver = resolver(&fx.directory);
        let err = resolver
            .membership()
            .mutate(&group(&fx), &Selector::from("bob"), Direction::Add)
            .unwrap_err();
        assert_eq!(err, AccountError::not_found("member 'bob'"));
    }

    #[test]
    fn test_access_denied_is_fatal() {
        let fx = fixture();
        fx.directory.fail_saves(Some(codes::ERROR_ACCESS_DENIED));
        let resolver = resolver(&fx.directory);
        let err = resolver
            .membership()
            .mutate(&group(&fx), &Selector::from("carol"), Direction::Add)
            .unwrap_err();
        assert!(matches!(err, AccountError::AccessDenied { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_batch_reports_per_member() {
        let fx = fixture();
        let resolver = resolver(&fx.directory);
        let report = resolver
            .membership()
            .mutate_batch(
                &group(&fx),
                ["alice", "bob", "carol"].map(Selector::from),
                Direction::Add,
            )
            .unwrap();

        assert!(!report.is_aborted());
        let kinds: Vec<_> = report
            .outcomes
            .iter()
            .map(|o| o.result.as_ref().map_err(AccountError::kind).err())
            .collect();
        assert_eq!(
            kinds,
            vec![Some(ErrorKind::AlreadyExists), Some(ErrorKind::NotFound), None]
        );
        assert_eq!(fx.directory.members_of(&fx.group).len(), 2);
    }

    #[test]
    fn test_batch_aborts_on_access_denied() {
        let fx = fixture();
        let dave = fx.directory.add_user(ScopeKind::Machine, "dave");
        fx.directory.fail_saves(Some(codes::ERROR_ACCESS_DENIED));
        let resolver = resolver(&fx.directory);
        let report = resolver
            .membership()
            .mutate_batch(
                &group(&fx),
                vec![Selector::from("carol"), Selector::Sid(dave)],
                Direction::Add,
            )
            .unwrap();

        assert_eq!(report.outcomes.len(), 1);
        assert!(matches!(
            report.aborted_by,
            Some(AccountError::AccessDenied { .. })
        ));
    }

    #[test]
    fn test_batch_on_workgroup_host_continues_past_unknown_member() {
        let directory = MemoryDirectory::workgroup();
        let alice = directory.add_user(ScopeKind::Machine, "alice");
        let admins = directory.add_group(ScopeKind::Machine, "Admins");
        let resolver = resolver(&directory);

        let report = resolver
            .membership()
            .mutate_batch(
                &Principal::from_sid(admins.clone()),
                ["bob", "alice"].map(Selector::from),
                Direction::Add,
            )
            .unwrap();

        assert!(!report.is_aborted());
        assert_eq!(report.outcomes.len(), 2);
        let (input, err) = report.failed().next().unwrap();
        assert_eq!(input, "bob");
        assert_eq!(err, &AccountError::not_found("member 'bob'"));
        assert_eq!(directory.members_of(&admins), vec![alice]);
    }

    #[test]
    fn test_batch_with_unknown_group() {
        let fx = fixture();
        let resolver = resolver(&fx.directory);
        let missing = Principal::from_name("Nope").unwrap();
        let err = resolver
            .membership()
            .mutate_batch(&missing, vec![Selector::from("alice")], Direction::Add)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
