use tracing::info;
use validator::{Validate, ValidationError};

use super::{BatchReport, PrincipalScope, Resolved, run_batch};
use crate::{
    backend::{
        NewRecord, ResolutionContext, ScopeKind, SearchFilter,
        fault::{FaultSite, translate},
    },
    error::{AccountError, AccountResult},
    models::{
        GroupAttributes, GroupUpdate, NewGroup, NewUser, ObjectKind, PasswordInfo, Principal,
        PrincipalDetails, Selector, UserAttributes, UserUpdate,
        validators::{describe_validation_errors, validate_group_name, validate_user_name},
    },
};

/// Single-target operations on local users and groups.
///
/// Everything here runs against the machine context only.
pub struct AccountService<'a> {
    scope: &'a dyn PrincipalScope,
}

impl<'a> AccountService<'a> {
    pub fn new(scope: &'a dyn PrincipalScope) -> Self {
        Self { scope }
    }

    fn machine(&self) -> AccountResult<&'a ResolutionContext> {
        self.scope.resolve_context(ScopeKind::Machine)
    }

    fn resolve_kind(&self, selector: &Selector, kind: ObjectKind) -> AccountResult<Resolved<'a>> {
        let resolved = self.scope.resolve_in(ScopeKind::Machine, selector)?;
        if resolved.principal.kind() == kind {
            Ok(resolved)
        } else {
            Err(AccountError::not_found(format!("{kind} '{selector}'")))
        }
    }

    pub fn get_user(&self, selector: &Selector) -> AccountResult<Principal> {
        self.resolve_kind(selector, ObjectKind::User)
            .map(|r| r.principal)
    }

    pub fn get_group(&self, selector: &Selector) -> AccountResult<Principal> {
        self.resolve_kind(selector, ObjectKind::Group)
            .map(|r| r.principal)
    }

    pub fn list_users(&self) -> AccountResult<Vec<Principal>> {
        self.list(ObjectKind::User)
    }

    pub fn list_groups(&self) -> AccountResult<Vec<Principal>> {
        self.list(ObjectKind::Group)
    }

    fn list(&self, kind: ObjectKind) -> AccountResult<Vec<Principal>> {
        let target = format!("{kind}s");
        let records = self
            .machine()?
            .search(&SearchFilter::kind(kind))
            .map_err(|f| translate(f, FaultSite::Lookup { target: &target }))?;
        let classifier = self.scope.classifier();
        Ok(records
            .into_iter()
            .map(|r| classifier.annotate(r.into_principal()))
            .collect())
    }

    pub fn create_user(&self, input: NewUser) -> AccountResult<Principal> {
        input.validate().map_err(|e| AccountError::InvalidName {
            name: input.name.clone(),
            reason: describe_validation_errors(&e),
        })?;

        let details = PrincipalDetails::User(UserAttributes {
            enabled: input.enabled,
            full_name: input.full_name,
            description: input.description,
            account_expires: input.account_expires,
            last_logon: None,
            password: PasswordInfo {
                required: input.password_required,
                user_may_change: input.user_may_change_password,
                ..Default::default()
            },
        });
        self.create(input.name, ObjectKind::User, details)
    }

    pub fn create_group(&self, input: NewGroup) -> AccountResult<Principal> {
        input.validate().map_err(|e| AccountError::InvalidName {
            name: input.name.clone(),
            reason: describe_validation_errors(&e),
        })?;

        let details = PrincipalDetails::Group(GroupAttributes {
            description: input.description,
        });
        self.create(input.name, ObjectKind::Group, details)
    }

    fn create(
        &self,
        name: String,
        kind: ObjectKind,
        details: PrincipalDetails,
    ) -> AccountResult<Principal> {
        let machine = self.machine()?;
        let existing = machine
            .find_by_name(&name)
            .map_err(|f| translate(f, FaultSite::Lookup { target: &name }))?;
        if let Some(existing) = existing {
            return Err(AccountError::already_exists(format!(
                "{} '{}'",
                existing.kind(),
                existing.name
            )));
        }

        let record = machine
            .create(NewRecord {
                name: name.clone(),
                kind,
                details,
            })
            .map_err(|f| translate(f, FaultSite::Create { name: &name }))?;

        info!(name = %record.name, sid = %record.sid, kind = %kind, "Local account created");
        Ok(self.scope.classifier().annotate(record.into_principal()))
    }

    pub fn update_user(&self, selector: &Selector, update: UserUpdate) -> AccountResult<Principal> {
        update.validate().map_err(|e| AccountError::InvalidName {
            name: selector.to_string(),
            reason: describe_validation_errors(&e),
        })?;

        let resolved = self.resolve_kind(selector, ObjectKind::User)?;
        let mut attrs = resolved.principal.user().cloned().unwrap_or_default();
        if let Some(full_name) = update.full_name {
            attrs.full_name = Some(full_name);
        }
        if let Some(description) = update.description {
            attrs.description = Some(description);
        }
        if let Some(enabled) = update.enabled {
            attrs.enabled = enabled;
        }
        if let Some(expires) = update.account_expires {
            attrs.account_expires = expires;
        }
        if let Some(required) = update.password_required {
            attrs.password.required = required;
        }
        if let Some(may_change) = update.user_may_change_password {
            attrs.password.user_may_change = may_change;
        }
        self.save(resolved, PrincipalDetails::User(attrs))
    }

    pub fn update_group(
        &self,
        selector: &Selector,
        update: GroupUpdate,
    ) -> AccountResult<Principal> {
        update.validate().map_err(|e| AccountError::InvalidName {
            name: selector.to_string(),
            reason: describe_validation_errors(&e),
        })?;

        let resolved = self.resolve_kind(selector, ObjectKind::Group)?;
        let mut attrs = resolved.principal.group().cloned().unwrap_or_default();
        if let Some(description) = update.description {
            attrs.description = Some(description);
        }
        self.save(resolved, PrincipalDetails::Group(attrs))
    }

    fn save(&self, resolved: Resolved<'_>, details: PrincipalDetails) -> AccountResult<Principal> {
        let label = resolved.principal.display_label();
        let sid = resolved
            .principal
            .sid()
            .ok_or_else(|| AccountError::not_found(label.clone()))?;
        let record = resolved
            .context
            .update(sid, details)
            .map_err(|f| translate(f, FaultSite::Update { target: &label }))?;

        info!(name = %record.name, sid = %record.sid, "Local account updated");
        Ok(resolved.principal.with_details(record.details))
    }

    /// Rename a user or group. The SID is unchanged.
    pub fn rename(&self, selector: &Selector, new_name: &str) -> AccountResult<Principal> {
        let resolved = self.scope.resolve_in(ScopeKind::Machine, selector)?;
        let check: fn(&str) -> Result<(), ValidationError> = match resolved.principal.kind() {
            ObjectKind::User => validate_user_name,
            ObjectKind::Group | ObjectKind::Other => validate_group_name,
        };
        check(new_name).map_err(|e| AccountError::InvalidName {
            name: new_name.to_string(),
            reason: e
                .message
                .map(|m| m.to_string())
                .unwrap_or_else(|| e.code.to_string()),
        })?;

        let old_label = resolved.principal.display_label();
        let sid = resolved
            .principal
            .sid()
            .ok_or_else(|| AccountError::not_found(old_label.clone()))?;

        let holder = resolved
            .context
            .find_by_name(new_name)
            .map_err(|f| translate(f, FaultSite::Lookup { target: new_name }))?;
        if holder.is_some_and(|other| &other.sid != sid) {
            return Err(AccountError::NameInUse {
                name: new_name.to_string(),
            });
        }

        let record = resolved
            .context
            .rename(sid, new_name)
            .map_err(|f| translate(f, FaultSite::Rename { new_name }))?;

        info!(old_name = %old_label, new_name = %record.name, sid = %record.sid, "Local account renamed");
        Ok(self.scope.classifier().annotate(record.into_principal()))
    }

    pub fn delete(&self, selector: &Selector) -> AccountResult<()> {
        let resolved = self.scope.resolve_in(ScopeKind::Machine, selector)?;
        let label = resolved.principal.display_label();
        let sid = resolved
            .principal
            .sid()
            .ok_or_else(|| AccountError::not_found(label.clone()))?;
        resolved
            .context
            .delete(sid)
            .map_err(|f| translate(f, FaultSite::Delete { target: &label }))?;

        info!(name = %label, sid = %sid, "Local account deleted");
        Ok(())
    }

    /// Delete several principals, reporting per item.
    pub fn delete_batch<I>(&self, selectors: I) -> BatchReport<()>
    where
        I: IntoIterator<Item = Selector>,
    {
        run_batch(selectors, |selector| self.delete(selector))
    }
}
