use std::sync::Arc;

use once_cell::unsync::OnceCell;
use tracing::debug;

use super::{AccountService, MemberEnumerator, MembershipMutator};
use crate::{
    backend::{
        BackendRecord, ContextScope, DirectoryBackend, ResolutionContext, ScopeKind,
        fault::{FaultSite, translate},
    },
    classify::AccountTypeClassifier,
    config::AccountsConfig,
    error::{AccountError, AccountResult, ErrorKind},
    models::{LookupKey, Principal, Selector},
};

/// A resolved principal together with the context that owns it.
#[derive(Debug)]
pub struct Resolved<'a> {
    pub principal: Principal,
    pub context: &'a ResolutionContext,
}

/// Shared resolution capability used by every principal operation.
///
/// Implementors supply the contexts and classifier; lookup and the
/// machine-then-domain fallback policy are provided.
pub trait PrincipalScope {
    /// The context for a scope, opening it on first use.
    fn resolve_context(&self, scope: ScopeKind) -> AccountResult<&ResolutionContext>;

    fn classifier(&self) -> &AccountTypeClassifier;

    /// Whether lookups that miss on the machine continue in the domain.
    fn domain_fallback(&self) -> bool;

    /// Resolve in exactly one context.
    fn resolve_in(&self, scope: ScopeKind, selector: &Selector) -> AccountResult<Resolved<'_>> {
        let context = self.resolve_context(scope)?;
        match find(context, selector)? {
            Some(record) => Ok(Resolved {
                principal: self.classifier().annotate(record.into_principal()),
                context,
            }),
            None => Err(AccountError::not_found(format!("principal '{selector}'"))),
        }
    }

    /// Resolve on the machine first, then in the domain.
    ///
    /// `NotFound` only when neither context knows the principal, including
    /// when the host has no domain to fall back to. Any other error from the
    /// machine lookup is returned as is.
    fn resolve_member(&self, selector: &Selector) -> AccountResult<Resolved<'_>> {
        match self.resolve_in(ScopeKind::Machine, selector) {
            Err(e) if e.kind() == ErrorKind::NotFound && self.domain_fallback() => {
                debug!(selector = %selector, "Not found on machine, trying domain");
                match self.resolve_in(ScopeKind::Domain, selector) {
                    Err(domain_err) if domain_err.kind() == ErrorKind::NotFound => Err(e),
                    other => other,
                }
            }
            other => other,
        }
    }

    /// Resolve a group with the same fallback as [`resolve_member`].
    /// A principal that is not a group is `NotFound`.
    ///
    /// [`resolve_member`]: PrincipalScope::resolve_member
    fn resolve_group(&self, selector: &Selector) -> AccountResult<Resolved<'_>> {
        let resolved = self.resolve_member(selector)?;
        if resolved.principal.is_group() {
            Ok(resolved)
        } else {
            Err(AccountError::not_found(format!("group '{selector}'")))
        }
    }
}

/// Look a selector up in one context. A selector carrying a SID is always
/// looked up by SID.
fn find(context: &ResolutionContext, selector: &Selector) -> AccountResult<Option<BackendRecord>> {
    let target = selector.to_string();
    let site = FaultSite::Lookup { target: &target };
    match selector.lookup_key() {
        Some(LookupKey::Sid(sid)) => context.find_by_sid(sid).map_err(|f| translate(f, site)),
        Some(LookupKey::Name(name)) => context.find_by_name(name).map_err(|f| translate(f, site)),
        None => Ok(None),
    }
}

/// Resolves principals against the machine context and, lazily, the domain
/// context.
///
/// Owns both contexts; they are released when the resolver is dropped.
pub struct PrincipalResolver {
    backend: Arc<dyn DirectoryBackend>,
    machine: ResolutionContext,
    domain: OnceCell<ResolutionContext>,
    domain_scope: ContextScope,
    domain_fallback: bool,
    classifier: AccountTypeClassifier,
}

impl PrincipalResolver {
    /// Open the machine context. The domain context is opened on first use.
    pub fn new(
        backend: Arc<dyn DirectoryBackend>,
        classifier: AccountTypeClassifier,
        config: &AccountsConfig,
    ) -> AccountResult<Self> {
        let machine = ResolutionContext::open(backend.as_ref(), ContextScope::Machine)?;
        Ok(Self {
            backend,
            machine,
            domain: OnceCell::new(),
            domain_scope: ContextScope::Domain {
                name: config.resolution.domain.clone(),
            },
            domain_fallback: config.resolution.domain_fallback,
            classifier,
        })
    }

    /// Resolver using the host's native classification facility.
    pub fn with_native_classifier(
        backend: Arc<dyn DirectoryBackend>,
        config: &AccountsConfig,
    ) -> AccountResult<Self> {
        let classifier = AccountTypeClassifier::native(&config.classification);
        Self::new(backend, classifier, config)
    }

    /// Resolve a selector against one context.
    pub fn resolve(&self, scope: ScopeKind, selector: &Selector) -> AccountResult<Principal> {
        self.resolve_in(scope, selector).map(|r| r.principal)
    }

    /// Lazily enumerate the members of a group.
    pub fn members(&self, group: &Principal) -> AccountResult<MemberEnumerator<'_>> {
        MemberEnumerator::open(self, group)
    }

    pub fn membership(&self) -> MembershipMutator<'_> {
        MembershipMutator::new(self)
    }

    pub fn accounts(&self) -> AccountService<'_> {
        AccountService::new(self)
    }
}

impl PrincipalScope for PrincipalResolver {
    fn resolve_context(&self, scope: ScopeKind) -> AccountResult<&ResolutionContext> {
        match scope {
            ScopeKind::Machine => Ok(&self.machine),
            ScopeKind::Domain => self.domain.get_or_try_init(|| {
                ResolutionContext::open(self.backend.as_ref(), self.domain_scope.clone())
            }),
        }
    }

    fn classifier(&self) -> &AccountTypeClassifier {
        &self.classifier
    }

    fn domain_fallback(&self) -> bool {
        self.domain_fallback
    }
}

impl std::fmt::Debug for PrincipalResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrincipalResolver")
            .field("machine", &self.machine)
            .field("domain", &self.domain.get())
            .field("domain_fallback", &self.domain_fallback)
            .finish_non_exhaustive()
    }
}
