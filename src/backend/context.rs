use std::ops::Deref;

use tracing::debug;

use super::{
    ContextScope, DirectoryBackend, DirectoryContext,
    fault::{FaultSite, translate},
};
use crate::error::AccountResult;

/// An open, owned context bound to one backend scope.
///
/// The backend connection is released when the value is dropped, on every
/// exit path.
pub struct ResolutionContext {
    scope: ContextScope,
    inner: Box<dyn DirectoryContext>,
}

impl ResolutionContext {
    pub fn open(backend: &dyn DirectoryBackend, scope: ContextScope) -> AccountResult<Self> {
        let scope_label = scope.to_string();
        let inner = backend.open_context(&scope).map_err(|fault| {
            translate(
                fault,
                FaultSite::OpenContext {
                    scope: &scope_label,
                },
            )
        })?;
        debug!(scope = %scope, "Opened resolution context");
        Ok(Self { scope, inner })
    }

    pub fn scope(&self) -> &ContextScope {
        &self.scope
    }
}

impl Deref for ResolutionContext {
    type Target = dyn DirectoryContext;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl std::fmt::Debug for ResolutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl Drop for ResolutionContext {
    fn drop(&mut self) {
        debug!(scope = %self.scope, "Releasing resolution context");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{MemoryDirectory, fault::codes},
        error::ErrorKind,
    };

    #[test]
    fn test_open_and_release() {
        let directory = MemoryDirectory::new();
        {
            let ctx = ResolutionContext::open(&directory, ContextScope::Machine).unwrap();
            assert_eq!(ctx.scope(), &ContextScope::Machine);
            assert_eq!(directory.open_contexts(), 1);
        }
        assert_eq!(directory.open_contexts(), 0);
    }

    #[test]
    fn test_open_failure_is_translated() {
        let directory = MemoryDirectory::new();
        directory.fail_open(
            ContextScope::Domain { name: None },
            codes::ERROR_DOMAIN_CONTROLLER_NOT_FOUND,
        );
        let err = ResolutionContext::open(&directory, ContextScope::Domain { name: None })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        assert_eq!(directory.open_contexts(), 0);
    }
}
