//! In-memory directory backend.
//!
//! Models a machine account database and, optionally, one domain. Faults can
//! be injected at every step so callers can exercise partial-failure paths
//! without a live directory.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use parking_lot::RwLock;

use super::{
    BackendFault, BackendRecord, ContextScope, DirectoryBackend, DirectoryContext, MemberCursor,
    NewRecord, ScopeKind, SearchFilter, fault::codes,
};
use crate::{
    models::{ObjectKind, PrincipalDetails, split_qualified_name},
    sid::SecurityIdentifier,
};

const MACHINE_NAME: &str = "WORKSTATION";
const DOMAIN_NAME: &str = "CORP";
const FIRST_RID: u32 = 1001;

struct Store {
    name: String,
    domain_sid: SecurityIdentifier,
    next_rid: u32,
    records: Vec<BackendRecord>,
    members: HashMap<SecurityIdentifier, Vec<SecurityIdentifier>>,
}

impl Store {
    fn new(name: &str, domain_sid: SecurityIdentifier) -> Self {
        Self {
            name: name.to_string(),
            domain_sid,
            next_rid: FIRST_RID,
            records: Vec::new(),
            members: HashMap::new(),
        }
    }

    fn by_sid(&self, sid: &SecurityIdentifier) -> Option<&BackendRecord> {
        self.records.iter().find(|r| &r.sid == sid)
    }

    fn by_sid_mut(&mut self, sid: &SecurityIdentifier) -> Option<&mut BackendRecord> {
        self.records.iter_mut().find(|r| &r.sid == sid)
    }

    fn by_name(&self, name: &str) -> Option<&BackendRecord> {
        let (domain, account) = split_qualified_name(name);
        if let Some(domain) = domain
            && !domain.eq_ignore_ascii_case(&self.name)
        {
            return None;
        }
        self.records
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(account))
    }

    fn allocate_sid(&mut self) -> SecurityIdentifier {
        let rid = self.next_rid;
        self.next_rid += 1;
        let mut subs = self.domain_sid.sub_authorities().to_vec();
        subs.push(rid);
        SecurityIdentifier::new(self.domain_sid.identifier_authority(), subs)
            .unwrap_or_else(|_| self.domain_sid.clone())
    }

    fn insert(&mut self, record: BackendRecord) {
        if record.sid.is_in_domain(&self.domain_sid)
            && let Some(rid) = record.sid.rid()
        {
            self.next_rid = self.next_rid.max(rid.saturating_add(1));
        }
        self.records.push(record);
    }
}

#[derive(Default)]
struct Faults {
    open: HashMap<ScopeKind, u32>,
    lookup: HashMap<ScopeKind, u32>,
    save: Option<u32>,
    /// (group, slot index) -> code returned by `advance`.
    slots: HashMap<(SecurityIdentifier, usize), u32>,
    /// member -> code returned when translating it.
    translation: HashMap<SecurityIdentifier, u32>,
}

struct DirectoryState {
    machine: Store,
    domain: Option<Store>,
    faults: Faults,
}

impl DirectoryState {
    fn store(&self, kind: ScopeKind) -> Option<&Store> {
        match kind {
            ScopeKind::Machine => Some(&self.machine),
            ScopeKind::Domain => self.domain.as_ref(),
        }
    }

    fn store_mut(&mut self, kind: ScopeKind) -> Option<&mut Store> {
        match kind {
            ScopeKind::Machine => Some(&mut self.machine),
            ScopeKind::Domain => self.domain.as_mut(),
        }
    }

    /// Translate a SID against every store, the way a member lookup does.
    fn translate(&self, sid: &SecurityIdentifier) -> Option<&BackendRecord> {
        self.machine
            .by_sid(sid)
            .or_else(|| self.domain.as_ref().and_then(|d| d.by_sid(sid)))
    }
}

struct Shared {
    state: RwLock<DirectoryState>,
    open_contexts: AtomicUsize,
}

/// In-memory [`DirectoryBackend`] with a machine store and an optional
/// domain store.
#[derive(Clone)]
pub struct MemoryDirectory {
    shared: Arc<Shared>,
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDirectory {
    /// A domain-joined machine: machine store `WORKSTATION` and domain `CORP`.
    pub fn new() -> Self {
        Self::build(Some(Store::new(DOMAIN_NAME, sid("S-1-5-21-4000-5000-6000"))))
    }

    /// A machine that is not joined to any domain.
    pub fn workgroup() -> Self {
        Self::build(None)
    }

    fn build(domain: Option<Store>) -> Self {
        let state = DirectoryState {
            machine: Store::new(MACHINE_NAME, sid("S-1-5-21-1000-2000-3000")),
            domain,
            faults: Faults::default(),
        };
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(state),
                open_contexts: AtomicUsize::new(0),
            }),
        }
    }

    /// Domain SID of a store; `None` for a missing domain.
    pub fn domain_sid(&self, scope: ScopeKind) -> Option<SecurityIdentifier> {
        let state = self.shared.state.read();
        state.store(scope).map(|s| s.domain_sid.clone())
    }

    /// Add a user with the next free RID.
    ///
    /// # Panics
    ///
    /// The seeding helpers panic when `scope` is [`ScopeKind::Domain`] on a
    /// workgroup directory.
    pub fn add_user(&self, scope: ScopeKind, name: &str) -> SecurityIdentifier {
        self.add_principal(scope, name, ObjectKind::User)
    }

    /// Add a group with the next free RID.
    pub fn add_group(&self, scope: ScopeKind, name: &str) -> SecurityIdentifier {
        self.add_principal(scope, name, ObjectKind::Group)
    }

    fn add_principal(&self, scope: ScopeKind, name: &str, kind: ObjectKind) -> SecurityIdentifier {
        let mut state = self.shared.state.write();
        let store = state
            .store_mut(scope)
            .expect("seeding a scope that does not exist");
        let sid = store.allocate_sid();
        store.insert(BackendRecord {
            sid: sid.clone(),
            name: name.to_string(),
            object_class: kind.as_str().to_string(),
            details: default_details(kind),
        });
        sid
    }

    /// Add a fully specified record, e.g. one with a fixed SID.
    pub fn add_record(&self, scope: ScopeKind, record: BackendRecord) {
        let mut state = self.shared.state.write();
        state
            .store_mut(scope)
            .expect("seeding a scope that does not exist")
            .insert(record);
    }

    /// Append a raw member SID to a group, without checking that it resolves.
    pub fn add_member_sid(&self, group: &SecurityIdentifier, member: SecurityIdentifier) {
        let mut state = self.shared.state.write();
        let scope = [ScopeKind::Machine, ScopeKind::Domain]
            .into_iter()
            .find(|kind| state.store(*kind).is_some_and(|s| s.by_sid(group).is_some()))
            .expect("group is not seeded");
        if let Some(store) = state.store_mut(scope) {
            store.members.entry(group.clone()).or_default().push(member);
        }
    }

    /// Current member SIDs of a group, in cursor order.
    pub fn members_of(&self, group: &SecurityIdentifier) -> Vec<SecurityIdentifier> {
        let state = self.shared.state.read();
        [Some(&state.machine), state.domain.as_ref()]
            .into_iter()
            .flatten()
            .find_map(|s| s.members.get(group).cloned())
            .unwrap_or_default()
    }

    /// Fail every `open_context` for the given scope.
    pub fn fail_open(&self, scope: ContextScope, code: u32) {
        self.shared.state.write().faults.open.insert(scope.kind(), code);
    }

    /// Fail every lookup in the given scope.
    pub fn fail_lookups(&self, scope: ScopeKind, code: u32) {
        self.shared.state.write().faults.lookup.insert(scope, code);
    }

    /// Fail every persisting call (membership edits, create, update, rename,
    /// delete). `None` clears the fault.
    pub fn fail_saves(&self, code: Option<u32>) {
        self.shared.state.write().faults.save = code;
    }

    /// Make `advance` fail when it reaches `slot` of the group's members.
    pub fn fail_member_slot(&self, group: &SecurityIdentifier, slot: usize, code: u32) {
        self.shared
            .state
            .write()
            .faults
            .slots
            .insert((group.clone(), slot), code);
    }

    /// Make translating `member` fail with `code`.
    pub fn fail_translation(&self, member: &SecurityIdentifier, code: u32) {
        self.shared
            .state
            .write()
            .faults
            .translation
            .insert(member.clone(), code);
    }

    /// Number of contexts currently open.
    pub fn open_contexts(&self) -> usize {
        self.shared.open_contexts.load(Ordering::SeqCst)
    }
}

impl DirectoryBackend for MemoryDirectory {
    fn open_context(&self, scope: &ContextScope) -> Result<Box<dyn DirectoryContext>, BackendFault> {
        let state = self.shared.state.read();
        if let Some(code) = state.faults.open.get(&scope.kind()) {
            return Err(BackendFault::new(*code, format!("cannot contact {scope}")));
        }

        let Some(store) = state.store(scope.kind()) else {
            return Err(BackendFault::new(
                codes::ERROR_NO_SUCH_DOMAIN,
                "the machine is not joined to a domain",
            ));
        };
        if let ContextScope::Domain { name: Some(name) } = scope
            && !name.eq_ignore_ascii_case(&store.name)
        {
            return Err(BackendFault::new(
                codes::ERROR_NO_SUCH_DOMAIN,
                format!("no such domain '{name}'"),
            ));
        }
        drop(state);

        self.shared.open_contexts.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryContext {
            shared: Arc::clone(&self.shared),
            scope: scope.clone(),
        }))
    }
}

struct MemoryContext {
    shared: Arc<Shared>,
    scope: ContextScope,
}

impl MemoryContext {
    fn kind(&self) -> ScopeKind {
        self.scope.kind()
    }

    fn check_lookup(&self, state: &DirectoryState) -> Result<(), BackendFault> {
        match state.faults.lookup.get(&self.kind()) {
            Some(code) => Err(BackendFault::new(*code, "lookup failed")),
            None => Ok(()),
        }
    }

    fn check_save(state: &DirectoryState) -> Result<(), BackendFault> {
        match state.faults.save {
            Some(code) => Err(BackendFault::new(code, "saving changes failed")),
            None => Ok(()),
        }
    }

    /// Run `f` against this context's store under the write lock, after the
    /// save fault check.
    fn write<T>(
        &self,
        f: impl FnOnce(&mut Store) -> Result<T, BackendFault>,
    ) -> Result<T, BackendFault> {
        let mut state = self.shared.state.write();
        Self::check_save(&state)?;
        let store = state
            .store_mut(self.kind())
            .ok_or_else(|| BackendFault::new(codes::ERROR_NO_SUCH_DOMAIN, "no such domain"))?;
        f(store)
    }

    fn with_store<T>(
        &self,
        f: impl FnOnce(&Store) -> Result<T, BackendFault>,
    ) -> Result<T, BackendFault> {
        let state = self.shared.state.read();
        self.check_lookup(&state)?;
        let store = state
            .store(self.kind())
            .ok_or_else(|| BackendFault::new(codes::ERROR_NO_SUCH_DOMAIN, "no such domain"))?;
        f(store)
    }
}

fn group_not_found(group: &SecurityIdentifier) -> BackendFault {
    BackendFault::new(codes::NERR_GROUP_NOT_FOUND, format!("group {group} not found"))
}

impl DirectoryContext for MemoryContext {
    fn scope(&self) -> &ContextScope {
        &self.scope
    }

    fn find_by_sid(&self, sid: &SecurityIdentifier) -> Result<Option<BackendRecord>, BackendFault> {
        self.with_store(|store| Ok(store.by_sid(sid).cloned()))
    }

    fn find_by_name(&self, name: &str) -> Result<Option<BackendRecord>, BackendFault> {
        self.with_store(|store| Ok(store.by_name(name).cloned()))
    }

    fn search(&self, filter: &SearchFilter) -> Result<Vec<BackendRecord>, BackendFault> {
        self.with_store(|store| {
            Ok(store
                .records
                .iter()
                .filter(|r| filter.matches(r))
                .cloned()
                .collect())
        })
    }

    fn open_member_cursor(
        &self,
        group: &SecurityIdentifier,
    ) -> Result<Box<dyn MemberCursor + '_>, BackendFault> {
        let members = self.with_store(|store| {
            match store.by_sid(group) {
                Some(record) if record.kind() == ObjectKind::Group => {}
                _ => return Err(group_not_found(group)),
            }
            Ok(store.members.get(group).cloned().unwrap_or_default())
        })?;
        Ok(Box::new(MemoryCursor {
            shared: &self.shared,
            group: group.clone(),
            members,
            next: 0,
            current: None,
        }))
    }

    fn is_member(
        &self,
        group: &SecurityIdentifier,
        member: &SecurityIdentifier,
    ) -> Result<bool, BackendFault> {
        self.with_store(|store| {
            if store.by_sid(group).is_none() {
                return Err(group_not_found(group));
            }
            Ok(store
                .members
                .get(group)
                .is_some_and(|members| members.contains(member)))
        })
    }

    fn add_member(
        &self,
        group: &SecurityIdentifier,
        member: &SecurityIdentifier,
    ) -> Result<(), BackendFault> {
        let known = self.shared.state.read().translate(member).is_some();
        self.write(|store| {
            if store.by_sid(group).is_none() {
                return Err(group_not_found(group));
            }
            if !known {
                return Err(BackendFault::new(
                    codes::ERROR_NO_SUCH_MEMBER,
                    format!("member {member} does not exist"),
                ));
            }
            let members = store.members.entry(group.clone()).or_default();
            if members.contains(member) {
                return Err(BackendFault::new(
                    codes::ERROR_MEMBER_IN_ALIAS,
                    "the specified account name is already a member of the group",
                ));
            }
            members.push(member.clone());
            Ok(())
        })
    }

    fn remove_member(
        &self,
        group: &SecurityIdentifier,
        member: &SecurityIdentifier,
    ) -> Result<(), BackendFault> {
        self.write(|store| {
            if store.by_sid(group).is_none() {
                return Err(group_not_found(group));
            }
            let members = store.members.entry(group.clone()).or_default();
            match members.iter().position(|m| m == member) {
                Some(index) => {
                    members.remove(index);
                    Ok(())
                }
                None => Err(BackendFault::new(
                    codes::ERROR_MEMBER_NOT_IN_ALIAS,
                    "the specified account name is not a member of the group",
                )),
            }
        })
    }

    fn create(&self, record: NewRecord) -> Result<BackendRecord, BackendFault> {
        self.write(|store| {
            if record.name.is_empty() {
                return Err(BackendFault::new(
                    codes::ERROR_INVALID_ACCOUNT_NAME,
                    "the name provided is not a properly formed account name",
                ));
            }
            if store.by_name(&record.name).is_some() {
                return Err(exists_fault(record.kind));
            }
            let created = BackendRecord {
                sid: store.allocate_sid(),
                name: record.name,
                object_class: record.kind.as_str().to_string(),
                details: record.details,
            };
            store.insert(created.clone());
            Ok(created)
        })
    }

    fn update(
        &self,
        sid: &SecurityIdentifier,
        details: PrincipalDetails,
    ) -> Result<BackendRecord, BackendFault> {
        self.write(|store| {
            let record = store.by_sid_mut(sid).ok_or_else(|| not_found_fault(sid))?;
            record.details = details;
            Ok(record.clone())
        })
    }

    fn rename(
        &self,
        sid: &SecurityIdentifier,
        new_name: &str,
    ) -> Result<BackendRecord, BackendFault> {
        self.write(|store| {
            let kind = store
                .by_sid(sid)
                .map(BackendRecord::kind)
                .ok_or_else(|| not_found_fault(sid))?;
            if store.by_name(new_name).is_some_and(|other| &other.sid != sid) {
                return Err(exists_fault(kind));
            }
            let record = store.by_sid_mut(sid).ok_or_else(|| not_found_fault(sid))?;
            record.name = new_name.to_string();
            Ok(record.clone())
        })
    }

    fn delete(&self, sid: &SecurityIdentifier) -> Result<(), BackendFault> {
        self.write(|store| {
            let index = store
                .records
                .iter()
                .position(|r| &r.sid == sid)
                .ok_or_else(|| not_found_fault(sid))?;
            store.records.remove(index);
            store.members.remove(sid);
            // Memberships in this store go with the account; other stores
            // keep the now stale SID.
            for members in store.members.values_mut() {
                members.retain(|m| m != sid);
            }
            Ok(())
        })
    }
}

impl Drop for MemoryContext {
    fn drop(&mut self) {
        self.shared.open_contexts.fetch_sub(1, Ordering::SeqCst);
    }
}

struct MemoryCursor<'a> {
    shared: &'a Shared,
    group: SecurityIdentifier,
    members: Vec<SecurityIdentifier>,
    next: usize,
    current: Option<usize>,
}

impl MemberCursor for MemoryCursor<'_> {
    fn advance(&mut self) -> Result<bool, BackendFault> {
        if self.next >= self.members.len() {
            self.current = None;
            return Ok(false);
        }
        let slot = self.next;
        self.next += 1;

        let state = self.shared.state.read();
        if let Some(code) = state.faults.slots.get(&(self.group.clone(), slot)) {
            self.current = None;
            return Err(BackendFault::new(
                *code,
                format!("member slot {slot} is unreadable"),
            ));
        }
        self.current = Some(slot);
        Ok(true)
    }

    fn current(&self) -> Result<BackendRecord, BackendFault> {
        let sid = self
            .current
            .and_then(|slot| self.members.get(slot))
            .ok_or_else(|| {
                BackendFault::new(codes::ERROR_NO_SUCH_MEMBER, "cursor is not on a member")
            })?;
        let state = self.shared.state.read();
        if let Some(code) = state.faults.translation.get(sid) {
            return Err(BackendFault::new(
                *code,
                format!("cannot translate member {sid}"),
            ));
        }
        state.translate(sid).cloned().ok_or_else(|| {
            BackendFault::new(
                codes::ERROR_NONE_MAPPED,
                format!("no mapping between account names and security IDs for {sid}"),
            )
        })
    }
}

fn default_details(kind: ObjectKind) -> PrincipalDetails {
    match kind {
        ObjectKind::User => PrincipalDetails::User(Default::default()),
        ObjectKind::Group => PrincipalDetails::Group(Default::default()),
        ObjectKind::Other => PrincipalDetails::None,
    }
}

fn exists_fault(kind: ObjectKind) -> BackendFault {
    match kind {
        ObjectKind::Group => BackendFault::new(codes::ERROR_ALIAS_EXISTS, "the group already exists"),
        _ => BackendFault::new(codes::NERR_USER_EXISTS, "the account already exists"),
    }
}

fn not_found_fault(sid: &SecurityIdentifier) -> BackendFault {
    BackendFault::new(codes::NERR_USER_NOT_FOUND, format!("{sid} could not be found"))
}

fn sid(text: &str) -> SecurityIdentifier {
    text.parse().expect("static SID literal")
}
