//! Resolution, classification and membership editing for local machine
//! users and groups.
//!
//! Principals are looked up by name or security identifier against the
//! machine account database and, when configured, the domain directory.
//! Resolved principals are tagged with the store that owns them using the
//! host's native account-type facility. Group members are enumerated
//! lazily, skipping members that can no longer be read.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use local_accounts::{
//!     AccountsConfig, Direction, MemoryDirectory, PrincipalResolver, PrincipalScope, Selector,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AccountsConfig::default();
//! let resolver = PrincipalResolver::with_native_classifier(Arc::new(MemoryDirectory::new()), &config)?;
//!
//! let group = resolver.resolve_group(&Selector::from("Engineering"))?.principal;
//! for member in resolver.members(&group)? {
//!     println!("{}", member?);
//! }
//! resolver
//!     .membership()
//!     .mutate(&group, &config.resolution.selector("S-1-5-21-1-2-3-1001"), Direction::Add)?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod classify;
pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod services;
pub mod sid;

pub use backend::{DirectoryBackend, MemoryDirectory, ResolutionContext};
pub use classify::{AccountTypeClassifier, Classification};
pub use config::{AccountsConfig, ConfigError};
pub use error::{AccountError, AccountResult, ErrorKind};
pub use models::{Direction, MembershipEdit, ObjectKind, Principal, PrincipalSource, Selector};
pub use services::{
    AccountService, BatchReport, MemberEnumerator, MembershipMutator, PrincipalResolver,
    PrincipalScope,
};
pub use sid::{SecurityIdentifier, try_parse_identifier};
