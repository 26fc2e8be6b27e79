mod accounts;
mod batch;
mod members;
mod membership;
mod resolver;

pub use accounts::AccountService;
pub use batch::{BatchReport, ItemOutcome, run_batch};
pub use members::MemberEnumerator;
pub use membership::MembershipMutator;
pub use resolver::{PrincipalResolver, PrincipalScope, Resolved};
