mod account;
mod membership;
mod principal;
mod selector;
pub mod validators;

pub use account::*;
pub use membership::*;
pub use principal::*;
pub use selector::*;
