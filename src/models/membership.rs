use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Principal, Selector};

/// Direction of a membership edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Add,
    Remove,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// A single request to add a member to, or remove one from, a group.
///
/// Lives only for the duration of one mutation call.
#[derive(Debug, Clone)]
pub struct MembershipEdit<'a> {
    pub group: &'a Principal,
    pub member: Selector,
    pub direction: Direction,
}

impl<'a> MembershipEdit<'a> {
    pub fn add(group: &'a Principal, member: impl Into<Selector>) -> Self {
        Self {
            group,
            member: member.into(),
            direction: Direction::Add,
        }
    }

    pub fn remove(group: &'a Principal, member: impl Into<Selector>) -> Self {
        Self {
            group,
            member: member.into(),
            direction: Direction::Remove,
        }
    }
}
