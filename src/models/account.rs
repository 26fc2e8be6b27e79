use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use super::validators::{
    MAX_DESCRIPTION_LENGTH, MAX_FULL_NAME_LENGTH, validate_group_name, validate_user_name,
};

/// Request to create a local user.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(custom(function = "validate_user_name"))]
    pub name: String,
    #[validate(length(max = MAX_FULL_NAME_LENGTH))]
    pub full_name: Option<String>,
    #[validate(length(max = MAX_DESCRIPTION_LENGTH))]
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// `None` creates an account that never expires.
    pub account_expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub password_required: bool,
    #[serde(default = "default_enabled")]
    pub user_may_change_password: bool,
}

impl NewUser {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            full_name: None,
            description: None,
            enabled: true,
            account_expires: None,
            password_required: false,
            user_may_change_password: true,
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Request to create a local group.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewGroup {
    #[validate(custom(function = "validate_group_name"))]
    pub name: String,
    #[validate(length(max = MAX_DESCRIPTION_LENGTH))]
    pub description: Option<String>,
}

impl NewGroup {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

/// Partial update of a user. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UserUpdate {
    #[validate(length(max = MAX_FULL_NAME_LENGTH))]
    pub full_name: Option<String>,
    #[validate(length(max = MAX_DESCRIPTION_LENGTH))]
    pub description: Option<String>,
    pub enabled: Option<bool>,
    /// `Some(None)` clears the expiry.
    pub account_expires: Option<Option<DateTime<Utc>>>,
    pub password_required: Option<bool>,
    pub user_may_change_password: Option<bool>,
}

/// Partial update of a group.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct GroupUpdate {
    #[validate(length(max = MAX_DESCRIPTION_LENGTH))]
    pub description: Option<String>,
}
