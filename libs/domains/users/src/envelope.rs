use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::models::{UserPage, UserResponse};

/// Attribute name to the first failing rule's message
pub type FieldErrors = BTreeMap<String, String>;

/// Uniform body of every users response.
///
/// `users`, `user` and `roles` appear only on successful list/read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Envelope {
    pub errs: Vec<String>,
    #[serde(rename = "errFor")]
    pub err_for: FieldErrors,
    pub msg: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<UserPage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

impl Envelope {
    pub fn success(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            success: true,
            ..Default::default()
        }
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            success: false,
            ..Default::default()
        }
    }

    pub fn with_errors(mut self, err_for: FieldErrors) -> Self {
        self.err_for = err_for;
        self
    }

    pub fn with_users(mut self, page: UserPage) -> Self {
        self.users = Some(page);
        self
    }

    pub fn with_user(mut self, user: UserResponse, roles: Vec<String>) -> Self {
        self.user = Some(user);
        self.roles = Some(roles);
        self
    }
}
