use chrono::{DateTime, Utc};
use sea_orm::sea_query::StringLen;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::{IntoParams, ToSchema};

/// Lifecycle status of a user record
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum UserStatus {
    /// Registered but not yet activated
    #[sea_orm(string_value = "UNACTIVATED")]
    Unactivated,
    #[sea_orm(string_value = "ACTIVATED")]
    Activated,
    /// Visible but locked out of self-service
    #[sea_orm(string_value = "BANNED")]
    Banned,
    /// Soft-deleted; invisible everywhere
    #[sea_orm(string_value = "DELETED")]
    Deleted,
}

/// Statuses reachable through list/read/update/delete
pub const VISIBLE_STATUSES: [UserStatus; 2] = [UserStatus::Activated, UserStatus::Banned];

impl UserStatus {
    pub fn is_visible(self) -> bool {
        VISIBLE_STATUSES.contains(&self)
    }
}

/// Stored user record
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// Internal numeric id, never exposed
    pub id: i64,
    /// 32-char external id
    pub uid: String,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string
    pub password_hash: String,
    pub thumbnail: Option<String>,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public view of a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub thumbnail: Option<String>,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            uid: user.uid,
            name: user.name,
            email: user.email,
            thumbnail: user.thumbnail,
            status: user.status,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Record handed to the store on create
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub thumbnail: Option<String>,
    pub status: UserStatus,
}

/// Create request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CreateUser {
    #[schema(max_length = 255)]
    pub name: String,
    #[schema(max_length = 255, format = "email")]
    pub email: String,
    pub pass: String,
    /// Must equal `pass`
    pub pass_verify: String,
    #[schema(max_length = 255, format = "uri")]
    pub thumbnail: Option<String>,
}

/// Update request body; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UpdateUser {
    #[schema(max_length = 255)]
    pub name: Option<String>,
    #[schema(max_length = 255, format = "email")]
    pub email: Option<String>,
    pub pass: Option<String>,
    pub pass_verify: Option<String>,
    #[schema(max_length = 255, format = "uri")]
    pub thumbnail: Option<String>,
    /// Role names; applied only for administrators
    pub roles: Option<Vec<String>>,
}

/// Partial update handed to the store. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub thumbnail: Option<String>,
    /// Replaces the full role set when present
    pub roles: Option<Vec<String>>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.thumbnail.is_none()
            && self.roles.is_none()
    }
}

/// Largest page size a client may ask for
pub const MAX_PER_PAGE: u64 = 100;

/// Raw pagination query (`?page=&per=`)
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number (default 1)
    pub page: Option<String>,
    /// Page size (default from `USERS_PER_PAGE`, at most 100)
    pub per: Option<String>,
}

impl PageQuery {
    /// Coerce to a concrete request. Only plain ASCII digit strings parsing to
    /// an integer of at least 1 are honored; anything else uses the default.
    /// Page sizes above [`MAX_PER_PAGE`] are clamped.
    pub fn resolve(&self, default_per_page: u64) -> PageRequest {
        let per_page = parse_positive(self.per.as_deref()).unwrap_or(default_per_page);
        PageRequest {
            page: parse_positive(self.page.as_deref()).unwrap_or(1),
            per_page: per_page.min(MAX_PER_PAGE),
        }
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u64> {
    let raw = raw?;
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<u64>().ok().filter(|n| *n >= 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
}

impl PageRequest {
    /// Rows to skip, or `None` when the page starts beyond any SQL offset
    pub fn offset(&self) -> Option<u64> {
        self.page
            .saturating_sub(1)
            .checked_mul(self.per_page)
            .filter(|offset| *offset <= i64::MAX as u64)
    }
}

/// One page of visible users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserPage {
    pub current_page: u64,
    pub per_page: u64,
    pub total: u64,
    pub last_page: u64,
    pub data: Vec<UserResponse>,
}

impl UserPage {
    pub fn new(request: PageRequest, total: u64, users: Vec<User>) -> Self {
        Self {
            current_page: request.page,
            per_page: request.per_page,
            total,
            last_page: total.div_ceil(request.per_page).max(1),
            data: users.into_iter().map(UserResponse::from).collect(),
        }
    }
}
