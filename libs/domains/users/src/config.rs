use core_config::{ConfigError, FromEnv, env_parse};

use crate::models::{MAX_PER_PAGE, UserStatus};

/// Users domain settings.
///
/// Environment variables:
/// - `USERS_DEFAULT_STATUS` status given to created users (default `ACTIVATED`)
/// - `USERS_PER_PAGE` list page size when `per` is absent or invalid (default 10)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UsersConfig {
    pub default_status: UserStatus,
    pub default_per_page: u64,
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            default_status: UserStatus::Activated,
            default_per_page: 10,
        }
    }
}

impl FromEnv for UsersConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let default_status: UserStatus = env_parse("USERS_DEFAULT_STATUS", "ACTIVATED")?;
        if default_status == UserStatus::Deleted {
            return Err(ConfigError::ParseError {
                key: "USERS_DEFAULT_STATUS".to_string(),
                details: "new users cannot start out deleted".to_string(),
            });
        }

        let default_per_page: u64 = env_parse("USERS_PER_PAGE", "10")?;
        if !(1..=MAX_PER_PAGE).contains(&default_per_page) {
            return Err(ConfigError::ParseError {
                key: "USERS_PER_PAGE".to_string(),
                details: format!("must be between 1 and {MAX_PER_PAGE}"),
            });
        }

        Ok(Self {
            default_status,
            default_per_page,
        })
    }
}
