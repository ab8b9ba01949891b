use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::actor::Actor;
use crate::config::UsersConfig;
use crate::error::{StoreOp, UserError, UserResult};
use crate::models::{
    NewUser, PageQuery, User, UserChanges, UserPage, UserResponse, VISIBLE_STATUSES,
};
use crate::policy::{Action, PolicyGate, RolePolicy};
use crate::repository::UserRepository;
use crate::resolver::{DnsResolver, HostResolver};
use crate::rules::{self, FieldMap, RuleContext};

const UID_LEN: usize = 32;

/// Service layer for user management.
///
/// Every operation runs in the same order: identifier check, lookup, policy
/// gate, validation, store write.
#[derive(Clone)]
pub struct UserService<R: UserRepository> {
    repository: Arc<R>,
    policy: Arc<dyn PolicyGate>,
    resolver: Arc<dyn HostResolver>,
    config: UsersConfig,
}

impl<R: UserRepository> UserService<R> {
    /// Service with the role policy, system DNS and default settings
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
            policy: Arc::new(RolePolicy),
            resolver: Arc::new(DnsResolver),
            config: UsersConfig::default(),
        }
    }

    pub fn with_policy(mut self, policy: impl PolicyGate + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn with_resolver(mut self, resolver: impl HostResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn with_config(mut self, config: UsersConfig) -> Self {
        self.config = config;
        self
    }

    /// One page of visible users, administrators only
    #[instrument(skip(self, actor), fields(actor = %actor.uid))]
    pub async fn list(&self, actor: &Actor, query: PageQuery) -> UserResult<UserPage> {
        self.authorize(actor, Action::Users, None)?;

        let request = query.resolve(self.config.default_per_page);
        let (users, total) = self.repository.list(&VISIBLE_STATUSES, request).await?;

        Ok(UserPage::new(request, total, users))
    }

    #[instrument(skip(self, actor, data), fields(actor = %actor.uid))]
    pub async fn create(&self, actor: &Actor, data: FieldMap) -> UserResult<UserResponse> {
        self.check(&data, &rules::create_rules()).await?;

        let password_hash = hash_password(&rules::required_text(&data, "pass")?)?;

        let input = NewUser {
            uid: Uuid::new_v4().simple().to_string(),
            name: rules::required_text(&data, "name")?,
            email: rules::required_text(&data, "email")?,
            password_hash,
            thumbnail: rules::field_text(&data, "thumbnail"),
            status: self.config.default_status,
        };

        let user = self
            .repository
            .create(input)
            .await
            .map_err(|e| store_failed(StoreOp::Create, e))?;

        Ok(user.into())
    }

    /// Visible user plus its sorted role names
    #[instrument(skip(self, actor), fields(actor = %actor.uid))]
    pub async fn read(&self, actor: &Actor, uid: &str) -> UserResult<(User, Vec<String>)> {
        let user = self.find(uid).await?;
        self.authorize(actor, Action::Read, Some(&user))?;

        let roles = self.repository.roles_of(user.id).await?;
        Ok((user, roles))
    }

    /// Partial update. Role changes from non-administrators are dropped.
    #[instrument(skip(self, actor, data), fields(actor = %actor.uid))]
    pub async fn update(&self, actor: &Actor, uid: &str, mut data: FieldMap) -> UserResult<User> {
        let user = self.find(uid).await?;
        self.authorize(actor, Action::Update, Some(&user))?;

        self.check(&data, &rules::update_rules(&data, user.id)).await?;

        if !actor.is_admin() && data.remove("roles").is_some() {
            tracing::info!(uid, "Ignoring role change from non-administrator");
        }

        let password_hash = match rules::field_text(&data, "pass") {
            Some(pass) => Some(hash_password(&pass)?),
            None => None,
        };

        let changes = UserChanges {
            name: rules::field_text(&data, "name"),
            email: rules::field_text(&data, "email"),
            password_hash,
            thumbnail: rules::field_text(&data, "thumbnail"),
            roles: rules::field_list(&data, "roles"),
        };
        if changes.is_empty() {
            tracing::debug!(uid, "Nothing to update");
            return Ok(user);
        }

        self.repository
            .update(&user, changes)
            .await
            .map_err(|e| store_failed(StoreOp::Update, e))
    }

    /// Soft delete, administrators only
    #[instrument(skip(self, actor), fields(actor = %actor.uid))]
    pub async fn delete(&self, actor: &Actor, uid: &str) -> UserResult<()> {
        let user = self.find(uid).await?;
        self.authorize(actor, Action::Delete, Some(&user))?;

        match self.repository.delete(&user).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                tracing::error!(user_id = user.id, "Delete affected no rows");
                Err(UserError::StoreFailed(StoreOp::Delete))
            }
            Err(e) => Err(store_failed(StoreOp::Delete, e)),
        }
    }

    // Helpers

    async fn find(&self, uid: &str) -> UserResult<User> {
        if !is_valid_uid(uid) {
            return Err(UserError::InvalidIdentifier);
        }

        self.repository
            .read(uid, &VISIBLE_STATUSES)
            .await?
            .ok_or(UserError::NotFound)
    }

    fn authorize(&self, actor: &Actor, action: Action, target: Option<&User>) -> UserResult<()> {
        if self.policy.check(actor, action, target).is_allowed() {
            Ok(())
        } else {
            tracing::warn!(actor = %actor.uid, %action, "Policy denied");
            Err(UserError::PermissionDenied)
        }
    }

    async fn check(&self, data: &FieldMap, rule_set: &rules::RuleSet) -> UserResult<()> {
        let context = StoreContext {
            repository: self.repository.as_ref(),
            resolver: self.resolver.as_ref(),
        };

        let errors = rules::validate(data, rule_set, &context).await?;
        if errors.is_empty() {
            Ok(())
        } else {
            Err(UserError::Validation(errors))
        }
    }
}

/// Exactly 32 ASCII alphanumerics
fn is_valid_uid(uid: &str) -> bool {
    uid.len() == UID_LEN && uid.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn hash_password(password: &str) -> UserResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UserError::PasswordHash(e.to_string()))
}

fn store_failed(op: StoreOp, err: UserError) -> UserError {
    tracing::error!(%op, "Store write failed: {}", err);
    UserError::StoreFailed(op)
}

/// Rule lookups backed by the repository and resolver
struct StoreContext<'a, R> {
    repository: &'a R,
    resolver: &'a dyn HostResolver,
}

#[async_trait]
impl<R: UserRepository> RuleContext for StoreContext<'_, R> {
    async fn email_taken(&self, email: &str, ignore: Option<i64>) -> UserResult<bool> {
        self.repository.email_taken(email, ignore).await
    }

    async fn role_exists(&self, name: &str) -> UserResult<bool> {
        self.repository.role_exists(name).await
    }

    async fn host_resolves(&self, host: &str) -> bool {
        self.resolver.resolves(host).await
    }
}
