use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{UserError, UserResult};
use crate::models::{NewUser, PageRequest, User, UserChanges, UserStatus};

/// Repository trait for User persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Page of users in `statuses`, ordered by internal id, plus the total count
    async fn list(
        &self,
        statuses: &[UserStatus],
        page: PageRequest,
    ) -> UserResult<(Vec<User>, u64)>;

    async fn create(&self, user: NewUser) -> UserResult<User>;

    /// Look up by external id, restricted to `statuses`
    async fn read(&self, uid: &str, statuses: &[UserStatus]) -> UserResult<Option<User>>;

    /// Apply a partial update; role changes replace the whole role set
    async fn update(&self, user: &User, changes: UserChanges) -> UserResult<User>;

    /// Soft delete. `false` when nothing was deleted.
    async fn delete(&self, user: &User) -> UserResult<bool>;

    /// Role names held by a user, sorted
    async fn roles_of(&self, user_id: i64) -> UserResult<Vec<String>>;

    /// Whether a non-deleted user other than `ignore` owns `email` (case-insensitive)
    async fn email_taken(&self, email: &str, ignore: Option<i64>) -> UserResult<bool>;

    async fn role_exists(&self, name: &str) -> UserResult<bool>;
}

/// Roles every fresh store knows about
pub const DEFAULT_ROLES: [&str; 2] = ["admin", "member"];

#[derive(Debug, Default)]
struct Store {
    users: BTreeMap<i64, User>,
    roles: BTreeSet<String>,
    user_roles: HashMap<i64, BTreeSet<String>>,
    next_id: i64,
}

impl Store {
    fn email_taken(&self, email: &str, ignore: Option<i64>) -> bool {
        self.users.values().any(|u| {
            u.status != UserStatus::Deleted
                && Some(u.id) != ignore
                && u.email.to_lowercase() == email.to_lowercase()
        })
    }
}

/// In-memory implementation of UserRepository (for development/testing)
#[derive(Debug, Clone)]
pub struct InMemoryUserRepository {
    store: Arc<RwLock<Store>>,
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryUserRepository {
    /// Empty store with the default roles
    pub fn new() -> Self {
        Self::with_roles(DEFAULT_ROLES)
    }

    pub fn with_roles<'a>(roles: impl IntoIterator<Item = &'a str>) -> Self {
        let store = Store {
            roles: roles.into_iter().map(String::from).collect(),
            next_id: 1,
            ..Default::default()
        };
        Self {
            store: Arc::new(RwLock::new(store)),
        }
    }

    /// Insert a record as-is (any status) with the given roles.
    pub async fn seed(&self, user: NewUser, roles: &[&str]) -> User {
        let mut store = self.store.write().await;
        let user = insert(&mut store, user);
        store
            .user_roles
            .insert(user.id, roles.iter().map(|r| r.to_string()).collect());
        user
    }

    /// Snapshot of a record regardless of status
    pub async fn find_any(&self, uid: &str) -> Option<User> {
        let store = self.store.read().await;
        store.users.values().find(|u| u.uid == uid).cloned()
    }
}

fn insert(store: &mut Store, user: NewUser) -> User {
    let id = store.next_id;
    store.next_id += 1;

    let now = Utc::now();
    let user = User {
        id,
        uid: user.uid,
        name: user.name,
        email: user.email,
        password_hash: user.password_hash,
        thumbnail: user.thumbnail,
        status: user.status,
        created_at: now,
        updated_at: now,
    };
    store.users.insert(id, user.clone());
    user
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn list(
        &self,
        statuses: &[UserStatus],
        page: PageRequest,
    ) -> UserResult<(Vec<User>, u64)> {
        let store = self.store.read().await;

        let visible: Vec<&User> = store
            .users
            .values()
            .filter(|u| statuses.contains(&u.status))
            .collect();
        let total = visible.len() as u64;

        let Some(offset) = page.offset() else {
            return Ok((Vec::new(), total));
        };
        let users = visible
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(page.per_page).unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Ok((users, total))
    }

    async fn create(&self, user: NewUser) -> UserResult<User> {
        let mut store = self.store.write().await;

        if store.email_taken(&user.email, None) {
            return Err(UserError::Store(format!(
                "duplicate email '{}'",
                user.email
            )));
        }

        let user = insert(&mut store, user);
        tracing::info!(user_id = user.id, uid = %user.uid, "Created user");
        Ok(user)
    }

    async fn read(&self, uid: &str, statuses: &[UserStatus]) -> UserResult<Option<User>> {
        let store = self.store.read().await;
        Ok(store
            .users
            .values()
            .find(|u| u.uid == uid && statuses.contains(&u.status))
            .cloned())
    }

    async fn update(&self, user: &User, changes: UserChanges) -> UserResult<User> {
        let mut store = self.store.write().await;

        if let Some(email) = changes.email.as_deref() {
            if store.email_taken(email, Some(user.id)) {
                return Err(UserError::Store(format!("duplicate email '{}'", email)));
            }
        }
        if let Some(roles) = changes.roles.as_ref() {
            if let Some(unknown) = roles.iter().find(|r| !store.roles.contains(*r)) {
                return Err(UserError::Store(format!("unknown role '{}'", unknown)));
            }
        }

        let stored = store
            .users
            .get_mut(&user.id)
            .ok_or_else(|| UserError::Store(format!("user {} vanished", user.id)))?;

        if let Some(name) = changes.name {
            stored.name = name;
        }
        if let Some(email) = changes.email {
            stored.email = email;
        }
        if let Some(hash) = changes.password_hash {
            stored.password_hash = hash;
        }
        if let Some(thumbnail) = changes.thumbnail {
            stored.thumbnail = Some(thumbnail);
        }
        stored.updated_at = Utc::now();
        let updated = stored.clone();

        if let Some(roles) = changes.roles {
            store
                .user_roles
                .insert(user.id, roles.into_iter().collect());
        }

        tracing::info!(user_id = user.id, uid = %user.uid, "Updated user");
        Ok(updated)
    }

    async fn delete(&self, user: &User) -> UserResult<bool> {
        let mut store = self.store.write().await;

        match store.users.get_mut(&user.id) {
            Some(stored) if stored.status != UserStatus::Deleted => {
                stored.status = UserStatus::Deleted;
                stored.updated_at = Utc::now();
                tracing::info!(user_id = user.id, uid = %user.uid, "Soft-deleted user");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn roles_of(&self, user_id: i64) -> UserResult<Vec<String>> {
        let store = self.store.read().await;
        Ok(store
            .user_roles
            .get(&user_id)
            .map(|roles| roles.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn email_taken(&self, email: &str, ignore: Option<i64>) -> UserResult<bool> {
        let store = self.store.read().await;
        Ok(store.email_taken(email, ignore))
    }

    async fn role_exists(&self, name: &str) -> UserResult<bool> {
        let store = self.store.read().await;
        Ok(store.roles.contains(name))
    }
}
