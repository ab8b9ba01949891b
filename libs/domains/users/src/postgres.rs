use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::{Set, Unchanged};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, TransactionTrait,
};

use crate::{
    entity::{role, user, user_role},
    error::UserResult,
    models::{NewUser, PageRequest, User, UserChanges, UserStatus},
    repository::UserRepository,
};

/// PostgreSQL implementation of UserRepository using SeaORM
#[derive(Clone)]
pub struct PgUserRepository {
    db: DatabaseConnection,
}

impl PgUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn status_values(statuses: &[UserStatus]) -> Vec<String> {
    statuses.iter().map(ToString::to_string).collect()
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn list(
        &self,
        statuses: &[UserStatus],
        page: PageRequest,
    ) -> UserResult<(Vec<User>, u64)> {
        let paginator = user::Entity::find()
            .filter(user::Column::Status.is_in(status_values(statuses)))
            .order_by_asc(user::Column::Id)
            .paginate(&self.db, page.per_page);

        let total = paginator.num_items().await?;
        if page.offset().is_none() {
            return Ok((Vec::new(), total));
        }
        let models = paginator.fetch_page(page.page - 1).await?;

        Ok((models.into_iter().map(User::from).collect(), total))
    }

    async fn create(&self, input: NewUser) -> UserResult<User> {
        let active_model: user::ActiveModel = input.into();
        let model = active_model.insert(&self.db).await?;

        tracing::info!(user_id = model.id, uid = %model.uid, "Created user");
        Ok(model.into())
    }

    async fn read(&self, uid: &str, statuses: &[UserStatus]) -> UserResult<Option<User>> {
        let model = user::Entity::find()
            .filter(user::Column::Uid.eq(uid))
            .filter(user::Column::Status.is_in(status_values(statuses)))
            .one(&self.db)
            .await?;

        Ok(model.map(User::from))
    }

    async fn update(&self, target: &User, changes: UserChanges) -> UserResult<User> {
        let txn = self.db.begin().await?;

        let mut active_model = user::ActiveModel {
            id: Unchanged(target.id),
            ..Default::default()
        };
        if let Some(name) = changes.name {
            active_model.name = Set(name);
        }
        if let Some(email) = changes.email {
            active_model.email = Set(email);
        }
        if let Some(hash) = changes.password_hash {
            active_model.password_hash = Set(hash);
        }
        if let Some(thumbnail) = changes.thumbnail {
            active_model.thumbnail = Set(Some(thumbnail));
        }
        active_model.updated_at = Set(Utc::now().into());

        let model = active_model.update(&txn).await?;

        if let Some(names) = changes.roles {
            user_role::Entity::delete_many()
                .filter(user_role::Column::UserId.eq(target.id))
                .exec(&txn)
                .await?;

            let roles = role::Entity::find()
                .filter(role::Column::Name.is_in(names))
                .all(&txn)
                .await?;

            if !roles.is_empty() {
                let links = roles.into_iter().map(|r| user_role::ActiveModel {
                    user_id: Set(target.id),
                    role_id: Set(r.id),
                });
                user_role::Entity::insert_many(links)
                    .exec_without_returning(&txn)
                    .await?;
            }
        }

        txn.commit().await?;

        tracing::info!(user_id = model.id, uid = %model.uid, "Updated user");
        Ok(model.into())
    }

    async fn delete(&self, target: &User) -> UserResult<bool> {
        let result = user::Entity::update_many()
            .col_expr(
                user::Column::Status,
                Expr::value(UserStatus::Deleted.to_string()),
            )
            .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(user::Column::Id.eq(target.id))
            .filter(user::Column::Status.ne(UserStatus::Deleted.to_string()))
            .exec(&self.db)
            .await?;

        if result.rows_affected > 0 {
            tracing::info!(user_id = target.id, uid = %target.uid, "Soft-deleted user");
        }
        Ok(result.rows_affected > 0)
    }

    async fn roles_of(&self, user_id: i64) -> UserResult<Vec<String>> {
        let roles = role::Entity::find()
            .join(JoinType::InnerJoin, role::Relation::UserRole.def())
            .filter(user_role::Column::UserId.eq(user_id))
            .order_by_asc(role::Column::Name)
            .all(&self.db)
            .await?;

        Ok(roles.into_iter().map(|r| r.name).collect())
    }

    async fn email_taken(&self, email: &str, ignore: Option<i64>) -> UserResult<bool> {
        let mut query = user::Entity::find()
            .filter(Expr::cust_with_values(
                r#"LOWER("users"."email") = $1"#,
                [email.to_lowercase()],
            ))
            .filter(user::Column::Status.ne(UserStatus::Deleted.to_string()));

        if let Some(id) = ignore {
            query = query.filter(user::Column::Id.ne(id));
        }

        Ok(query.count(&self.db).await? > 0)
    }

    async fn role_exists(&self, name: &str) -> UserResult<bool> {
        let count = role::Entity::find()
            .filter(role::Column::Name.eq(name))
            .count(&self.db)
            .await?;

        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VISIBLE_STATUSES;
    use sea_orm::sea_query::Value;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::collections::BTreeMap;

    const UID: &str = "0123456789abcdef0123456789abcdef";

    fn user_model(id: i64, name: &str) -> user::Model {
        let now = Utc::now().fixed_offset();
        user::Model {
            id,
            uid: UID.into(),
            name: name.into(),
            email: "ann@example.com".into(),
            password_hash: "hash".into(),
            thumbnail: None,
            status: UserStatus::Activated,
            created_at: now,
            updated_at: now,
        }
    }

    fn count_row(n: i64) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("num_items", Value::BigInt(Some(n)))])
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn sql_log(db: DatabaseConnection) -> Vec<Vec<String>> {
        db.into_transaction_log()
            .iter()
            .map(|txn| txn.statements().iter().map(|s| s.sql.clone()).collect())
            .collect()
    }

    #[tokio::test]
    async fn test_list_returns_page_and_total() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![count_row(3)]])
            .append_query_results([vec![user_model(1, "Ann"), user_model(2, "Bob")]])
            .into_connection();
        let repo = PgUserRepository::new(db.clone());

        let (users, total) = repo
            .list(
                &VISIBLE_STATUSES,
                PageRequest {
                    page: 1,
                    per_page: 2,
                },
            )
            .await
            .unwrap();

        assert_eq!(total, 3);
        assert_eq!(users.len(), 2);
        assert_eq!(users[1].name, "Bob");

        let log = sql_log(db);
        assert_eq!(log.len(), 2);
        assert!(log[0][0].contains("COUNT(*) AS num_items"));
        assert!(log[1][0].contains(r#"ORDER BY "users"."id" ASC"#));
        assert!(log[1][0].contains("LIMIT"));
    }

    #[tokio::test]
    async fn test_list_past_any_offset_skips_page_query() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![count_row(3)]])
            .into_connection();
        let repo = PgUserRepository::new(db.clone());

        let (users, total) = repo
            .list(
                &VISIBLE_STATUSES,
                PageRequest {
                    page: u64::MAX,
                    per_page: 10,
                },
            )
            .await
            .unwrap();

        assert!(users.is_empty());
        assert_eq!(total, 3);
        assert_eq!(sql_log(db).len(), 1);
    }

    #[tokio::test]
    async fn test_update_replaces_roles_in_one_transaction() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user_model(7, "Renamed")]])
            .append_query_results([vec![role::Model {
                id: 1,
                name: "admin".into(),
            }]])
            .append_exec_results([exec(2), exec(1)])
            .into_connection();
        let repo = PgUserRepository::new(db.clone());
        let target: User = user_model(7, "Ann").into();

        let updated = repo
            .update(
                &target,
                UserChanges {
                    name: Some("Renamed".into()),
                    roles: Some(vec!["admin".into(), "ghost".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Renamed");

        let log = sql_log(db);
        assert_eq!(log.len(), 1);
        let statements = &log[0];
        assert_eq!(statements.len(), 6);
        assert_eq!(statements[0], "BEGIN");
        assert!(statements[1].starts_with(r#"UPDATE "users""#));
        assert!(statements[2].starts_with(r#"DELETE FROM "user_roles""#));
        assert!(statements[3].contains(r#"FROM "roles""#));
        assert!(statements[4].starts_with(r#"INSERT INTO "user_roles""#));
        assert_eq!(statements[5], "COMMIT");
    }

    #[tokio::test]
    async fn test_update_with_no_known_roles_inserts_nothing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user_model(7, "Ann")]])
            .append_query_results([Vec::<role::Model>::new()])
            .append_exec_results([exec(1)])
            .into_connection();
        let repo = PgUserRepository::new(db.clone());
        let target: User = user_model(7, "Ann").into();

        repo.update(
            &target,
            UserChanges {
                roles: Some(vec![]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let log = sql_log(db);
        assert!(!log[0].iter().any(|sql| sql.starts_with("INSERT")));
    }

    #[tokio::test]
    async fn test_soft_delete() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(1), exec(0)])
            .into_connection();
        let repo = PgUserRepository::new(db.clone());
        let target: User = user_model(7, "Ann").into();

        assert!(repo.delete(&target).await.unwrap());
        assert!(!repo.delete(&target).await.unwrap());

        let log = sql_log(db);
        assert_eq!(log.len(), 2);
        assert!(log[0][0].starts_with(r#"UPDATE "users" SET "status""#));
        assert!(log[0][0].contains(r#""status" <> $"#));
    }
}
