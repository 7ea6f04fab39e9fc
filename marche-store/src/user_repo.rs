use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marche_core::identity::User;
use marche_core::repository::UserRepository;
use marche_core::{CoreError, CoreResult};
use marche_shared::Role;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{db_error, parse_column};

pub struct StoreUserRepository {
    pool: PgPool,
}

impl StoreUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    display_name: String,
    roles: Vec<String>,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_domain(self) -> CoreResult<User> {
        let roles = self
            .roles
            .iter()
            .map(|r| parse_column::<Role>("roles", r))
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(User {
            id: self.id,
            display_name: self.display_name,
            roles,
            created_at: self.created_at,
        })
    }
}

fn role_names(user: &User) -> Vec<String> {
    user.roles.iter().map(|r| r.as_str().to_string()).collect()
}

#[async_trait]
impl UserRepository for StoreUserRepository {
    async fn create(&self, user: &User) -> CoreResult<()> {
        sqlx::query("INSERT INTO users (id, display_name, roles, created_at) VALUES ($1, $2, $3, $4)")
            .bind(user.id)
            .bind(&user.display_name)
            .bind(role_names(user))
            .bind(user.created_at)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, display_name, roles, created_at FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;

        row.map(UserRow::into_domain).transpose()
    }

    async fn save(&self, user: &User) -> CoreResult<()> {
        let result = sqlx::query("UPDATE users SET display_name = $2, roles = $3 WHERE id = $1")
            .bind(user.id)
            .bind(&user.display_name)
            .bind(role_names(user))
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("user", user.id));
        }
        Ok(())
    }

    async fn first_with_role(&self, role: Role) -> CoreResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, display_name, roles, created_at FROM users WHERE $1 = ANY(roles) \
             ORDER BY created_at ASC, id ASC LIMIT 1",
        )
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(UserRow::into_domain).transpose()
    }
}
