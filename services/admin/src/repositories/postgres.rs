//! PostgreSQL implementation of the data access traits

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

use super::{
    Database, MenuRepository, RoleRepository, RuleRepository, Transaction, unique_ids,
};
use crate::models::{
    CreateRoleParam, DataRule, Menu, Page, PageParams, Role, RoleDetail, RoleQuery,
    UpdateRoleParam,
};

const ROLE_COLUMNS: &str = "id, name, status, is_filter_scopes, remark, created_time, updated_time";

/// Database handle backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Create a new database handle
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> DatabaseResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))
    }
}

#[async_trait]
impl Database for PgDatabase {
    type Tx = PgTransaction;

    async fn begin(&self) -> DatabaseResult<PgTransaction> {
        let tx = self.pool.begin().await.map_err(DatabaseError::Connection)?;
        Ok(PgTransaction { tx })
    }
}

/// Open PostgreSQL transaction
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn commit(self) -> DatabaseResult<()> {
        self.tx.commit().await.map_err(DatabaseError::query)
    }
}

/// Append the WHERE clause for a role filter
fn push_role_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &RoleQuery) {
    builder.push(" WHERE TRUE");
    if let Some(name) = &query.name {
        builder
            .push(" AND name LIKE ")
            .push_bind(format!("%{}%", escape_like(name)));
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status);
    }
}

/// Escape LIKE wildcards so the name filter is a plain substring match
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl PgTransaction {
    async fn menus_of(&mut self, role_id: i64) -> DatabaseResult<Vec<Menu>> {
        sqlx::query_as::<_, Menu>(
            r#"
            SELECT m.id, m.title, m.name, m.path, m.perms, m.menu_type, m.status, m.parent_id
            FROM sys_menu m
            JOIN sys_role_menu rm ON rm.menu_id = m.id
            WHERE rm.role_id = $1
            ORDER BY m.id
            "#,
        )
        .bind(role_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DatabaseError::query)
    }

    async fn rules_of(&mut self, role_id: i64) -> DatabaseResult<Vec<DataRule>> {
        sqlx::query_as::<_, DataRule>(
            r#"
            SELECT r.id, r.name, r.model, r."column", r.operator, r.expression, r.value
            FROM sys_data_rule r
            JOIN sys_role_data_rule rr ON rr.data_rule_id = r.id
            WHERE rr.role_id = $1
            ORDER BY r.id
            "#,
        )
        .bind(role_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DatabaseError::query)
    }
}

#[async_trait]
impl RoleRepository for PgTransaction {
    async fn get(&mut self, id: i64) -> DatabaseResult<Option<Role>> {
        sqlx::query_as::<_, Role>(&format!("SELECT {ROLE_COLUMNS} FROM sys_role WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(DatabaseError::query)
    }

    async fn get_by_name(&mut self, name: &str) -> DatabaseResult<Option<Role>> {
        sqlx::query_as::<_, Role>(&format!(
            "SELECT {ROLE_COLUMNS} FROM sys_role WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DatabaseError::query)
    }

    async fn get_with_relations(&mut self, id: i64) -> DatabaseResult<Option<RoleDetail>> {
        let Some(role) = self.get(id).await? else {
            return Ok(None);
        };
        let menus = self.menus_of(id).await?;
        let rules = self.rules_of(id).await?;
        Ok(Some(RoleDetail { role, menus, rules }))
    }

    async fn get_all(&mut self) -> DatabaseResult<Vec<Role>> {
        sqlx::query_as::<_, Role>(&format!("SELECT {ROLE_COLUMNS} FROM sys_role ORDER BY id"))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(DatabaseError::query)
    }

    async fn get_by_user(&mut self, user_id: i64) -> DatabaseResult<Vec<Role>> {
        sqlx::query_as::<_, Role>(
            r#"
            SELECT r.id, r.name, r.status, r.is_filter_scopes, r.remark,
                   r.created_time, r.updated_time
            FROM sys_role r
            JOIN sys_user_role ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY r.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DatabaseError::query)
    }

    async fn user_ids(&mut self, role_id: i64) -> DatabaseResult<Vec<i64>> {
        sqlx::query_scalar::<_, i64>(
            "SELECT user_id FROM sys_user_role WHERE role_id = $1 ORDER BY user_id",
        )
        .bind(role_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DatabaseError::query)
    }

    async fn paginate(
        &mut self,
        query: &RoleQuery,
        page: &PageParams,
    ) -> DatabaseResult<Page<Role>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM sys_role");
        push_role_filters(&mut count, query);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(&mut *self.tx)
            .await
            .map_err(DatabaseError::query)?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {ROLE_COLUMNS} FROM sys_role"));
        push_role_filters(&mut select, query);
        select
            .push(" ORDER BY created_time DESC, id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items = select
            .build_query_as::<Role>()
            .fetch_all(&mut *self.tx)
            .await
            .map_err(DatabaseError::query)?;

        Ok(Page::new(items, total, page))
    }

    async fn create(&mut self, param: &CreateRoleParam) -> DatabaseResult<Role> {
        sqlx::query_as::<_, Role>(&format!(
            r#"
            INSERT INTO sys_role (name, status, is_filter_scopes, remark)
            VALUES ($1, $2, $3, $4)
            RETURNING {ROLE_COLUMNS}
            "#
        ))
        .bind(&param.name)
        .bind(param.status)
        .bind(param.is_filter_scopes)
        .bind(&param.remark)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(DatabaseError::query)
    }

    async fn update(&mut self, id: i64, param: &UpdateRoleParam) -> DatabaseResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE sys_role
            SET name = $2, status = $3, is_filter_scopes = $4, remark = $5, updated_time = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&param.name)
        .bind(param.status)
        .bind(param.is_filter_scopes)
        .bind(&param.remark)
        .execute(&mut *self.tx)
        .await
        .map_err(DatabaseError::query)?;

        Ok(result.rows_affected())
    }

    async fn replace_menus(&mut self, id: i64, menu_ids: &[i64]) -> DatabaseResult<u64> {
        let menu_ids = unique_ids(menu_ids);

        sqlx::query("DELETE FROM sys_role_menu WHERE role_id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(DatabaseError::query)?;

        let result = sqlx::query(
            "INSERT INTO sys_role_menu (role_id, menu_id) SELECT $1, UNNEST($2::BIGINT[])",
        )
        .bind(id)
        .bind(&menu_ids)
        .execute(&mut *self.tx)
        .await
        .map_err(DatabaseError::query)?;

        debug!("Role {} now has {} menus", id, result.rows_affected());
        Ok(result.rows_affected())
    }

    async fn replace_rules(&mut self, id: i64, rule_ids: &[i64]) -> DatabaseResult<u64> {
        let rule_ids = unique_ids(rule_ids);

        sqlx::query("DELETE FROM sys_role_data_rule WHERE role_id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(DatabaseError::query)?;

        let result = sqlx::query(
            "INSERT INTO sys_role_data_rule (role_id, data_rule_id) SELECT $1, UNNEST($2::BIGINT[])",
        )
        .bind(id)
        .bind(&rule_ids)
        .execute(&mut *self.tx)
        .await
        .map_err(DatabaseError::query)?;

        debug!("Role {} now has {} data rules", id, result.rows_affected());
        Ok(result.rows_affected())
    }

    async fn delete(&mut self, ids: &[i64]) -> DatabaseResult<u64> {
        // Associations go with the role through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM sys_role WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *self.tx)
            .await
            .map_err(DatabaseError::query)?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl MenuRepository for PgTransaction {
    async fn get_menu(&mut self, id: i64) -> DatabaseResult<Option<Menu>> {
        sqlx::query_as::<_, Menu>(
            r#"
            SELECT id, title, name, path, perms, menu_type, status, parent_id
            FROM sys_menu
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DatabaseError::query)
    }
}

#[async_trait]
impl RuleRepository for PgTransaction {
    async fn get_rule(&mut self, id: i64) -> DatabaseResult<Option<DataRule>> {
        sqlx::query_as::<_, DataRule>(
            r#"
            SELECT id, name, model, "column", operator, expression, value
            FROM sys_data_rule
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DatabaseError::query)
    }
}
