//! Role application service
//!
//! Each operation opens its own transaction, validates references before
//! writing, commits, and only then clears the cached authorization state of
//! the users holding the affected roles. Cache invalidation is best-effort: a
//! failure is logged and never undoes a committed write.

use std::sync::Arc;

use common::error::DatabaseError;
use tracing::{info, warn};

use crate::{
    cache::CacheInvalidator,
    error::{RoleError, RoleResult},
    models::{
        CreateRoleParam, Page, PageParams, Role, RoleDetail, RoleQuery, UpdateRoleMenuParam,
        UpdateRoleParam, UpdateRoleRuleParam,
    },
    repositories::{Database, MenuRepository, RoleRepository, RuleRepository, Transaction},
};

/// Longest role name `sys_role.name` accepts
pub const MAX_ROLE_NAME_LEN: usize = 20;

/// Role service
#[derive(Clone)]
pub struct RoleService<D: Database> {
    db: D,
    cache: Arc<dyn CacheInvalidator>,
    user_cache_prefix: Arc<str>,
}

impl<D: Database> RoleService<D> {
    /// Create a new role service
    ///
    /// `user_cache_prefix` is the namespace of per-user cache keys; a user's
    /// entries live under `{user_cache_prefix}:{user_id}`.
    pub fn new(db: D, cache: Arc<dyn CacheInvalidator>, user_cache_prefix: &str) -> Self {
        Self {
            db,
            cache,
            user_cache_prefix: Arc::from(user_cache_prefix),
        }
    }

    /// Cache namespace of one user
    pub fn user_cache_key(&self, user_id: i64) -> String {
        format!("{}:{}", self.user_cache_prefix, user_id)
    }

    /// Get a role with its menus and data rules
    pub async fn get(&self, id: i64) -> RoleResult<RoleDetail> {
        let mut tx = self.db.begin().await?;
        tx.get_with_relations(id)
            .await?
            .ok_or_else(RoleError::role_not_found)
    }

    /// Get every role
    pub async fn list_all(&self) -> RoleResult<Vec<Role>> {
        let mut tx = self.db.begin().await?;
        Ok(tx.get_all().await?)
    }

    /// Get the roles assigned to a user
    pub async fn list_by_user(&self, user_id: i64) -> RoleResult<Vec<Role>> {
        let mut tx = self.db.begin().await?;
        Ok(tx.get_by_user(user_id).await?)
    }

    /// Describe a role listing filtered by name substring and status
    pub fn build_query(&self, name: Option<String>, status: Option<i32>) -> RoleQuery {
        RoleQuery::new(name, status)
    }

    /// Fetch one page of a role listing
    pub async fn paginate(&self, query: &RoleQuery, page: &PageParams) -> RoleResult<Page<Role>> {
        let mut tx = self.db.begin().await?;
        Ok(tx.paginate(query, page).await?)
    }

    /// Create a role with a unique name
    pub async fn create(&self, param: &CreateRoleParam) -> RoleResult<Role> {
        info!("Creating role: {}", param.name);
        validate_name(&param.name)?;

        let mut tx = self.db.begin().await?;
        if tx.get_by_name(&param.name).await?.is_some() {
            return Err(RoleError::role_exists());
        }
        let role = tx.create(param).await.map_err(name_conflict)?;
        tx.commit().await.map_err(name_conflict)?;

        Ok(role)
    }

    /// Update a role, returns the number of rows updated
    pub async fn update(&self, id: i64, param: &UpdateRoleParam) -> RoleResult<u64> {
        info!("Updating role: {}", id);
        validate_name(&param.name)?;

        let mut tx = self.db.begin().await?;
        let role = tx.get(id).await?.ok_or_else(RoleError::role_not_found)?;
        if role.name != param.name && tx.get_by_name(&param.name).await?.is_some() {
            return Err(RoleError::role_exists());
        }
        let count = tx.update(id, param).await.map_err(name_conflict)?;
        let user_ids = tx.user_ids(id).await?;
        tx.commit().await.map_err(name_conflict)?;

        self.invalidate_users(&user_ids).await;
        Ok(count)
    }

    /// Replace a role's menus, returns the size of the new menu set
    pub async fn update_menus(&self, id: i64, param: &UpdateRoleMenuParam) -> RoleResult<u64> {
        info!("Updating menus of role {}: {:?}", id, param.menus);

        let mut tx = self.db.begin().await?;
        if tx.get(id).await?.is_none() {
            return Err(RoleError::role_not_found());
        }
        for menu_id in &param.menus {
            if tx.get_menu(*menu_id).await?.is_none() {
                return Err(menu_not_found());
            }
        }
        let count = tx
            .replace_menus(id, &param.menus)
            .await
            .map_err(|e| missing_reference(e, menu_not_found))?;
        let user_ids = tx.user_ids(id).await?;
        tx.commit()
            .await
            .map_err(|e| missing_reference(e, menu_not_found))?;

        self.invalidate_users(&user_ids).await;
        Ok(count)
    }

    /// Replace a role's data rules, returns the size of the new rule set
    pub async fn update_rules(&self, id: i64, param: &UpdateRoleRuleParam) -> RoleResult<u64> {
        info!("Updating data rules of role {}: {:?}", id, param.rules);

        let mut tx = self.db.begin().await?;
        if tx.get(id).await?.is_none() {
            return Err(RoleError::role_not_found());
        }
        for rule_id in &param.rules {
            if tx.get_rule(*rule_id).await?.is_none() {
                return Err(rule_not_found());
            }
        }
        let count = tx
            .replace_rules(id, &param.rules)
            .await
            .map_err(|e| missing_reference(e, rule_not_found))?;
        let user_ids = tx.user_ids(id).await?;
        tx.commit()
            .await
            .map_err(|e| missing_reference(e, rule_not_found))?;

        self.invalidate_users(&user_ids).await;
        Ok(count)
    }

    /// Delete roles, returns the number of roles removed
    ///
    /// Users are collected before the rows go away so their caches can still
    /// be cleared afterwards.
    pub async fn delete(&self, ids: &[i64]) -> RoleResult<u64> {
        info!("Deleting roles: {:?}", ids);

        let mut tx = self.db.begin().await?;
        let mut user_ids = Vec::new();
        for id in ids {
            user_ids.extend(tx.user_ids(*id).await?);
        }
        let count = tx.delete(ids).await?;
        tx.commit().await?;

        user_ids.sort_unstable();
        user_ids.dedup();
        self.invalidate_users(&user_ids).await;
        Ok(count)
    }

    async fn invalidate_users(&self, user_ids: &[i64]) {
        for user_id in user_ids {
            let key = self.user_cache_key(*user_id);
            if let Err(e) = self.cache.delete_prefix(&key).await {
                warn!("Failed to invalidate cache {}: {}", key, e);
            }
        }
    }
}

fn menu_not_found() -> RoleError {
    RoleError::NotFound("menu not found".to_string())
}

fn rule_not_found() -> RoleError {
    RoleError::NotFound("data rule not found".to_string())
}

fn validate_name(name: &str) -> RoleResult<()> {
    if name.trim().is_empty() {
        return Err(RoleError::BadRequest("role name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_ROLE_NAME_LEN {
        return Err(RoleError::BadRequest(format!(
            "role name must be at most {} characters",
            MAX_ROLE_NAME_LEN
        )));
    }
    Ok(())
}

/// A constraint hit on a role write means the name was taken concurrently
fn name_conflict(err: DatabaseError) -> RoleError {
    match err {
        DatabaseError::Constraint(_) => RoleError::role_exists(),
        other => other.into(),
    }
}

/// A constraint hit on an association write means a referenced row vanished.
/// Violations of the `role_id` foreign key mean the role itself was deleted.
fn missing_reference(err: DatabaseError, not_found: fn() -> RoleError) -> RoleError {
    match err {
        DatabaseError::Constraint(msg) if msg.contains("role_id") => {
            RoleError::role_not_found()
        }
        DatabaseError::Constraint(_) => not_found(),
        other => other.into(),
    }
}
