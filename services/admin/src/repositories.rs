//! Data access traits for roles, menus and data rules
//!
//! Every operation runs against an explicit transaction handle obtained from
//! [`Database::begin`]. Writes become visible once [`Transaction::commit`]
//! succeeds; dropping a handle without committing rolls it back.

use async_trait::async_trait;
use common::error::DatabaseResult;

use crate::models::{
    CreateRoleParam, DataRule, Menu, Page, PageParams, Role, RoleDetail, RoleQuery,
    UpdateRoleParam,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryDatabase;
pub use postgres::PgDatabase;

/// Source of transaction handles
#[async_trait]
pub trait Database: Clone + Send + Sync + 'static {
    type Tx: Transaction + RoleRepository + MenuRepository + RuleRepository;

    /// Open a new transaction
    async fn begin(&self) -> DatabaseResult<Self::Tx>;
}

/// Commit side of a transaction handle
#[async_trait]
pub trait Transaction: Send {
    async fn commit(self) -> DatabaseResult<()>;
}

/// Role persistence and relationship queries
#[async_trait]
pub trait RoleRepository: Send {
    async fn get(&mut self, id: i64) -> DatabaseResult<Option<Role>>;

    async fn get_by_name(&mut self, name: &str) -> DatabaseResult<Option<Role>>;

    /// Role with its menus and data rules
    async fn get_with_relations(&mut self, id: i64) -> DatabaseResult<Option<RoleDetail>>;

    /// All roles ordered by id
    async fn get_all(&mut self) -> DatabaseResult<Vec<Role>>;

    /// Roles assigned to a user, ordered by id
    async fn get_by_user(&mut self, user_id: i64) -> DatabaseResult<Vec<Role>>;

    /// Ids of the users holding a role
    async fn user_ids(&mut self, role_id: i64) -> DatabaseResult<Vec<i64>>;

    /// Newest roles first
    async fn paginate(
        &mut self,
        query: &RoleQuery,
        page: &PageParams,
    ) -> DatabaseResult<Page<Role>>;

    async fn create(&mut self, param: &CreateRoleParam) -> DatabaseResult<Role>;

    /// Returns the number of rows updated
    async fn update(&mut self, id: i64, param: &UpdateRoleParam) -> DatabaseResult<u64>;

    /// Replace the role's menu set, returns the size of the new set
    async fn replace_menus(&mut self, id: i64, menu_ids: &[i64]) -> DatabaseResult<u64>;

    /// Replace the role's data rule set, returns the size of the new set
    async fn replace_rules(&mut self, id: i64, rule_ids: &[i64]) -> DatabaseResult<u64>;

    /// Delete roles and their associations, returns the number of roles removed
    async fn delete(&mut self, ids: &[i64]) -> DatabaseResult<u64>;
}

/// Menu lookups
#[async_trait]
pub trait MenuRepository: Send {
    async fn get_menu(&mut self, id: i64) -> DatabaseResult<Option<Menu>>;
}

/// Data rule lookups
#[async_trait]
pub trait RuleRepository: Send {
    async fn get_rule(&mut self, id: i64) -> DatabaseResult<Option<DataRule>>;
}

/// Deduplicate ids while keeping their first-seen order
pub(crate) fn unique_ids(ids: &[i64]) -> Vec<i64> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
