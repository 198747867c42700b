//! In-memory implementation of the data access traits
//!
//! A transaction holds the store lock for its whole lifetime and works on a
//! private copy that replaces the store on commit. Transactions therefore run
//! one at a time, and an uncommitted transaction leaves no trace. The helper
//! methods on [`MemoryDatabase`] wait while a transaction is open.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::error::{DatabaseError, DatabaseResult};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{
    Database, MenuRepository, RoleRepository, RuleRepository, Transaction, unique_ids,
};
use crate::models::{
    CreateRoleParam, DataRule, Menu, Page, PageParams, Role, RoleDetail, RoleQuery,
    UpdateRoleParam,
};

#[derive(Debug, Clone, Default)]
struct Store {
    next_role_id: i64,
    roles: BTreeMap<i64, Role>,
    menus: BTreeMap<i64, Menu>,
    rules: BTreeMap<i64, DataRule>,
    /// (user_id, role_id)
    user_roles: BTreeSet<(i64, i64)>,
    /// (role_id, menu_id)
    role_menus: BTreeSet<(i64, i64)>,
    /// (role_id, rule_id)
    role_rules: BTreeSet<(i64, i64)>,
}

/// Database handle keeping everything in process memory
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    store: Arc<Mutex<Store>>,
}

impl MemoryDatabase {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a menu
    pub async fn insert_menu(&self, menu: Menu) {
        self.store.lock().await.menus.insert(menu.id, menu);
    }

    /// Add or replace a data rule
    pub async fn insert_rule(&self, rule: DataRule) {
        self.store.lock().await.rules.insert(rule.id, rule);
    }

    /// Grant a role to a user
    pub async fn assign_role(&self, user_id: i64, role_id: i64) {
        self.store.lock().await.user_roles.insert((user_id, role_id));
    }

    /// Menu ids currently granted to a role
    pub async fn role_menu_ids(&self, role_id: i64) -> Vec<i64> {
        let store = self.store.lock().await;
        associated(&store.role_menus, role_id)
    }

    /// Data rule ids currently granted to a role
    pub async fn role_rule_ids(&self, role_id: i64) -> Vec<i64> {
        let store = self.store.lock().await;
        associated(&store.role_rules, role_id)
    }

    /// Number of stored roles
    pub async fn role_count(&self) -> usize {
        self.store.lock().await.roles.len()
    }
}

fn associated(pairs: &BTreeSet<(i64, i64)>, key: i64) -> Vec<i64> {
    pairs
        .range((key, i64::MIN)..=(key, i64::MAX))
        .map(|(_, value)| *value)
        .collect()
}

#[async_trait]
impl Database for MemoryDatabase {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> DatabaseResult<MemoryTransaction> {
        let guard = Arc::clone(&self.store).lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTransaction { guard, working })
    }
}

/// Open in-memory transaction
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<Store>,
    working: Store,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn commit(self) -> DatabaseResult<()> {
        let mut guard = self.guard;
        *guard = self.working;
        Ok(())
    }
}

impl MemoryTransaction {
    fn ensure_unique_name(&self, name: &str, except: Option<i64>) -> DatabaseResult<()> {
        let taken = self
            .working
            .roles
            .values()
            .any(|role| role.name == name && Some(role.id) != except);
        if taken {
            return Err(DatabaseError::Constraint(format!(
                "duplicate role name: {}",
                name
            )));
        }
        Ok(())
    }

    fn ensure_role(&self, id: i64) -> DatabaseResult<()> {
        if !self.working.roles.contains_key(&id) {
            return Err(DatabaseError::Constraint(format!("unknown role_id: {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl RoleRepository for MemoryTransaction {
    async fn get(&mut self, id: i64) -> DatabaseResult<Option<Role>> {
        Ok(self.working.roles.get(&id).cloned())
    }

    async fn get_by_name(&mut self, name: &str) -> DatabaseResult<Option<Role>> {
        Ok(self
            .working
            .roles
            .values()
            .find(|role| role.name == name)
            .cloned())
    }

    async fn get_with_relations(&mut self, id: i64) -> DatabaseResult<Option<RoleDetail>> {
        let Some(role) = self.working.roles.get(&id).cloned() else {
            return Ok(None);
        };
        let menus = associated(&self.working.role_menus, id)
            .into_iter()
            .filter_map(|menu_id| self.working.menus.get(&menu_id).cloned())
            .collect();
        let rules = associated(&self.working.role_rules, id)
            .into_iter()
            .filter_map(|rule_id| self.working.rules.get(&rule_id).cloned())
            .collect();
        Ok(Some(RoleDetail { role, menus, rules }))
    }

    async fn get_all(&mut self) -> DatabaseResult<Vec<Role>> {
        Ok(self.working.roles.values().cloned().collect())
    }

    async fn get_by_user(&mut self, user_id: i64) -> DatabaseResult<Vec<Role>> {
        Ok(associated(&self.working.user_roles, user_id)
            .into_iter()
            .filter_map(|role_id| self.working.roles.get(&role_id).cloned())
            .collect())
    }

    async fn user_ids(&mut self, role_id: i64) -> DatabaseResult<Vec<i64>> {
        Ok(self
            .working
            .user_roles
            .iter()
            .filter(|(_, r)| *r == role_id)
            .map(|(user_id, _)| *user_id)
            .collect())
    }

    async fn paginate(
        &mut self,
        query: &RoleQuery,
        page: &PageParams,
    ) -> DatabaseResult<Page<Role>> {
        let mut matching: Vec<Role> = self
            .working
            .roles
            .values()
            .filter(|role| query.matches(role))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.created_time
                .cmp(&a.created_time)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = matching.len() as i64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(page.size() as usize)
            .collect();
        Ok(Page::new(items, total, page))
    }

    async fn create(&mut self, param: &CreateRoleParam) -> DatabaseResult<Role> {
        self.ensure_unique_name(&param.name, None)?;

        self.working.next_role_id += 1;
        let role = Role {
            id: self.working.next_role_id,
            name: param.name.clone(),
            status: param.status,
            is_filter_scopes: param.is_filter_scopes,
            remark: param.remark.clone(),
            created_time: Utc::now(),
            updated_time: None,
        };
        self.working.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn update(&mut self, id: i64, param: &UpdateRoleParam) -> DatabaseResult<u64> {
        self.ensure_unique_name(&param.name, Some(id))?;

        let Some(role) = self.working.roles.get_mut(&id) else {
            return Ok(0);
        };
        role.name = param.name.clone();
        role.status = param.status;
        role.is_filter_scopes = param.is_filter_scopes;
        role.remark = param.remark.clone();
        role.updated_time = Some(Utc::now());
        Ok(1)
    }

    async fn replace_menus(&mut self, id: i64, menu_ids: &[i64]) -> DatabaseResult<u64> {
        let menu_ids = unique_ids(menu_ids);
        self.ensure_role(id)?;
        if let Some(missing) = menu_ids.iter().find(|m| !self.working.menus.contains_key(*m)) {
            return Err(DatabaseError::Constraint(format!("unknown menu: {}", missing)));
        }

        self.working.role_menus.retain(|(role_id, _)| *role_id != id);
        self.working
            .role_menus
            .extend(menu_ids.iter().map(|menu_id| (id, *menu_id)));
        Ok(menu_ids.len() as u64)
    }

    async fn replace_rules(&mut self, id: i64, rule_ids: &[i64]) -> DatabaseResult<u64> {
        let rule_ids = unique_ids(rule_ids);
        self.ensure_role(id)?;
        if let Some(missing) = rule_ids.iter().find(|r| !self.working.rules.contains_key(*r)) {
            return Err(DatabaseError::Constraint(format!(
                "unknown data rule: {}",
                missing
            )));
        }

        self.working.role_rules.retain(|(role_id, _)| *role_id != id);
        self.working
            .role_rules
            .extend(rule_ids.iter().map(|rule_id| (id, *rule_id)));
        Ok(rule_ids.len() as u64)
    }

    async fn delete(&mut self, ids: &[i64]) -> DatabaseResult<u64> {
        let mut removed = 0;
        for id in unique_ids(ids) {
            if self.working.roles.remove(&id).is_none() {
                continue;
            }
            removed += 1;
            self.working.user_roles.retain(|(_, role_id)| *role_id != id);
            self.working.role_menus.retain(|(role_id, _)| *role_id != id);
            self.working.role_rules.retain(|(role_id, _)| *role_id != id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl MenuRepository for MemoryTransaction {
    async fn get_menu(&mut self, id: i64) -> DatabaseResult<Option<Menu>> {
        Ok(self.working.menus.get(&id).cloned())
    }
}

#[async_trait]
impl RuleRepository for MemoryTransaction {
    async fn get_rule(&mut self, id: i64) -> DatabaseResult<Option<DataRule>> {
        Ok(self.working.rules.get(&id).cloned())
    }
}
