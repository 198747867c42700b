//! Role service behaviour against the in-memory database

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use admin::{
    cache::{CacheCall, RecordingCache},
    error::RoleError,
    models::{
        CreateRoleParam, DataRule, Menu, Page, PageParams, Role, RoleDetail, RoleQuery,
        UpdateRoleMenuParam, UpdateRoleParam, UpdateRoleRuleParam,
    },
    repositories::{
        Database, MemoryDatabase, MenuRepository, RoleRepository, RuleRepository, Transaction,
        memory::MemoryTransaction,
    },
    service::{MAX_ROLE_NAME_LEN, RoleService},
};
use async_trait::async_trait;
use common::error::DatabaseResult;

struct Fixture {
    db: MemoryDatabase,
    cache: RecordingCache,
    service: RoleService<MemoryDatabase>,
}

impl Fixture {
    fn new() -> Self {
        let db = MemoryDatabase::new();
        let cache = RecordingCache::new();
        let service = RoleService::new(db.clone(), Arc::new(cache.clone()), "fba:user");
        Self { db, cache, service }
    }

    async fn role(&self, name: &str) -> i64 {
        self.service
            .create(&create_param(name))
            .await
            .expect("role should be created")
            .id
    }
}

fn create_param(name: &str) -> CreateRoleParam {
    CreateRoleParam {
        name: name.to_string(),
        status: 1,
        is_filter_scopes: true,
        remark: None,
    }
}

fn update_param(name: &str) -> UpdateRoleParam {
    UpdateRoleParam {
        name: name.to_string(),
        status: 0,
        is_filter_scopes: false,
        remark: Some("edited".to_string()),
    }
}

fn menu(id: i64) -> Menu {
    Menu {
        id,
        title: format!("Menu {}", id),
        name: format!("menu_{}", id),
        path: Some(format!("/menu/{}", id)),
        perms: None,
        menu_type: 1,
        status: 1,
        parent_id: None,
    }
}

fn rule(id: i64) -> DataRule {
    DataRule {
        id,
        name: format!("rule {}", id),
        model: "Dept".to_string(),
        column: "id".to_string(),
        operator: "and".to_string(),
        expression: "eq".to_string(),
        value: id.to_string(),
    }
}

fn prefix(user_id: i64) -> CacheCall {
    CacheCall::DeletePrefix(format!("fba:user:{}", user_id))
}

#[tokio::test]
async fn test_create_duplicate_name_conflicts() {
    let fx = Fixture::new();
    fx.role("admin").await;

    let err = fx.service.create(&create_param("admin")).await.unwrap_err();

    assert!(matches!(err, RoleError::Conflict(_)));
    assert_eq!(fx.db.role_count().await, 1);
}

#[tokio::test]
async fn test_get_missing_role_is_not_found() {
    let fx = Fixture::new();

    let err = fx.service.get(404).await.unwrap_err();

    assert!(matches!(err, RoleError::NotFound(msg) if msg == "role not found"));
}

#[tokio::test]
async fn test_get_loads_menus_and_rules() {
    let fx = Fixture::new();
    let id = fx.role("admin").await;
    fx.db.insert_menu(menu(1)).await;
    fx.db.insert_menu(menu(2)).await;
    fx.db.insert_rule(rule(5)).await;

    fx.service
        .update_menus(id, &UpdateRoleMenuParam { menus: vec![2, 1] })
        .await
        .unwrap();
    fx.service
        .update_rules(id, &UpdateRoleRuleParam { rules: vec![5] })
        .await
        .unwrap();

    let detail = fx.service.get(id).await.unwrap();
    assert_eq!(detail.role.name, "admin");
    assert_eq!(detail.menus, vec![menu(1), menu(2)]);
    assert_eq!(detail.rules, vec![rule(5)]);
}

#[tokio::test]
async fn test_list_all_and_by_user() {
    let fx = Fixture::new();
    let admin = fx.role("admin").await;
    let auditor = fx.role("auditor").await;
    fx.role("guest").await;
    fx.db.assign_role(7, auditor).await;
    fx.db.assign_role(7, admin).await;

    let all = fx.service.list_all().await.unwrap();
    assert_eq!(
        all.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
        vec!["admin", "auditor", "guest"]
    );

    let mine = fx.service.list_by_user(7).await.unwrap();
    assert_eq!(
        mine.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![admin, auditor]
    );
    assert!(fx.service.list_by_user(8).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_build_query_and_paginate() {
    let fx = Fixture::new();
    for name in ["admin", "sysadmin", "auditor"] {
        fx.role(name).await;
    }

    let query = fx.service.build_query(Some("admin".to_string()), Some(1));
    let page = fx
        .service
        .paginate(
            &query,
            &PageParams {
                page: Some(1),
                size: Some(1),
            },
        )
        .await
        .unwrap();

    assert_eq!(page.total, 2);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.items.len(), 1);

    let disabled = fx.service.build_query(None, Some(0));
    let page = fx
        .service
        .paginate(&disabled, &PageParams::default())
        .await
        .unwrap();
    assert_eq!(page.total, 0);
    assert!(page.items.is_empty());
}

#[tokio::test]
async fn test_update_invalidates_each_user_after_commit() {
    let fx = Fixture::new();
    let id = fx.role("admin").await;
    fx.db.assign_role(1, id).await;
    fx.db.assign_role(2, id).await;

    let count = fx.service.update(id, &update_param("root")).await.unwrap();

    assert_eq!(count, 1);
    assert_eq!(fx.cache.calls().await, vec![prefix(1), prefix(2)]);

    let detail = fx.service.get(id).await.unwrap();
    assert_eq!(detail.role.name, "root");
    assert_eq!(detail.role.status, 0);
    assert_eq!(detail.role.remark.as_deref(), Some("edited"));
    assert!(detail.role.updated_time.is_some());
}

#[tokio::test]
async fn test_update_to_taken_name_conflicts_and_leaves_row() {
    let fx = Fixture::new();
    fx.role("admin").await;
    let id = fx.role("auditor").await;
    fx.db.assign_role(1, id).await;

    let err = fx.service.update(id, &update_param("admin")).await.unwrap_err();

    assert!(matches!(err, RoleError::Conflict(_)));
    let detail = fx.service.get(id).await.unwrap();
    assert_eq!(detail.role.name, "auditor");
    assert_eq!(detail.role.status, 1);
    assert!(fx.cache.calls().await.is_empty());
}

/// Memory database that counts name lookups
#[derive(Clone, Default)]
struct CountingDatabase {
    inner: MemoryDatabase,
    name_lookups: Arc<AtomicUsize>,
}

impl CountingDatabase {
    fn name_lookups(&self) -> usize {
        self.name_lookups.load(Ordering::SeqCst)
    }
}

struct CountingTransaction {
    inner: MemoryTransaction,
    name_lookups: Arc<AtomicUsize>,
}

#[async_trait]
impl Database for CountingDatabase {
    type Tx = CountingTransaction;

    async fn begin(&self) -> DatabaseResult<CountingTransaction> {
        Ok(CountingTransaction {
            inner: self.inner.begin().await?,
            name_lookups: Arc::clone(&self.name_lookups),
        })
    }
}

#[async_trait]
impl Transaction for CountingTransaction {
    async fn commit(self) -> DatabaseResult<()> {
        self.inner.commit().await
    }
}

#[async_trait]
impl RoleRepository for CountingTransaction {
    async fn get(&mut self, id: i64) -> DatabaseResult<Option<Role>> {
        self.inner.get(id).await
    }

    async fn get_by_name(&mut self, name: &str) -> DatabaseResult<Option<Role>> {
        self.name_lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.get_by_name(name).await
    }

    async fn get_with_relations(&mut self, id: i64) -> DatabaseResult<Option<RoleDetail>> {
        self.inner.get_with_relations(id).await
    }

    async fn get_all(&mut self) -> DatabaseResult<Vec<Role>> {
        self.inner.get_all().await
    }

    async fn get_by_user(&mut self, user_id: i64) -> DatabaseResult<Vec<Role>> {
        self.inner.get_by_user(user_id).await
    }

    async fn user_ids(&mut self, role_id: i64) -> DatabaseResult<Vec<i64>> {
        self.inner.user_ids(role_id).await
    }

    async fn paginate(
        &mut self,
        query: &RoleQuery,
        page: &PageParams,
    ) -> DatabaseResult<Page<Role>> {
        self.inner.paginate(query, page).await
    }

    async fn create(&mut self, param: &CreateRoleParam) -> DatabaseResult<Role> {
        self.inner.create(param).await
    }

    async fn update(&mut self, id: i64, param: &UpdateRoleParam) -> DatabaseResult<u64> {
        self.inner.update(id, param).await
    }

    async fn replace_menus(&mut self, id: i64, menu_ids: &[i64]) -> DatabaseResult<u64> {
        self.inner.replace_menus(id, menu_ids).await
    }

    async fn replace_rules(&mut self, id: i64, rule_ids: &[i64]) -> DatabaseResult<u64> {
        self.inner.replace_rules(id, rule_ids).await
    }

    async fn delete(&mut self, ids: &[i64]) -> DatabaseResult<u64> {
        self.inner.delete(ids).await
    }
}

#[async_trait]
impl MenuRepository for CountingTransaction {
    async fn get_menu(&mut self, id: i64) -> DatabaseResult<Option<Menu>> {
        self.inner.get_menu(id).await
    }
}

#[async_trait]
impl RuleRepository for CountingTransaction {
    async fn get_rule(&mut self, id: i64) -> DatabaseResult<Option<DataRule>> {
        self.inner.get_rule(id).await
    }
}

#[tokio::test]
async fn test_update_keeping_name_skips_name_lookup() {
    let db = CountingDatabase::default();
    let service = RoleService::new(db.clone(), Arc::new(RecordingCache::new()), "fba:user");
    let id = service.create(&create_param("admin")).await.unwrap().id;
    let after_create = db.name_lookups();

    let count = service.update(id, &update_param("admin")).await.unwrap();

    assert_eq!(count, 1);
    assert_eq!(db.name_lookups(), after_create);
    assert_eq!(service.get(id).await.unwrap().role.status, 0);
}

#[tokio::test]
async fn test_rename_looks_up_name_once() {
    let db = CountingDatabase::default();
    let service = RoleService::new(db.clone(), Arc::new(RecordingCache::new()), "fba:user");
    let id = service.create(&create_param("admin")).await.unwrap().id;
    let after_create = db.name_lookups();

    service.update(id, &update_param("root")).await.unwrap();

    assert_eq!(db.name_lookups(), after_create + 1);
    assert_eq!(service.get(id).await.unwrap().role.name, "root");
}

#[tokio::test]
async fn test_overlong_name_is_rejected_before_any_write() {
    let fx = Fixture::new();
    let id = fx.role("admin").await;
    let long_name = "r".repeat(MAX_ROLE_NAME_LEN + 1);

    let err = fx.service.create(&create_param(&long_name)).await.unwrap_err();
    assert!(matches!(err, RoleError::BadRequest(_)));
    assert_eq!(fx.db.role_count().await, 1);

    let err = fx.service.update(id, &update_param(&long_name)).await.unwrap_err();
    assert!(matches!(err, RoleError::BadRequest(_)));
    assert_eq!(fx.service.get(id).await.unwrap().role.name, "admin");

    let longest = "r".repeat(MAX_ROLE_NAME_LEN);
    assert!(fx.service.create(&create_param(&longest)).await.is_ok());
}

#[tokio::test]
async fn test_update_missing_role_is_not_found() {
    let fx = Fixture::new();

    let err = fx.service.update(9, &update_param("x")).await.unwrap_err();

    assert!(matches!(err, RoleError::NotFound(_)));
}

#[tokio::test]
async fn test_update_menus_with_unknown_menu_keeps_previous_set() {
    let fx = Fixture::new();
    let id = fx.role("admin").await;
    fx.db.insert_menu(menu(1)).await;
    fx.db.insert_menu(menu(2)).await;
    fx.db.assign_role(3, id).await;
    fx.service
        .update_menus(id, &UpdateRoleMenuParam { menus: vec![1] })
        .await
        .unwrap();

    let err = fx
        .service
        .update_menus(id, &UpdateRoleMenuParam { menus: vec![2, 999] })
        .await
        .unwrap_err();

    assert!(matches!(err, RoleError::NotFound(msg) if msg == "menu not found"));
    assert_eq!(fx.db.role_menu_ids(id).await, vec![1]);
    assert_eq!(fx.cache.calls().await, vec![prefix(3)]);
}

#[tokio::test]
async fn test_update_menus_replaces_set_and_deduplicates() {
    let fx = Fixture::new();
    let id = fx.role("admin").await;
    for menu_id in 1..=3 {
        fx.db.insert_menu(menu(menu_id)).await;
    }
    fx.db.assign_role(4, id).await;
    fx.service
        .update_menus(id, &UpdateRoleMenuParam { menus: vec![1, 2] })
        .await
        .unwrap();

    let count = fx
        .service
        .update_menus(id, &UpdateRoleMenuParam { menus: vec![3, 2, 3] })
        .await
        .unwrap();

    assert_eq!(count, 2);
    assert_eq!(fx.db.role_menu_ids(id).await, vec![2, 3]);
    assert_eq!(fx.cache.calls().await, vec![prefix(4), prefix(4)]);
}

#[tokio::test]
async fn test_update_menus_missing_role_is_not_found() {
    let fx = Fixture::new();
    fx.db.insert_menu(menu(1)).await;

    let err = fx
        .service
        .update_menus(42, &UpdateRoleMenuParam { menus: vec![1] })
        .await
        .unwrap_err();

    assert!(matches!(err, RoleError::NotFound(msg) if msg == "role not found"));
}

#[tokio::test]
async fn test_update_rules_with_unknown_rule_keeps_previous_set() {
    let fx = Fixture::new();
    let id = fx.role("admin").await;
    fx.db.insert_rule(rule(1)).await;
    fx.service
        .update_rules(id, &UpdateRoleRuleParam { rules: vec![1] })
        .await
        .unwrap();

    let err = fx
        .service
        .update_rules(id, &UpdateRoleRuleParam { rules: vec![999] })
        .await
        .unwrap_err();

    assert!(matches!(err, RoleError::NotFound(msg) if msg == "data rule not found"));
    assert_eq!(fx.db.role_rule_ids(id).await, vec![1]);
}

#[tokio::test]
async fn test_update_rules_prefix_invalidates_users() {
    let fx = Fixture::new();
    let id = fx.role("admin").await;
    fx.db.insert_rule(rule(1)).await;
    fx.db.insert_rule(rule(2)).await;
    fx.db.assign_role(5, id).await;
    fx.db.assign_role(6, id).await;

    let count = fx
        .service
        .update_rules(id, &UpdateRoleRuleParam { rules: vec![1, 2] })
        .await
        .unwrap();

    assert_eq!(count, 2);
    assert_eq!(fx.db.role_rule_ids(id).await, vec![1, 2]);
    assert_eq!(fx.cache.calls().await, vec![prefix(5), prefix(6)]);
}

#[tokio::test]
async fn test_clearing_associations_with_empty_list() {
    let fx = Fixture::new();
    let id = fx.role("admin").await;
    fx.db.insert_menu(menu(1)).await;
    fx.service
        .update_menus(id, &UpdateRoleMenuParam { menus: vec![1] })
        .await
        .unwrap();

    let count = fx
        .service
        .update_menus(id, &UpdateRoleMenuParam::default())
        .await
        .unwrap();

    assert_eq!(count, 0);
    assert!(fx.db.role_menu_ids(id).await.is_empty());
}

#[tokio::test]
async fn test_delete_counts_existing_rows_and_invalidates_former_users() {
    let fx = Fixture::new();
    let admin = fx.role("admin").await;
    let auditor = fx.role("auditor").await;
    let guest = fx.role("guest").await;
    fx.db.assign_role(1, admin).await;
    fx.db.assign_role(2, admin).await;
    fx.db.assign_role(2, auditor).await;

    let count = fx.service.delete(&[admin, auditor, 999]).await.unwrap();

    assert_eq!(count, 2);
    let remaining = fx.service.list_all().await.unwrap();
    assert_eq!(remaining.iter().map(|r| r.id).collect::<Vec<_>>(), vec![guest]);
    assert_eq!(fx.cache.calls().await, vec![prefix(1), prefix(2)]);
    assert!(fx.service.list_by_user(2).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_all_existing_matches_input_length() {
    let fx = Fixture::new();
    let ids = vec![fx.role("a").await, fx.role("b").await];

    assert_eq!(fx.service.delete(&ids).await.unwrap(), ids.len() as u64);
    assert_eq!(fx.db.role_count().await, 0);
    assert_eq!(fx.service.delete(&[]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_cache_failure_does_not_fail_committed_update() {
    let fx = Fixture::new();
    let id = fx.role("admin").await;
    fx.db.assign_role(1, id).await;
    fx.db.assign_role(2, id).await;
    fx.cache.set_failing(true).await;

    let count = fx.service.update(id, &update_param("root")).await.unwrap();

    assert_eq!(count, 1);
    assert_eq!(fx.service.get(id).await.unwrap().role.name, "root");
    // Every user is still attempted after the first failure
    assert_eq!(fx.cache.calls().await, vec![prefix(1), prefix(2)]);
}
