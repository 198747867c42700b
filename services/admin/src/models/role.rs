//! Role model and related payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{DataRule, Menu};

/// Role entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
    /// 0 disabled, 1 enabled
    pub status: i32,
    /// Whether the role's data rules filter query results
    pub is_filter_scopes: bool,
    pub remark: Option<String>,
    pub created_time: DateTime<Utc>,
    pub updated_time: Option<DateTime<Utc>>,
}

/// Role with its menu and data rule associations loaded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleDetail {
    #[serde(flatten)]
    pub role: Role,
    pub menus: Vec<Menu>,
    pub rules: Vec<DataRule>,
}

fn default_true() -> bool {
    true
}

/// Role creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoleParam {
    pub name: String,
    pub status: i32,
    #[serde(default = "default_true")]
    pub is_filter_scopes: bool,
    #[serde(default)]
    pub remark: Option<String>,
}

/// Role update payload, replaces every editable column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRoleParam {
    pub name: String,
    pub status: i32,
    #[serde(default = "default_true")]
    pub is_filter_scopes: bool,
    #[serde(default)]
    pub remark: Option<String>,
}

/// Full replacement set of menus for a role
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRoleMenuParam {
    pub menus: Vec<i64>,
}

/// Full replacement set of data rules for a role
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRoleRuleParam {
    pub rules: Vec<i64>,
}

/// Batch role deletion payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteRoleParam {
    pub pks: Vec<i64>,
}

/// Filter over roles, resolved by the repository when a page is fetched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleQuery {
    /// Substring the role name must contain
    pub name: Option<String>,
    /// Exact status
    pub status: Option<i32>,
}

impl RoleQuery {
    /// Build a filter; empty names are treated as no name filter
    pub fn new(name: Option<String>, status: Option<i32>) -> Self {
        Self {
            name: name.filter(|n| !n.is_empty()),
            status,
        }
    }

    /// Whether a role passes this filter
    pub fn matches(&self, role: &Role) -> bool {
        let name_ok = self
            .name
            .as_deref()
            .is_none_or(|name| role.name.contains(name));
        let status_ok = self.status.is_none_or(|status| role.status == status);
        name_ok && status_ok
    }
}
