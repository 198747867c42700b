//! Menu model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Menu entry a role can be granted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Menu {
    pub id: i64,
    pub title: String,
    pub name: String,
    pub path: Option<String>,
    pub perms: Option<String>,
    /// 0 directory, 1 menu, 2 button
    pub menu_type: i32,
    pub status: i32,
    pub parent_id: Option<i64>,
}
